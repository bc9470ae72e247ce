//! Line-oriented wizard over the navigation steps

use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::warn;

use crate::error::LimitsError;
use crate::navigation::{Action, Navigator, Step};
use crate::pipeline::CommitReport;
use crate::session::{ChangeRow, Selection};

/// Map one line of input to an action for `step`; `None` if it means nothing here
pub fn parse_action(step: &Step, line: &str) -> Option<Action> {
    let input = line.trim();
    if input.eq_ignore_ascii_case("q") {
        return Some(Action::Quit);
    }

    match step {
        Step::MainSelection => match input.to_ascii_lowercase().as_str() {
            "1" | "a" => Some(Action::EditApplications),
            "2" | "s" => Some(Action::EditShows),
            _ => None,
        },
        Step::ShowSelection { shows } => {
            if input.eq_ignore_ascii_case("c") {
                return Some(Action::Cancel);
            }
            let picked = match input.parse::<usize>() {
                Ok(n) => shows.get(n.checked_sub(1)?),
                Err(_) => shows.iter().find(|show| show.eq_ignore_ascii_case(input)),
            };
            picked.map(|show| Action::PickShow(show.clone()))
        }
        Step::Editing(edit) => {
            if input.eq_ignore_ascii_case("c") {
                return Some(Action::Cancel);
            }
            if input.is_empty() {
                return Some(Action::Submit(edit.current().values().copied().collect()));
            }
            input
                .split(',')
                .map(|value| value.trim().parse::<i64>())
                .collect::<Result<Vec<_>, _>>()
                .ok()
                .map(Action::Submit)
        }
        Step::Confirmation { .. } => match input.to_ascii_lowercase().as_str() {
            "s" | "y" => Some(Action::Stage),
            "c" | "n" => Some(Action::Cancel),
            _ => None,
        },
        Step::Applied { .. } => match input.to_ascii_lowercase().as_str() {
            "m" => Some(Action::MoreChanges),
            "d" => Some(Action::Discard),
            "w" => Some(Action::Write),
            _ => None,
        },
        Step::Finished(_) | Step::Closed => None,
    }
}

/// Before/after table, changed rows marked with `*`
pub fn write_rows(rows: &[ChangeRow], out: &mut impl Write) -> io::Result<()> {
    for row in rows {
        let marker = if row.changed() { "*" } else { " " };
        writeln!(out, "{marker} {:<24} {:>6} -> {:<6}", row.name, row.before, row.after)?;
    }
    Ok(())
}

pub fn render(step: &Step, out: &mut impl Write) -> io::Result<()> {
    match step {
        Step::MainSelection => {
            writeln!(out, "Edit limits for:")?;
            writeln!(out, "  1) Applications")?;
            writeln!(out, "  2) Shows")?;
            writeln!(out, "  q) Quit")?;
        }
        Step::ShowSelection { shows } => {
            writeln!(out, "Pick a show (c to go back):")?;
            for (i, show) in shows.iter().enumerate() {
                writeln!(out, "  {}) {show}", i + 1)?;
            }
        }
        Step::Editing(edit) => {
            match edit.selection() {
                Selection::Applications => writeln!(out, "Application limits:")?,
                Selection::Show(show) => writeln!(out, "Limits for {show}:")?,
            }
            for (name, value) in edit.current() {
                writeln!(out, "  {name:<24} {value:>6}")?;
            }
            writeln!(
                out,
                "Enter {} comma-separated value(s), blank to keep, c to go back:",
                edit.keys().len()
            )?;
        }
        Step::Confirmation { rows, .. } => {
            writeln!(out, "Please confirm these changes:")?;
            write_rows(rows, out)?;
            writeln!(out, "s) Stage  c) Cancel")?;
        }
        Step::Applied { proposal } => {
            writeln!(out, "{} value(s) staged. The farm is still running the old limits.", proposal.len())?;
            writeln!(out, "m) More changes  d) Discard  w) Write and reload")?;
        }
        Step::Finished(_) | Step::Closed => {}
    }
    out.flush()
}

/// Drive `navigator` from `input` until the user quits or a commit finishes
pub fn run(navigator: &Navigator, mut input: impl BufRead, mut output: impl Write) -> Result<Option<CommitReport>> {
    let mut step = Step::MainSelection;
    let mut line = String::new();

    loop {
        render(&step, &mut output)?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let Some(action) = parse_action(&step, &line) else {
            writeln!(output, "Unrecognised input: {}", line.trim())?;
            continue;
        };

        match navigator.dispatch(&step, action) {
            Ok(Step::Finished(report)) => return Ok(Some(report)),
            Ok(Step::Closed) => return Ok(None),
            Ok(next) => step = next,
            Err(err @ LimitsError::ReconciliationExhausted { .. }) => return Err(err.into()),
            Err(err) => {
                warn!(session = %navigator.session(), error = %err, "Step failed");
                writeln!(output, "Error: {err}")?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::config::document::tests::sample_document;
    use crate::pipeline::ReconcilePolicy;
    use crate::pipeline::reconcile::tests::{CountingReloader, ScriptedLive, live_doc};
    use crate::session::EditSession;
    use crate::staging::{SessionId, StagingArea};
    use std::io::Cursor;
    use std::time::Duration;

    fn store(dir: &tempfile::TempDir) -> ConfigStore {
        let config_path = dir.path().join("limits.config");
        sample_document().write(&config_path).unwrap();
        ConfigStore::new(config_path, StagingArea::new(dir.path().join("tmp")))
    }

    #[test]
    fn test_parse_editing_input() {
        let edit = EditSession::open(&sample_document(), Selection::Applications).unwrap();
        let step = Step::Editing(edit);

        assert_eq!(parse_action(&step, "5, 6\n"), Some(Action::Submit(vec![5, 6])));
        assert_eq!(parse_action(&step, "\n"), Some(Action::Submit(vec![50, 20])));
        assert_eq!(parse_action(&step, "five"), None);
        assert_eq!(parse_action(&step, "C"), Some(Action::Cancel));
        assert_eq!(parse_action(&step, "q"), Some(Action::Quit));
    }

    #[test]
    fn test_write_rows_marks_changes() {
        let rows = vec![
            ChangeRow { name: "Nuke".into(), before: 50, after: 55 },
            ChangeRow { name: "Houdini".into(), before: 20, after: 20 },
        ];
        let mut out = Vec::new();
        write_rows(&rows, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("* Nuke"));
        assert!(lines[0].contains("50 -> 55"));
        assert!(lines[1].starts_with("  Houdini"));
    }

    #[test]
    fn test_parse_show_by_number_or_name() {
        let step = Step::ShowSelection {
            shows: vec!["ShowA".into(), "PWP".into()],
        };
        assert_eq!(parse_action(&step, "2"), Some(Action::PickShow("PWP".into())));
        assert_eq!(parse_action(&step, "showa"), Some(Action::PickShow("ShowA".into())));
        assert_eq!(parse_action(&step, "0"), None);
        assert_eq!(parse_action(&step, "3"), None);
    }

    #[test]
    fn test_wizard_stages_and_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![live_doc(&[("nuke", 55), ("houdini", 20)])]);
        let navigator = Navigator::new(
            &store,
            dir.path().join("backup"),
            Vec::new(),
            SessionId::new(),
            &reloader,
            &live,
            ReconcilePolicy::with_poll_delay(Duration::ZERO),
        );

        let input = Cursor::new("1\nbogus\n55,20\ns\nw\n");
        let mut output = Vec::new();
        let report = run(&navigator, input, &mut output).unwrap().expect("commit report");

        assert_eq!(report.reconciled.len(), 2);
        assert_eq!(reloader.calls.get(), 1);
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Unrecognised input: bogus"));
        assert!(text.contains("Please confirm these changes"));
        assert!(text.contains("*"));
    }

    #[test]
    fn test_wizard_reports_errors_and_continues() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![]);
        let navigator = Navigator::new(
            &store,
            dir.path().join("backup"),
            Vec::new(),
            SessionId::new(),
            &reloader,
            &live,
            ReconcilePolicy::with_poll_delay(Duration::ZERO),
        );

        let input = Cursor::new("1\n1,2,3\nq\n");
        let mut output = Vec::new();
        assert!(run(&navigator, input, &mut output).unwrap().is_none());
        assert!(String::from_utf8(output).unwrap().contains("Error:"));
        assert!(!store.staging().exists());
    }

    #[test]
    fn test_wizard_propagates_exhaustion() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![live_doc(&[("nuke", 50), ("houdini", 20)])]);
        let navigator = Navigator::new(
            &store,
            dir.path().join("backup"),
            Vec::new(),
            SessionId::new(),
            &reloader,
            &live,
            ReconcilePolicy::with_poll_delay(Duration::ZERO),
        );

        let input = Cursor::new("a\n99,20\ny\nw\n");
        let err = run(&navigator, input, Vec::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LimitsError>(),
            Some(LimitsError::ReconciliationExhausted { .. })
        ));
    }

    #[test]
    fn test_wizard_eof_quits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![]);
        let navigator = Navigator::new(
            &store,
            dir.path().join("backup"),
            Vec::new(),
            SessionId::new(),
            &reloader,
            &live,
            ReconcilePolicy::default(),
        );
        assert!(run(&navigator, Cursor::new(""), Vec::new()).unwrap().is_none());
    }
}
