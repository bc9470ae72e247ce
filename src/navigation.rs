//! Navigation between editing steps
//!
//! The editor is a chain of steps: pick applications or a show, edit the
//! values, confirm, stage, then write or discard. `Navigator::dispatch` maps
//! the current step plus a user action to the next step; front ends only
//! render steps and turn input into actions.

use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::ConfigStore;
use crate::error::LimitsResult;
use crate::pipeline::{CommitPipeline, CommitReport, LiveLimits, ReconcilePolicy, Reloader};
use crate::session::{self, ChangeRow, EditSelection, EditSession, Selection};
use crate::staging::SessionId;

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    MainSelection,
    ShowSelection {
        shows: Vec<String>,
    },
    Editing(EditSession),
    Confirmation {
        session: EditSession,
        proposal: EditSelection,
        rows: Vec<ChangeRow>,
    },
    /// Staged; waiting for more changes, discard or write
    Applied {
        proposal: EditSelection,
    },
    Finished(CommitReport),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    EditApplications,
    EditShows,
    PickShow(String),
    Submit(Vec<i64>),
    Stage,
    Cancel,
    MoreChanges,
    Discard,
    Write,
    Quit,
}

pub struct Navigator<'a> {
    store: &'a ConfigStore,
    backup_folder: PathBuf,
    hidden_shows: Vec<String>,
    session: SessionId,
    reloader: &'a dyn Reloader,
    live: &'a dyn LiveLimits,
    policy: ReconcilePolicy,
}

impl<'a> Navigator<'a> {
    pub fn new(
        store: &'a ConfigStore,
        backup_folder: impl Into<PathBuf>,
        hidden_shows: Vec<String>,
        session: SessionId,
        reloader: &'a dyn Reloader,
        live: &'a dyn LiveLimits,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            store,
            backup_folder: backup_folder.into(),
            hidden_shows,
            session,
            reloader,
            live,
            policy,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    fn open(&self, selection: Selection) -> LimitsResult<Step> {
        let document = self.store.load_effective()?;
        Ok(Step::Editing(EditSession::open(&document, selection)?))
    }

    fn pipeline(&self) -> CommitPipeline<'a> {
        CommitPipeline::new(
            self.store,
            self.backup_folder.clone(),
            self.session.clone(),
            self.reloader,
            self.live,
            self.policy.clone(),
        )
    }

    fn stage(&self, proposal: &EditSelection) -> LimitsResult<Step> {
        let base = self.store.load_effective()?;
        let mut pipeline = self.pipeline();
        pipeline.stage_changes(&base, proposal)?;
        Ok(Step::Applied {
            proposal: pipeline.proposal().clone(),
        })
    }

    fn write(&self) -> LimitsResult<Step> {
        let mut pipeline = self.pipeline();
        pipeline.resume_stage()?;
        Ok(Step::Finished(pipeline.finish()?))
    }

    /// Next step for `action` taken at `step`; unsupported actions leave the step as is
    pub fn dispatch(&self, step: &Step, action: Action) -> LimitsResult<Step> {
        match (step, action) {
            (_, Action::Quit) => Ok(Step::Closed),

            (Step::MainSelection, Action::EditApplications) => self.open(Selection::Applications),
            (Step::MainSelection, Action::EditShows) => {
                let document = self.store.load_effective()?;
                Ok(Step::ShowSelection {
                    shows: session::list_shows(&document, &self.hidden_shows)?,
                })
            }

            (Step::ShowSelection { .. }, Action::PickShow(show)) => self.open(Selection::Show(show)),

            (Step::Editing(edit), Action::Submit(values)) => {
                let proposal = edit.propose(&values)?;
                let rows = edit.review(&proposal);
                Ok(Step::Confirmation {
                    session: edit.clone(),
                    proposal,
                    rows,
                })
            }

            (Step::Confirmation { proposal, .. }, Action::Stage) => self.stage(proposal),

            (
                Step::ShowSelection { .. } | Step::Editing(_) | Step::Confirmation { .. },
                Action::Cancel,
            ) => Ok(Step::MainSelection),

            (Step::Applied { .. }, Action::MoreChanges) => Ok(Step::MainSelection),
            (Step::Applied { .. }, Action::Discard) => {
                self.store.staging().discard(&self.session)?;
                Ok(Step::Closed)
            }
            (Step::Applied { .. }, Action::Write) => {
                info!(session = %self.session, "Writing staged limits");
                self.write()
            }

            (step, action) => {
                warn!(step = ?step, action = ?action, "Action not available at this step");
                Ok(step.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsDocument;
    use crate::config::document::tests::sample_document;
    use crate::error::LimitsError;
    use crate::pipeline::reconcile::tests::{CountingReloader, ScriptedLive, live_doc};
    use crate::staging::StagingArea;
    use std::time::Duration;

    struct Fixture {
        dir: tempfile::TempDir,
        store: ConfigStore,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let config_path = dir.path().join("limits.config");
        sample_document().write(&config_path).unwrap();
        let store = ConfigStore::new(config_path, StagingArea::new(dir.path().join("tmp")));
        Fixture { dir, store }
    }

    fn navigator<'a>(
        fx: &'a Fixture,
        session: &str,
        reloader: &'a CountingReloader,
        live: &'a ScriptedLive,
    ) -> Navigator<'a> {
        Navigator::new(
            &fx.store,
            fx.dir.path().join("backup"),
            vec!["RND".to_string()],
            SessionId::from(session),
            reloader,
            live,
            ReconcilePolicy::with_poll_delay(Duration::ZERO),
        )
    }

    #[test]
    fn test_application_edit_stage_and_write() {
        let fx = fixture();
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![live_doc(&[("nuke", 55), ("houdini", 20)])]);
        let nav = navigator(&fx, "alice", &reloader, &live);

        let step = nav.dispatch(&Step::MainSelection, Action::EditApplications).unwrap();
        let Step::Editing(edit) = &step else { panic!("expected editing, got {step:?}") };
        assert_eq!(edit.keys(), ["nuke", "houdini"]);

        let step = nav.dispatch(&step, Action::Submit(vec![55, 20])).unwrap();
        let Step::Confirmation { rows, .. } = &step else { panic!("expected confirmation") };
        assert_eq!(rows.iter().filter(|r| r.changed()).count(), 1);

        let step = nav.dispatch(&step, Action::Stage).unwrap();
        assert!(matches!(step, Step::Applied { .. }));
        assert!(fx.store.staging().exists());

        let step = nav.dispatch(&step, Action::Write).unwrap();
        let Step::Finished(report) = step else { panic!("expected finished") };
        assert_eq!(report.reconciled.len(), 2);
        assert_eq!(LimitsDocument::load(fx.store.config_path()).unwrap().site_max("nuke").unwrap(), 55);
    }

    #[test]
    fn test_more_changes_resumes_from_stage() {
        let fx = fixture();
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![]);
        let nav = navigator(&fx, "alice", &reloader, &live);

        let step = nav.dispatch(&Step::MainSelection, Action::EditApplications).unwrap();
        let step = nav.dispatch(&step, Action::Submit(vec![51, 21])).unwrap();
        let step = nav.dispatch(&step, Action::Stage).unwrap();
        let step = nav.dispatch(&step, Action::MoreChanges).unwrap();
        assert_eq!(step, Step::MainSelection);

        let step = nav.dispatch(&step, Action::EditShows).unwrap();
        assert_eq!(step, Step::ShowSelection { shows: vec!["ShowA".into(), "PWP".into()] });

        let step = nav.dispatch(&step, Action::PickShow("ShowA".into())).unwrap();
        let step = nav.dispatch(&step, Action::Submit(vec![12])).unwrap();
        let Step::Applied { proposal } = nav.dispatch(&step, Action::Stage).unwrap() else {
            panic!("expected applied")
        };
        assert_eq!(proposal.len(), 3);

        // Both edits are in the stage, the config file is untouched
        let staged = fx.store.staging().load().unwrap();
        assert_eq!(staged.site_max("nuke").unwrap(), 51);
        assert_eq!(staged.site_max("showa_render").unwrap(), 12);
        assert_eq!(fx.store.load_authoritative().unwrap(), sample_document());

        // Re-opening the editor shows the staged values
        let Step::Editing(edit) = nav.dispatch(&Step::MainSelection, Action::EditApplications).unwrap() else {
            panic!("expected editing")
        };
        assert_eq!(edit.current()["Nuke"], 51);
    }

    #[test]
    fn test_later_run_resumes_stage_and_writes() {
        let fx = fixture();
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![live_doc(&[("nuke", 52), ("houdini", 21), ("showa_render", 12)])]);
        let policy = ReconcilePolicy::with_poll_delay(Duration::ZERO);

        let first = Navigator::new(
            &fx.store,
            fx.dir.path().join("backup"),
            Vec::new(),
            fx.store.staging().resume_session().unwrap(),
            &reloader,
            &live,
            policy.clone(),
        );
        let step = first.dispatch(&Step::MainSelection, Action::EditApplications).unwrap();
        let step = first.dispatch(&step, Action::Submit(vec![51, 21])).unwrap();
        first.dispatch(&step, Action::Stage).unwrap();

        // A new run picks up the stage owner instead of conflicting with it
        let second = Navigator::new(
            &fx.store,
            fx.dir.path().join("backup"),
            Vec::new(),
            fx.store.staging().resume_session().unwrap(),
            &reloader,
            &live,
            policy,
        );
        assert_eq!(second.session(), first.session());

        let step = second.dispatch(&Step::MainSelection, Action::EditApplications).unwrap();
        let Step::Editing(edit) = &step else { panic!("expected editing") };
        assert_eq!(edit.current()["Nuke"], 51);
        let step = second.dispatch(&step, Action::Submit(vec![52, 21])).unwrap();
        let step = second.dispatch(&step, Action::Stage).unwrap();
        let step = second.dispatch(&step, Action::MoreChanges).unwrap();
        let step = second.dispatch(&step, Action::EditShows).unwrap();
        let step = second.dispatch(&step, Action::PickShow("ShowA".into())).unwrap();
        let step = second.dispatch(&step, Action::Submit(vec![12])).unwrap();
        let step = second.dispatch(&step, Action::Stage).unwrap();

        let Step::Finished(report) = second.dispatch(&step, Action::Write).unwrap() else {
            panic!("expected finished")
        };
        let keys: Vec<&str> = report.reconciled.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["nuke", "houdini", "showa_render"]);
        let written = fx.store.load_authoritative().unwrap();
        assert_eq!(written.site_max("nuke").unwrap(), 52);
        assert_eq!(written.site_max("showa_render").unwrap(), 12);
        assert!(!fx.store.staging().exists());
    }

    #[test]
    fn test_discard_closes_and_removes_stage() {
        let fx = fixture();
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![]);
        let nav = navigator(&fx, "alice", &reloader, &live);

        let step = nav.dispatch(&Step::MainSelection, Action::EditApplications).unwrap();
        let step = nav.dispatch(&step, Action::Submit(vec![1, 2])).unwrap();
        let step = nav.dispatch(&step, Action::Stage).unwrap();
        let step = nav.dispatch(&step, Action::Discard).unwrap();

        assert_eq!(step, Step::Closed);
        assert!(!fx.store.staging().exists());
        assert_eq!(reloader.calls.get(), 0);
    }

    #[test]
    fn test_second_session_cannot_stage_over_first() {
        let fx = fixture();
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![]);
        let alice = navigator(&fx, "alice", &reloader, &live);
        let bob = navigator(&fx, "bob", &reloader, &live);

        let step = alice.dispatch(&Step::MainSelection, Action::EditApplications).unwrap();
        let step = alice.dispatch(&step, Action::Submit(vec![1, 2])).unwrap();
        alice.dispatch(&step, Action::Stage).unwrap();

        let step = bob.dispatch(&Step::MainSelection, Action::EditApplications).unwrap();
        let step = bob.dispatch(&step, Action::Submit(vec![3, 4])).unwrap();
        let err = bob.dispatch(&step, Action::Stage).unwrap_err();
        assert!(matches!(err, LimitsError::Conflict { .. }));
    }

    #[test]
    fn test_wrong_value_count_keeps_editing() {
        let fx = fixture();
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![]);
        let nav = navigator(&fx, "alice", &reloader, &live);

        let step = nav.dispatch(&Step::MainSelection, Action::EditApplications).unwrap();
        let err = nav.dispatch(&step, Action::Submit(vec![1])).unwrap_err();
        assert!(matches!(err, LimitsError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_cancel_and_unavailable_actions() {
        let fx = fixture();
        let reloader = CountingReloader::succeeding();
        let live = ScriptedLive::new(vec![]);
        let nav = navigator(&fx, "alice", &reloader, &live);

        let step = nav.dispatch(&Step::MainSelection, Action::EditShows).unwrap();
        assert_eq!(nav.dispatch(&step, Action::Cancel).unwrap(), Step::MainSelection);
        assert_eq!(nav.dispatch(&Step::MainSelection, Action::Write).unwrap(), Step::MainSelection);
        assert_eq!(nav.dispatch(&step, Action::Quit).unwrap(), Step::Closed);
    }
}
