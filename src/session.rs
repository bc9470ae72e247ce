//! Edit sessions: which limit keys are editable and what the user wants them to be
//!
//! Display names are the capitalized document keys (`showa_render` -> `Showa_render`);
//! lower-casing a display name gives the document key back.

use indexmap::IndexMap;
use tracing::warn;

use crate::config::LimitsDocument;
use crate::constants::document::FARM_KEY;
use crate::constants::limits::{MAX_SITE_MAX, MIN_SITE_MAX};
use crate::constants::selection::{RESERVED_SUBSTRINGS, YETI_PREFIX, YETI_SHOW_MARKER};
use crate::error::{LimitsError, LimitsResult};

/// Display name -> SiteMax, in the order the keys were selected
pub type EditSelection = IndexMap<String, i64>;

/// Which family of limits is being edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Applications,
    Show(String),
}

/// First character upper-cased, the rest lower-cased
pub fn display_name(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

pub fn document_key(display_name: &str) -> String {
    display_name.to_lowercase()
}

pub fn clamp_site_max(value: i64) -> i64 {
    value.clamp(MIN_SITE_MAX, MAX_SITE_MAX)
}

/// Shows offered for editing: the farm shares minus any whose name contains a hidden entry
pub fn list_shows(document: &LimitsDocument, hidden: &[String]) -> LimitsResult<Vec<String>> {
    Ok(document
        .show_names()?
        .into_iter()
        .filter(|show| hidden.iter().all(|h| !show.contains(h.as_str())))
        .collect())
}

/// Every limit key that is not farm, show, OS or yeti related, in document order
pub fn application_keys(document: &LimitsDocument) -> LimitsResult<Vec<String>> {
    let shows: Vec<String> = document
        .show_names()?
        .iter()
        .map(|show| show.to_lowercase())
        .collect();

    Ok(document
        .keys()?
        .into_iter()
        .filter(|key| *key != FARM_KEY)
        .filter(|key| RESERVED_SUBSTRINGS.iter().all(|word| !key.contains(word)))
        .filter(|key| {
            let lower = key.to_lowercase();
            shows.iter().all(|show| !lower.contains(show.as_str()))
        })
        .map(str::to_string)
        .collect())
}

/// Keys scoped to `show` (`<show>_` prefix), then the yeti extras for the PWP show
pub fn show_limit_keys(document: &LimitsDocument, show: &str) -> LimitsResult<Vec<String>> {
    let lower_show = show.to_lowercase();
    let needle = format!("{lower_show}_");
    let keys = document.keys()?;

    let mut selected: Vec<String> = keys
        .iter()
        .filter(|key| key.contains(needle.as_str()))
        .map(|key| key.to_string())
        .collect();

    if lower_show.contains(YETI_SHOW_MARKER) {
        selected.extend(
            keys.iter()
                .filter(|key| key.contains(YETI_PREFIX))
                .map(|key| key.to_string()),
        );
    }
    Ok(selected)
}

pub fn current_values(document: &LimitsDocument, keys: &[String]) -> LimitsResult<EditSelection> {
    keys.iter()
        .map(|key| Ok::<_, LimitsError>((display_name(key), document.site_max(key)?)))
        .collect()
}

/// Pair each key with the caller's value, clamping to the SiteMax bounds
pub fn build_proposal(keys: &[String], values: &[i64]) -> LimitsResult<EditSelection> {
    if keys.len() != values.len() {
        return Err(LimitsError::ShapeMismatch {
            expected: keys.len(),
            actual: values.len(),
        });
    }

    Ok(keys
        .iter()
        .zip(values)
        .map(|(key, &value)| {
            let clamped = clamp_site_max(value);
            if clamped != value {
                warn!(key = %key, value, clamped, "SiteMax out of range, clamping");
            }
            (display_name(key), clamped)
        })
        .collect())
}

/// One line of the before/after confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRow {
    pub name: String,
    pub before: i64,
    pub after: i64,
}

impl ChangeRow {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

pub fn review(current: &EditSelection, proposed: &EditSelection) -> Vec<ChangeRow> {
    proposed
        .iter()
        .filter_map(|(name, &after)| {
            current.get(name).map(|&before| ChangeRow {
                name: name.clone(),
                before,
                after,
            })
        })
        .collect()
}

/// Editable keys and their current values for one selection
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    selection: Selection,
    keys: Vec<String>,
    current: EditSelection,
}

impl EditSession {
    pub fn open(document: &LimitsDocument, selection: Selection) -> LimitsResult<Self> {
        let keys = match &selection {
            Selection::Applications => application_keys(document)?,
            Selection::Show(show) => show_limit_keys(document, show)?,
        };
        let current = current_values(document, &keys)?;
        Ok(Self {
            selection,
            keys,
            current,
        })
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn current(&self) -> &EditSelection {
        &self.current
    }

    pub fn propose(&self, values: &[i64]) -> LimitsResult<EditSelection> {
        build_proposal(&self.keys, values)
    }

    pub fn review(&self, proposed: &EditSelection) -> Vec<ChangeRow> {
        review(&self.current, proposed)
    }
}
