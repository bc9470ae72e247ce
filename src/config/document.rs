//! Limits document and the authoritative config store
//!
//! The document is kept as a raw JSON tree so fields this tool does not
//! understand survive a rewrite untouched, in their original key order.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::document::{FARM_KEY, INDENT, LIMITS_KEY, SHARES_KEY, SITE_MAX};
use crate::constants::limits::{MAX_SITE_MAX, MIN_SITE_MAX};
use crate::error::{LimitsError, LimitsResult};
use crate::session::{EditSelection, document_key};
use crate::staging::StagingArea;

/// Full limits configuration (`{"Limits": {key: {"SiteMax": n, ...}, ...}, ...}`)
#[derive(Debug, Clone, PartialEq)]
pub struct LimitsDocument {
    root: Value,
}

impl LimitsDocument {
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Parse document text; `origin` is only used for error reporting
    pub fn parse(contents: &str, origin: &Path) -> LimitsResult<Self> {
        serde_json::from_str(contents)
            .map(Self::from_value)
            .map_err(|source| LimitsError::Parse {
                path: origin.to_path_buf(),
                source,
            })
    }

    pub fn load(path: &Path) -> LimitsResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| LimitsError::io(path, e))?;
        let document = Self::parse(&contents, path)?;
        debug!(path = %path.display(), "Loaded limits document");
        Ok(document)
    }

    /// Pretty JSON with a fixed four-space indent
    pub fn to_pretty_string(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
        self.root.serialize(&mut serializer)?;
        // serde_json only ever emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Overwrite `path` unconditionally
    pub fn write(&self, path: &Path) -> LimitsResult<()> {
        let contents = self.to_pretty_string().map_err(|source| LimitsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, contents).map_err(|e| LimitsError::io(path, e))?;
        debug!(path = %path.display(), "Wrote limits document");
        Ok(())
    }

    pub fn limits(&self) -> LimitsResult<&Map<String, Value>> {
        self.root
            .get(LIMITS_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| LimitsError::missing("<root>", LIMITS_KEY))
    }

    fn limits_mut(&mut self) -> LimitsResult<&mut Map<String, Value>> {
        self.root
            .get_mut(LIMITS_KEY)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| LimitsError::missing("<root>", LIMITS_KEY))
    }

    /// Limit keys in document order
    pub fn keys(&self) -> LimitsResult<Vec<&str>> {
        Ok(self.limits()?.keys().map(String::as_str).collect())
    }

    pub fn site_max(&self, key: &str) -> LimitsResult<i64> {
        self.limits()?
            .get(key)
            .and_then(|entry| entry.get(SITE_MAX))
            .and_then(Value::as_i64)
            .ok_or_else(|| LimitsError::missing(key, SITE_MAX))
    }

    pub fn set_site_max(&mut self, key: &str, value: i64) -> LimitsResult<()> {
        let entry = self
            .limits_mut()?
            .get_mut(key)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| LimitsError::missing(key, SITE_MAX))?;
        entry.insert(SITE_MAX.to_string(), Value::from(value));
        Ok(())
    }

    /// Show names listed under `linuxfarm.Shares`, in document order
    pub fn show_names(&self) -> LimitsResult<Vec<String>> {
        let shares = self
            .limits()?
            .get(FARM_KEY)
            .and_then(|farm| farm.get(SHARES_KEY))
            .and_then(Value::as_object)
            .ok_or_else(|| LimitsError::missing(FARM_KEY, SHARES_KEY))?;
        Ok(shares.keys().cloned().collect())
    }

    /// Copy of this document with every proposed value merged in
    pub fn with_overrides(&self, overrides: &EditSelection) -> LimitsResult<Self> {
        let mut merged = self.clone();
        for (display_name, value) in overrides {
            merged.set_site_max(&document_key(display_name), *value)?;
        }
        Ok(merged)
    }

    /// Entries whose SiteMax is present but not an integer in range
    pub fn out_of_range(&self) -> LimitsResult<Vec<(String, Value)>> {
        let offenders = self
            .limits()?
            .iter()
            .filter_map(|(key, entry)| {
                let site_max = entry.get(SITE_MAX)?;
                match site_max.as_i64() {
                    Some(n) if (MIN_SITE_MAX..=MAX_SITE_MAX).contains(&n) => None,
                    _ => Some((key.clone(), site_max.clone())),
                }
            })
            .collect();
        Ok(offenders)
    }
}

/// Prefer the staged document when one exists, otherwise the authoritative file
pub fn load_effective(authoritative: &Path, staged: &Path) -> LimitsResult<LimitsDocument> {
    if staged.exists() {
        info!(path = %staged.display(), "Resuming from staged edit");
        LimitsDocument::load(staged)
    } else {
        LimitsDocument::load(authoritative)
    }
}

/// Authoritative config file plus the staging area that shadows it
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
    staging: StagingArea,
}

impl ConfigStore {
    pub fn new(config_path: impl Into<PathBuf>, staging: StagingArea) -> Self {
        Self {
            config_path: config_path.into(),
            staging,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn load_authoritative(&self) -> LimitsResult<LimitsDocument> {
        LimitsDocument::load(&self.config_path)
    }

    /// Load policy for every editing step
    pub fn load_effective(&self) -> LimitsResult<LimitsDocument> {
        load_effective(&self.config_path, &self.staging.stage_path())
    }
}
