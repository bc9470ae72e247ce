//! Staging area: the in-progress edit that survives between editing steps
//!
//! A stage is two files in the temp folder: `temp.config` (the full document
//! with the proposed values merged in) and `temp.session` (who owns the stage
//! and every value that session proposed). Only one stage exists at a time;
//! a second session touching it gets `LimitsError::Conflict`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::LimitsDocument;
use crate::constants::staging::{SESSION_FILENAME, STAGE_FILENAME};
use crate::error::{LimitsError, LimitsResult};
use crate::session::EditSelection;

/// Opaque identifier of an editing session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ownership and accumulated proposal of the current stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub session: SessionId,
    /// RFC 3339 time the stage was first created
    pub created: String,
    #[serde(default)]
    pub proposal: EditSelection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingArea {
    temp_folder: PathBuf,
}

impl StagingArea {
    pub fn new(temp_folder: impl Into<PathBuf>) -> Self {
        Self {
            temp_folder: temp_folder.into(),
        }
    }

    pub fn temp_folder(&self) -> &Path {
        &self.temp_folder
    }

    pub fn stage_path(&self) -> PathBuf {
        self.temp_folder.join(STAGE_FILENAME)
    }

    fn record_path(&self) -> PathBuf {
        self.temp_folder.join(SESSION_FILENAME)
    }

    /// Presence of the staged document means an edit is in progress
    pub fn exists(&self) -> bool {
        self.stage_path().exists()
    }

    pub fn record(&self) -> LimitsResult<Option<StageRecord>> {
        let path = self.record_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|e| LimitsError::io(&path, e))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| LimitsError::Parse { path, source })
    }

    /// Owner of the current stage, or a fresh session when nobody owns one
    pub fn resume_session(&self) -> LimitsResult<SessionId> {
        Ok(match self.record()? {
            Some(record) => {
                info!(session = %record.session, "Resuming staged edit session");
                record.session
            }
            None => SessionId::new(),
        })
    }

    pub fn load(&self) -> LimitsResult<LimitsDocument> {
        LimitsDocument::load(&self.stage_path())
    }

    /// Existing record if `session` may touch the stage, `Conflict` otherwise
    fn claim(&self, session: &SessionId) -> LimitsResult<Option<StageRecord>> {
        match self.record()? {
            Some(record) if record.session != *session => Err(LimitsError::Conflict {
                owner: record.session.to_string(),
                requested: session.to_string(),
            }),
            Some(record) => Ok(Some(record)),
            None => {
                if self.exists() {
                    warn!(session = %session, path = %self.stage_path().display(), "Adopting staged edit with no owner");
                }
                Ok(None)
            }
        }
    }

    /// Write `document` as the stage for `session`, overwriting that session's previous stage
    pub fn save(
        &self,
        session: &SessionId,
        document: &LimitsDocument,
        proposal: &EditSelection,
    ) -> LimitsResult<StageRecord> {
        let previous = self.claim(session)?;

        fs::create_dir_all(&self.temp_folder)
            .map_err(|e| LimitsError::io(&self.temp_folder, e))?;

        let mut record = previous.unwrap_or_else(|| StageRecord {
            session: session.clone(),
            created: chrono::Local::now().to_rfc3339(),
            proposal: EditSelection::new(),
        });
        for (name, value) in proposal {
            record.proposal.insert(name.clone(), *value);
        }

        document.write(&self.stage_path())?;
        let record_path = self.record_path();
        let json = serde_json::to_string_pretty(&record).map_err(|source| LimitsError::Parse {
            path: record_path.clone(),
            source,
        })?;
        fs::write(&record_path, json).map_err(|e| LimitsError::io(&record_path, e))?;

        info!(
            session = %session,
            changed = proposal.len(),
            total = record.proposal.len(),
            path = %self.stage_path().display(),
            "Staged edit"
        );
        Ok(record)
    }

    /// Delete the stage; callers only do this when one is known to exist
    pub fn discard(&self, session: &SessionId) -> LimitsResult<()> {
        let stage_path = self.stage_path();
        if !stage_path.exists() {
            return Err(LimitsError::NotFound { path: stage_path });
        }
        self.claim(session)?;

        fs::remove_file(&stage_path).map_err(|e| LimitsError::io(&stage_path, e))?;
        let record_path = self.record_path();
        if record_path.exists() {
            fs::remove_file(&record_path).map_err(|e| LimitsError::io(&record_path, e))?;
        }
        info!(session = %session, "Discarded staged edit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::document::tests::sample_document;

    fn proposal(entries: &[(&str, i64)]) -> EditSelection {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_save_creates_stage_and_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path().join("tmp"));
        let session = SessionId::new();
        assert!(!staging.exists());

        let doc = sample_document();
        let record = staging
            .save(&session, &doc, &proposal(&[("Nuke", 60)]))
            .unwrap();

        assert!(staging.exists());
        assert_eq!(record.session, session);
        assert_eq!(staging.load().unwrap(), doc);
        assert_eq!(staging.record().unwrap(), Some(record));
    }

    #[test]
    fn test_same_session_accumulates_proposal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path());
        let session = SessionId::from("alice");
        let doc = sample_document();

        staging.save(&session, &doc, &proposal(&[("Nuke", 60), ("Houdini", 5)])).unwrap();
        let record = staging.save(&session, &doc, &proposal(&[("Nuke", 70), ("Pwp_sim", 1)])).unwrap();

        let entries: Vec<(&str, i64)> = record.proposal.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(entries, vec![("Nuke", 70), ("Houdini", 5), ("Pwp_sim", 1)]);
    }

    #[test]
    fn test_other_session_conflicts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path());
        let doc = sample_document();
        staging.save(&SessionId::from("alice"), &doc, &proposal(&[("Nuke", 60)])).unwrap();

        let err = staging
            .save(&SessionId::from("bob"), &doc, &proposal(&[("Nuke", 1)]))
            .unwrap_err();
        assert!(matches!(err, LimitsError::Conflict { ref owner, .. } if owner == "alice"));

        let err = staging.discard(&SessionId::from("bob")).unwrap_err();
        assert!(matches!(err, LimitsError::Conflict { .. }));
        // Alice's stage is intact
        assert_eq!(staging.record().unwrap().unwrap().proposal["Nuke"], 60);
    }

    #[test]
    fn test_discard_removes_both_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path());
        let session = SessionId::new();
        staging.save(&session, &sample_document(), &EditSelection::new()).unwrap();

        staging.discard(&session).unwrap();
        assert!(!staging.exists());
        assert_eq!(staging.record().unwrap(), None);
    }

    #[test]
    fn test_discard_without_stage_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path());
        let err = staging.discard(&SessionId::new()).unwrap_err();
        assert!(matches!(err, LimitsError::NotFound { .. }));
    }

    #[test]
    fn test_resume_session_returns_stage_owner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path());
        let fresh = staging.resume_session().unwrap();
        assert_ne!(fresh, staging.resume_session().unwrap());

        let owner = SessionId::from("alice");
        staging.save(&owner, &sample_document(), &proposal(&[("Nuke", 3)])).unwrap();
        assert_eq!(staging.resume_session().unwrap(), owner);
    }

    #[test]
    fn test_unowned_stage_is_adopted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path());
        sample_document().write(&staging.stage_path()).unwrap();

        let session = SessionId::from("carol");
        let record = staging.save(&session, &sample_document(), &proposal(&[("Nuke", 2)])).unwrap();
        assert_eq!(record.session, session);
    }
}
