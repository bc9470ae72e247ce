//! Commit pipeline: turns a reviewed proposal into the active farm configuration
//!
//! Linear and not resumable once started:
//! Reviewed -> Staged -> BackedUp -> Written -> ReloadRequested -> Reconciling -> Done,
//! with any error landing in Failed.

pub mod live;
pub mod reconcile;
pub mod reload;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigStore, LimitsDocument};
use crate::constants::backup::{EXTENSION, NAME_FORMAT};
use crate::error::{LimitsError, LimitsResult};
use crate::session::EditSelection;
use crate::staging::SessionId;

pub use live::{HttpLiveLimits, LiveLimits};
pub use reconcile::{ReconcilePolicy, ReconciledKey};
pub use reload::{ReloadWarning, Reloader, ShellReloader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStage {
    Reviewed,
    Staged,
    BackedUp,
    Written,
    ReloadRequested,
    Reconciling,
    Done,
    Failed,
}

/// What a finished commit did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub session: SessionId,
    /// `None` when there was no config file to back up
    pub backup: Option<PathBuf>,
    pub written: PathBuf,
    pub reload_warnings: Vec<ReloadWarning>,
    pub reconciled: Vec<ReconciledKey>,
}

/// Free backup path in `folder` for the current local time
pub fn backup_path(folder: &Path) -> PathBuf {
    let stem = chrono::Local::now().format(NAME_FORMAT).to_string();
    let mut candidate = folder.join(format!("{stem}.{EXTENSION}"));
    let mut suffix = 1;
    while candidate.exists() {
        candidate = folder.join(format!("{stem}-{suffix}.{EXTENSION}"));
        suffix += 1;
    }
    candidate
}

pub struct CommitPipeline<'a> {
    store: &'a ConfigStore,
    backup_folder: PathBuf,
    session: SessionId,
    reloader: &'a dyn Reloader,
    live: &'a dyn LiveLimits,
    policy: ReconcilePolicy,

    stage: CommitStage,
    document: Option<LimitsDocument>,
    proposal: EditSelection,
    backup: Option<PathBuf>,
    reload_warnings: Vec<ReloadWarning>,
    reconciled: Vec<ReconciledKey>,
}

impl<'a> CommitPipeline<'a> {
    pub fn new(
        store: &'a ConfigStore,
        backup_folder: impl Into<PathBuf>,
        session: SessionId,
        reloader: &'a dyn Reloader,
        live: &'a dyn LiveLimits,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            store,
            backup_folder: backup_folder.into(),
            session,
            reloader,
            live,
            policy,
            stage: CommitStage::Reviewed,
            document: None,
            proposal: EditSelection::new(),
            backup: None,
            reload_warnings: Vec::new(),
            reconciled: Vec::new(),
        }
    }

    pub fn current_stage(&self) -> CommitStage {
        self.stage
    }

    /// Every value this session has staged so far
    pub fn proposal(&self) -> &EditSelection {
        &self.proposal
    }

    fn transition(
        &mut self,
        expected: CommitStage,
        next: CommitStage,
        step: impl FnOnce(&mut Self) -> LimitsResult<()>,
    ) -> LimitsResult<()> {
        if self.stage != expected {
            return Err(LimitsError::OutOfOrder {
                expected,
                actual: self.stage,
            });
        }
        match step(self) {
            Ok(()) => {
                debug!(from = ?expected, to = ?next, session = %self.session, "Commit stage complete");
                self.stage = next;
                Ok(())
            }
            Err(err) => {
                error!(stage = ?expected, session = %self.session, error = %err, "Commit failed");
                self.stage = CommitStage::Failed;
                Err(err)
            }
        }
    }

    fn merged(&self) -> LimitsResult<&LimitsDocument> {
        // Only reachable after a successful stage transition
        self.document
            .as_ref()
            .ok_or_else(|| LimitsError::NotFound {
                path: self.store.staging().stage_path(),
            })
    }

    /// Reviewed -> Staged: merge `proposal` into `base` and write the stage
    pub fn stage_changes(&mut self, base: &LimitsDocument, proposal: &EditSelection) -> LimitsResult<()> {
        self.transition(CommitStage::Reviewed, CommitStage::Staged, |p| {
            let merged = base.with_overrides(proposal)?;
            let record = p.store.staging().save(&p.session, &merged, proposal)?;
            p.proposal = record.proposal;
            p.document = Some(merged);
            Ok(())
        })
    }

    /// Reviewed -> Staged: pick up a stage written earlier by this session
    pub fn resume_stage(&mut self) -> LimitsResult<()> {
        self.transition(CommitStage::Reviewed, CommitStage::Staged, |p| {
            let staging = p.store.staging();
            if !staging.exists() {
                return Err(LimitsError::NotFound {
                    path: staging.stage_path(),
                });
            }
            let proposal = match staging.record()? {
                Some(record) if record.session != p.session => {
                    return Err(LimitsError::Conflict {
                        owner: record.session.to_string(),
                        requested: p.session.to_string(),
                    });
                }
                Some(record) => record.proposal,
                None => {
                    warn!(session = %p.session, "Staged edit has no record, nothing to verify after reload");
                    EditSelection::new()
                }
            };
            p.document = Some(staging.load()?);
            p.proposal = proposal;
            Ok(())
        })
    }

    /// Staged -> BackedUp: move the current config aside and drop the stage
    pub fn back_up(&mut self) -> LimitsResult<()> {
        self.transition(CommitStage::Staged, CommitStage::BackedUp, |p| {
            let config_path = p.store.config_path();
            if config_path.exists() {
                fs::create_dir_all(&p.backup_folder)
                    .map_err(|e| LimitsError::io(&p.backup_folder, e))?;
                let backup = backup_path(&p.backup_folder);
                fs::rename(config_path, &backup).map_err(|e| LimitsError::io(config_path, e))?;
                info!(from = %config_path.display(), to = %backup.display(), "Backed up limits config");
                p.backup = Some(backup);
            } else {
                // TODO: confirm with render ops whether a missing base file should abort instead
                warn!(path = %config_path.display(), "No existing config to back up, writing fresh");
            }
            p.store.staging().discard(&p.session)
        })
    }

    /// BackedUp -> Written
    pub fn write(&mut self) -> LimitsResult<()> {
        self.transition(CommitStage::BackedUp, CommitStage::Written, |p| {
            let path = p.store.config_path();
            p.merged()?.write(path)?;
            info!(path = %path.display(), "Wrote limits config");
            Ok(())
        })
    }

    /// Written -> ReloadRequested; a failed reload is recorded and the commit carries on
    pub fn request_reload(&mut self) -> LimitsResult<()> {
        self.transition(CommitStage::Written, CommitStage::ReloadRequested, |p| {
            let outcome = p.reloader.reload();
            if !outcome.is_success() {
                warn!(outcome = ?outcome, "Initial reload failed, verifying live limits anyway");
                p.reload_warnings.push(ReloadWarning { attempt: 1, outcome });
            }
            Ok(())
        })
    }

    /// ReloadRequested -> Reconciling -> Done
    pub fn reconcile(&mut self) -> LimitsResult<()> {
        self.transition(CommitStage::ReloadRequested, CommitStage::Done, |p| {
            p.stage = CommitStage::Reconciling;
            let mut warnings = Vec::new();
            let result = reconcile::reconcile(&p.proposal, p.live, p.reloader, &p.policy, &mut warnings);
            p.reload_warnings.append(&mut warnings);
            p.reconciled = result?;
            Ok(())
        })
    }

    /// Run every remaining step of a staged commit
    pub fn finish(mut self) -> LimitsResult<CommitReport> {
        self.back_up()?;
        self.write()?;
        self.request_reload()?;
        self.reconcile()?;
        info!(
            session = %self.session,
            keys = self.reconciled.len(),
            reload_warnings = self.reload_warnings.len(),
            "Commit complete"
        );
        Ok(CommitReport {
            session: self.session,
            backup: self.backup,
            written: self.store.config_path().to_path_buf(),
            reload_warnings: self.reload_warnings,
            reconciled: self.reconciled,
        })
    }
}
