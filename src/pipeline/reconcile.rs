//! Polls the live limits until every proposed value shows up
//!
//! Keys are checked one after another. Attempt 1 compares against the latest
//! snapshot; every later attempt sleeps, re-issues the reload on attempts
//! 2..=6, and refetches. The 8th mismatch for a key stops everything.

use std::ops::RangeInclusive;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

use super::live::LiveLimits;
use super::reload::{ReloadWarning, Reloader};
use crate::config::LimitsDocument;
use crate::constants::reconcile::{
    DEFAULT_POLL_DELAY_SECS, MAX_ATTEMPTS, RELOAD_RETRY_FIRST, RELOAD_RETRY_LAST,
};
use crate::error::{LimitsError, LimitsResult};
use crate::session::{EditSelection, document_key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub poll_delay: Duration,
    pub max_attempts: u32,
    /// Attempt numbers that re-issue the reload before refetching
    pub reload_on: RangeInclusive<u32>,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            poll_delay: Duration::from_secs(DEFAULT_POLL_DELAY_SECS),
            max_attempts: MAX_ATTEMPTS,
            reload_on: RELOAD_RETRY_FIRST..=RELOAD_RETRY_LAST,
        }
    }
}

impl ReconcilePolicy {
    pub fn with_poll_delay(poll_delay: Duration) -> Self {
        Self {
            poll_delay,
            ..Self::default()
        }
    }
}

/// A key whose live value matched, and how many comparisons it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledKey {
    pub key: String,
    pub value: i64,
    pub attempts: u32,
}

fn observed(snapshot: &LimitsDocument, key: &str) -> Option<i64> {
    snapshot.site_max(key).ok()
}

pub(crate) fn reconcile(
    proposal: &EditSelection,
    live: &dyn LiveLimits,
    reloader: &dyn Reloader,
    policy: &ReconcilePolicy,
    warnings: &mut Vec<ReloadWarning>,
) -> LimitsResult<Vec<ReconciledKey>> {
    let mut reconciled = Vec::with_capacity(proposal.len());
    if proposal.is_empty() {
        return Ok(reconciled);
    }

    thread::sleep(policy.poll_delay);
    let mut snapshot = live.fetch()?;

    for (display_name, &expected) in proposal {
        let key = document_key(display_name);
        let mut attempt = 1;

        loop {
            let value = observed(&snapshot, &key);
            debug!(key = %key, attempt, expected, observed = ?value, "Polled live limit");
            if value == Some(expected) {
                info!(key = %key, value = expected, attempts = attempt, "Live limit matches");
                reconciled.push(ReconciledKey {
                    key: key.clone(),
                    value: expected,
                    attempts: attempt,
                });
                break;
            }

            if attempt >= policy.max_attempts {
                error!(key = %key, expected, observed = ?value, attempts = attempt, "Live limit never matched");
                return Err(LimitsError::ReconciliationExhausted {
                    key,
                    expected,
                    observed: value,
                    attempts: attempt,
                });
            }

            attempt += 1;
            thread::sleep(policy.poll_delay);
            if policy.reload_on.contains(&attempt) {
                info!(key = %key, attempt, "Re-issuing config reload");
                let outcome = reloader.reload();
                if !outcome.is_success() {
                    warnings.push(ReloadWarning { attempt, outcome });
                }
            }
            snapshot = live.fetch()?;
        }
    }

    Ok(reconciled)
}
