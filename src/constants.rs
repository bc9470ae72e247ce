//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Limits document layout
pub mod document {
    /// Top-level key holding every limit entry
    pub const LIMITS_KEY: &str = "Limits";

    /// Per-limit cap field
    pub const SITE_MAX: &str = "SiteMax";

    /// Reserved farm entry whose `Shares` mapping enumerates the shows
    pub const FARM_KEY: &str = "linuxfarm";

    /// Nested mapping under the farm entry
    pub const SHARES_KEY: &str = "Shares";

    /// Indentation used when writing config files
    pub const INDENT: &[u8] = b"    ";
}

/// Bounds enforced on every proposed SiteMax
pub mod limits {
    pub const MIN_SITE_MAX: i64 = 0;
    pub const MAX_SITE_MAX: i64 = 10_000;
}

/// Key selection rules
pub mod selection {
    /// Substrings that keep a key out of the application list
    pub const RESERVED_SUBSTRINGS: [&str; 3] = ["linux", "windows", "yeti"];

    /// Shows whose name contains this get the yeti extras appended
    pub const YETI_SHOW_MARKER: &str = "pwp";

    /// Prefix of the extra limits attached to the yeti show
    pub const YETI_PREFIX: &str = "yeti_";
}

/// Staging record file names
pub mod staging {
    /// Staged document, same schema as the config file
    pub const STAGE_FILENAME: &str = "temp.config";

    /// Ownership record for the staged document
    pub const SESSION_FILENAME: &str = "temp.session";
}

/// Commit pipeline timing and retry ceilings
pub mod reconcile {
    /// Comparison attempts per key before giving up
    pub const MAX_ATTEMPTS: u32 = 8;

    /// First attempt that re-issues the reload command
    pub const RELOAD_RETRY_FIRST: u32 = 2;

    /// Last attempt that re-issues the reload command
    pub const RELOAD_RETRY_LAST: u32 = 6;

    /// Sleep between polls of the live endpoint
    pub const DEFAULT_POLL_DELAY_SECS: u64 = 5;

    /// Per-request timeout for the live endpoint
    pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
}

/// Backup naming
pub mod backup {
    /// chrono format for backup file names (no colons)
    pub const NAME_FORMAT: &str = "D%Y-%m-%d-T%H%M%S";

    pub const EXTENSION: &str = "config";
}

/// Tool settings file location and defaults
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "farm-limits";

    pub const FILENAME: &str = "settings.json";

    pub const DEFAULT_CONFIG_PATH: &str = "/sw/tractor/config/limits.config";
    pub const DEFAULT_TEMP_FOLDER: &str = "/sw/tractor/config/tmp/";
    pub const DEFAULT_BACKUP_FOLDER: &str = "/sw/tractor/config/limits_backup/";
    pub const DEFAULT_LIVE_URL: &str = "http://tractor-engine/Tractor/queue?q=limits";
    pub const DEFAULT_RELOAD_PROGRAM: &str = "/bin/bash";
    pub const DEFAULT_RELOAD_SCRIPT: &str =
        "/sw/pipeline/rendering/tractor-config-tools/reloadconfig_bash.sh";

    /// Shows never offered in the show selection
    pub const DEFAULT_HIDDEN_SHOWS: [&str; 5] =
        ["MollyOfDenali", "NightAtTheMuseum", "RND", "DGF", "default"];

    /// Environment overrides
    pub const ENV_CONFIG_PATH: &str = "FARM_LIMITS_CONFIG";
    pub const ENV_TEMP_FOLDER: &str = "FARM_LIMITS_TEMP";
    pub const ENV_BACKUP_FOLDER: &str = "FARM_LIMITS_BACKUP";
    pub const ENV_LIVE_URL: &str = "FARM_LIMITS_LIVE_URL";
}

/// Process exit codes
pub mod exit {
    /// Live limits never matched; a human has to reload by hand
    pub const RECONCILIATION_EXHAUSTED: i32 = 3;
}
