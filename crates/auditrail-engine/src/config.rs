//! Engine configuration
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! database_path = "audit.db"
//! log_profile = "production"
//! latest_versions_limit = 5
//! enabled = true
//! ```

#![allow(clippy::result_large_err)]

use auditrail_core::errors::{ExError, ExErrorKind};
use auditrail_core::logging_facility::{self, Profile};
use auditrail_core_types::AuditContext;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default number of versions returned by `Auditor::recent_versions`
pub const DEFAULT_LATEST_VERSIONS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// SQLite database file holding the version history
    pub database_path: PathBuf,
    pub log_profile: Profile,
    pub latest_versions_limit: usize,
    /// Initial enablement of contexts built by [`AuditConfig::context`]
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("auditrail.db"),
            log_profile: Profile::default(),
            latest_versions_limit: DEFAULT_LATEST_VERSIONS_LIMIT,
            enabled: true,
        }
    }
}

impl AuditConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns `ERR_CONFIGURATION` for malformed TOML, unknown keys or a
    /// zero `latest_versions_limit`.
    pub fn from_toml_str(text: &str) -> Result<Self, ExError> {
        let config: AuditConfig = toml::from_str(text).map_err(|e| {
            ExError::new(ExErrorKind::Configuration)
                .with_op("load_config")
                .with_message(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ERR_IO` if the file cannot be read, otherwise as
    /// [`AuditConfig::from_toml_str`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ExError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ExError> {
        if self.latest_versions_limit == 0 {
            return Err(ExError::new(ExErrorKind::Configuration)
                .with_op("load_config")
                .with_message("latest_versions_limit must be at least 1"));
        }
        Ok(())
    }

    /// A fresh request context honouring `enabled`
    pub fn context(&self) -> AuditContext {
        let mut ctx = AuditContext::new();
        ctx.set_enabled(self.enabled);
        ctx
    }

    /// Initialize logging with the configured profile
    pub fn init_logging(&self) {
        logging_facility::init(self.log_profile);
    }
}
