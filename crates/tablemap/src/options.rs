use anyhow::{Context, Result};
use fromenv::FromEnv;

/// Environment options.
#[derive(Debug, Clone, FromEnv)]
pub struct Options {
    /// Dialect name: `sqlserver`, `postgres`, `mysql` or `sqlite`.
    #[env(from = "TABLEMAP_DIALECT", default = "sqlserver")]
    pub dialect: String,

    /// Emit the dialect's read-lock hint on selects.
    #[env(from = "TABLEMAP_NOLOCK", default = "false")]
    pub nolock: bool,

    /// Advisory flag for executors: buffer result sets.
    #[env(from = "TABLEMAP_BUFFERED", default = "true")]
    pub buffered: bool,
}

impl Options {
    /// Loads options from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment variable cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::from_env().finalize().context("issue loading tablemap options")
    }
}
