//! External collaborators consumed by the execution wrapper.
//!
//! The dispatcher does not own a database layer or a system check framework.
//! It only needs a way to close open connections after a command ran, the
//! statements that frame "output transaction" text, and a check runner that
//! can run every check or a named subset.

use std::sync::Arc;

use crate::errors::{SeahorseError, SeahorseResult};
use crate::management::base::CheckScope;

/// Alias used when a command does not name a database.
pub const DEFAULT_DB_ALIAS: &str = "default";

/// Connection layer seen by commands.
pub trait Connections: Send + Sync {
    /// Closes every open connection.
    ///
    /// Returns [`SeahorseError::ImproperlyConfigured`] when no connection
    /// layer was set up; callers swallow that case.
    fn close_all(&self) -> SeahorseResult<()>;

    /// Statements emitted before and after transactional output.
    fn transaction_sql(&self, _alias: &str) -> (String, String) {
        ("BEGIN;".to_string(), "COMMIT;".to_string())
    }
}

/// The default connection layer: nothing was configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredConnections;

impl Connections for UnconfiguredConnections {
    fn close_all(&self) -> SeahorseResult<()> {
        Err(SeahorseError::improperly_configured(
            "no database connections are configured",
        ))
    }
}

/// Runs system checks before a command executes.
pub trait CheckRunner: Send + Sync {
    /// Fails with [`SeahorseError::SystemCheck`] when serious issues exist.
    fn run_checks(&self, scope: &CheckScope) -> SeahorseResult<()>;
}

/// A check runner with no registered checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoChecks;

impl CheckRunner for NoChecks {
    fn run_checks(&self, scope: &CheckScope) -> SeahorseResult<()> {
        tracing::debug!(?scope, "no system checks registered");
        Ok(())
    }
}

/// The collaborators a command needs while executing.
#[derive(Clone)]
pub struct Hooks {
    pub connections: Arc<dyn Connections>,
    pub checks: Arc<dyn CheckRunner>,
}

impl Hooks {
    pub fn new(connections: Arc<dyn Connections>, checks: Arc<dyn CheckRunner>) -> Self {
        Self {
            connections,
            checks,
        }
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new(Arc::new(UnconfiguredConnections), Arc::new(NoChecks))
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}
