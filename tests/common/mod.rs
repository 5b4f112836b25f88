//! # Seahorse Test Helpers
//!
//! Capture sinks and argv builders shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use seahorse::hooks::{CheckRunner, Hooks, UnconfiguredConnections};
use seahorse::management::{CheckScope, ManagementUtility, OutputBuffer};
use seahorse::{CommandRegistry, SeahorseResult};

/// Owned argv from string literals.
pub fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Result of one dispatcher run with captured streams.
pub struct Dispatched {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the dispatcher over `items` against `registry`.
pub fn dispatch_with(registry: CommandRegistry, items: &[&str]) -> Dispatched {
    let out = OutputBuffer::new();
    let err = OutputBuffer::new();
    let code = ManagementUtility::new(argv(items))
        .with_registry(registry)
        .with_sinks(out.shared(), err.shared())
        .execute()
        .expect("dispatch should not raise");
    Dispatched {
        code,
        stdout: out.contents(),
        stderr: err.contents(),
    }
}

/// Runs the dispatcher over `items` with the built-in commands.
pub fn dispatch(items: &[&str]) -> Dispatched {
    dispatch_with(CommandRegistry::with_core(), items)
}

/// Check runner that counts how often it was asked to run.
#[derive(Default)]
pub struct CountingChecks {
    runs: AtomicUsize,
}

impl CountingChecks {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl CheckRunner for CountingChecks {
    fn run_checks(&self, _scope: &CheckScope) -> SeahorseResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hooks with no connection layer and the given check runner.
pub fn hooks_with_checks(checks: Arc<CountingChecks>) -> Hooks {
    Hooks::new(Arc::new(UnconfiguredConnections), checks)
}
