//! Built-in provisioning commands.

use crate::management::base::Command;
use crate::management::registry::Namespace;

pub mod aks;
pub mod eks;
pub mod gke;

/// Name of the namespace that owns the built-in commands.
pub const CORE_NAMESPACE: &str = "seahorse.core";

fn aks() -> Box<dyn Command> {
    Box::new(aks::AksCommand)
}

fn eks() -> Box<dyn Command> {
    Box::new(eks::EksCommand)
}

fn gke() -> Box<dyn Command> {
    Box::new(gke::GkeCommand)
}

/// The startup-time command table of [`CORE_NAMESPACE`].
pub fn core_namespace() -> Namespace {
    Namespace::new(CORE_NAMESPACE)
        .command("aks", aks)
        .command("eks", eks)
        .command("gke", gke)
}
