//! # seahorse CLI Entry Point
//!
//! Installs logging and hands the process argv to the dispatcher.

use std::process;

use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    process::exit(seahorse::execute_from_command_line(argv));
}
