// Regression tests for the `seahorse` binary: exit codes and stream routing.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn seahorse() -> Command {
    Command::cargo_bin("seahorse").unwrap()
}

#[test]
fn version_flag_prints_the_crate_version() {
    seahorse()
        .arg("--version")
        .assert()
        .success()
        .stdout(format!("{}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn no_arguments_prints_the_main_help() {
    seahorse()
        .assert()
        .success()
        .stdout(contains("Available subcommands:").and(contains("eks")));
}

#[test]
fn unknown_command_exits_with_one() {
    seahorse()
        .arg("provision")
        .assert()
        .code(1)
        .stderr(contains("Unknown command: 'provision'").and(contains("help' for usage.")));
}

#[cfg(unix)]
#[test]
fn non_utf8_arguments_are_read_lossily() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    seahorse()
        .arg(OsStr::from_bytes(b"prov\xffision"))
        .assert()
        .code(1)
        .stderr(contains("Unknown command: 'prov\u{fffd}ision'"));
}

#[test]
fn invalid_verbosity_is_a_usage_error() {
    seahorse()
        .args(["gke", "--verbosity", "7"])
        .assert()
        .code(2)
        .stderr(contains("--verbosity"));
}

#[test]
fn colour_flags_conflict() {
    seahorse()
        .args(["aks", "--no-color", "--force-color"])
        .assert()
        .code(1)
        .stderr(contains("can't be used together"));
}

#[test]
fn traceback_renders_the_full_diagnostic() {
    seahorse()
        .args(["aks", "--no-color", "--force-color", "--traceback"])
        .assert()
        .code(1)
        .stderr(contains("seahorse::command"));
}

#[test]
fn logging_goes_to_stderr() {
    seahorse()
        .env("RUST_LOG", "seahorse=debug")
        .args(["eks", "--vpcid", "vpc-1"])
        .assert()
        .success()
        .stdout("EKS vpcid [vpc-1] cidr None\n")
        .stderr(contains("dispatching"));
}
