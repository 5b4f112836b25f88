/// The Seahorse version string printed by `version` and `--version`.
pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
