/// The distributor of this siteup client.
///
/// Set `SITEUP_DISTRIBUTOR` at build time to override, e.g. `dev`.
pub const SITEUP_DISTRIBUTOR: &str = if let Some(distro) = option_env!("SITEUP_DISTRIBUTOR") {
    distro
} else {
    "unknown"
};
