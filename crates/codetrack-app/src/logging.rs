//! Logging setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to the
/// codetrack crates and `warn` to everything else. Calling this twice is
/// harmless.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,codetrack_core={default_level},codetrack_sync={default_level},codetrack_app={default_level},codetrack_host={default_level}"
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
