//! Log subscriber setup for binaries and integration tests.
//!
//! Library code logs through `log` and `tracing`; installing the fmt
//! subscriber captures both.

use tracing::Level;

/// Install the global fmt subscriber, DEBUG when `verbose` and INFO otherwise
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    if installed {
        log::debug!("[Logging] Subscriber installed at {}", level);
    }
}
