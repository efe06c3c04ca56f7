//! Log output for the `portal` binary.
//!
//! Events go to stderr so that command output on stdout stays valid JSON.
//! Without `RUST_LOG`, only the portal crates log below `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives used when `RUST_LOG` is unset
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("warn,portal_data={level},portal={level}")
}

/// Install the stderr subscriber, as plain text or one JSON object per line.
///
/// Only the first call in a process installs anything.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let installed = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!(event = "telemetry.already_installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_scope_level_to_portal_crates() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,portal_data=debug,portal=debug"
        );
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
        tracing::debug!(event = "telemetry.test");
    }
}
