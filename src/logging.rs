use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Normalizes a configured level, falling back to `info` for anything unrecognized.
pub fn effective_level(level: &str) -> &'static str {
    let level = level.trim().to_ascii_lowercase();
    LEVELS
        .iter()
        .copied()
        .find(|known| *known == level)
        .unwrap_or("info")
}

/// Installs the global subscriber. `RUST_LOG` directives win over `level`.
///
/// Returns false when a subscriber was already installed, which is what happens when tests
/// initialize logging more than once.
pub fn init(level: &str) -> bool {
    let effective = effective_level(level);

    let filter = EnvFilter::builder()
        .with_default_directive(effective.parse().unwrap_or_else(|_| LevelFilter::INFO.into()))
        .parse_lossy(std::env::var("RUST_LOG").unwrap_or_default());

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(filter))
        .try_init()
        .is_ok();

    if installed && effective != level {
        tracing::warn!("Invalid log level '{}', defaulting to '{}'", level, effective);
    }
    installed
}
