//! Tracing initialisation for the diagnostic daemon.
//!
//! Call [`init_tracing`] once at startup. It installs a global subscriber
//! with an `EnvFilter` and either human-readable or JSON output. Later calls
//! are ignored because the global subscriber can only be set once per
//! process.
//!
//! All log output goes to stderr. `serve-stdin` writes its replies to
//! stdout, one JSON object per line, and log lines must not mix into that
//! stream.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose debug output drowns the pipeline's own events.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Parse a level name such as `"debug"`, defaulting to `INFO`.
///
/// Accepts any case and surrounding whitespace, since the value usually
/// comes from a config file or an environment variable.
pub fn parse_level(name: &str) -> Level {
    name.trim().parse().unwrap_or(Level::INFO)
}

/// Filter directives used when `RUST_LOG` is not set: `level` for
/// everything, `warn` for the HTTP stack.
pub fn default_directives(level: Level) -> String {
    let mut directives = level.as_str().to_lowercase();
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

/// Initialise the global subscriber.
///
/// * `json`: emit newline-delimited JSON log lines, for log shippers.
/// * `level`: default verbosity when `RUST_LOG` is not set.
///
/// `RUST_LOG`, when present, replaces the defaults entirely, so
/// `RUST_LOG=reqwest=debug` brings the HTTP client's logs back.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let (json_layer, text_layer) = if json {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (Some(layer.json()), None)
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}
