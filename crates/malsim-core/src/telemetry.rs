//! Log output of the simulation daemon.
//!
//! Request lifecycle events carry a `request_id` field and an `event` name
//! such as `request.started` or `artifact.built`. `RUST_LOG` overrides the
//! level picked on the command line.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: the service at `level`, HTTP access
/// lines at info, connection plumbing at warn.
pub fn default_filter(level: Level) -> String {
    format!("{level},tower_http=info,hyper=warn")
}

/// Install the process-wide subscriber, as plain text or one JSON object
/// per line. Returns false when a subscriber was already installed.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let text = (!json).then(|| fmt::layer().with_target(false));
    let lines = json.then(|| fmt::layer().with_target(false).json());

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(lines)
        .try_init()
        .is_ok()
}
