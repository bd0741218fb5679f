//! Tracing initialization for embedding applications.
//!
//! The engine itself only emits `tracing` events; subscriber setup is left
//! to the host process. `init_tracing` is a convenience for binaries and
//! tests that do not bring their own subscriber.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RUST_LOG` | Tracing filter directive | `info` |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with console output.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
