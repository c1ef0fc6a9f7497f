//! Tracing setup for host programs using this library.
//!
//! The library itself only emits events; a host program should install a
//! subscriber once at startup, either with [`init`] or with its own
//! `tracing-subscriber` stack. Library modules `use
//! crate::tracing::prelude::*` for the level macros.

use std::env;
use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Install a subscriber: journald when running under systemd, stderr
/// otherwise.
pub fn init() {
    if env::var("JOURNAL_STREAM").is_ok() {
        if let Ok(layer) = tracing_journald::layer() {
            tracing_subscriber::registry().with(layer).init();
            return;
        }
        // Journald advertised but unreachable; stderr is better than silence.
        init_stderr();
        error!("Failed to connect to journald, logging to stderr.");
    } else {
        init_stderr();
    }
}

// Stderr subscriber filtered by RUST_LOG, defaulting to INFO.
fn init_stderr() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(ClockTimer),
        )
        .init();
}

/// Best-effort subscriber installation for tests; repeated calls are no-ops.
#[doc(hidden)]
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

// Wall-clock timestamps in local time, to the second. The default formatter
// prints UTC with sub-second digits that only add noise on a serial link
// timescale.
struct ClockTimer;

impl FormatTime for ClockTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or(OffsetDateTime::now_utc());
        write!(
            w,
            "{}",
            now.format(time::macros::format_description!(
                "[hour]:[minute]:[second]"
            ))
            .unwrap(),
        )
    }
}
