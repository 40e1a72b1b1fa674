//! # mailcourier-log
//!
//! Process-wide diagnostic sink for the mailcourier crates.
//!
//! Records are written through `tracing`, so every event carries its file,
//! line and module provenance. The installed subscriber tees each record to
//! standard error and to a rotating log file (2 MiB cap, single `.bak`
//! generation), serialised at whole-record granularity by one mutex.
//!
//! ```ignore
//! mailcourier_log::init_default()?;
//! tracing::debug!("connected to {}", host);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod format;
mod rotate;

pub use format::format_positional;
pub use rotate::RotatingWriter;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default log file path, rotated to `application-log.out.bak`.
pub const DEFAULT_LOG_FILE: &str = "application-log.out";

/// Installs the global subscriber, writing to standard error and `path`.
///
/// The filter honours `RUST_LOG` and defaults to `debug`.
///
/// # Errors
///
/// Returns the I/O error when the log file cannot be opened.
pub fn init(path: &str) -> std::io::Result<()> {
    let writer = RotatingWriter::open(path)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
    Ok(())
}

/// Installs the global subscriber with [`DEFAULT_LOG_FILE`].
///
/// # Errors
///
/// Returns the I/O error when the log file cannot be opened.
pub fn init_default() -> std::io::Result<()> {
    init(DEFAULT_LOG_FILE)
}

/// Logs at error level, then aborts the process.
///
/// Reserved for internal invariant violations that must not be survived.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        ::tracing::error!($($arg)*);
        ::std::process::abort();
    }};
}

/// Aborts the process when the condition does not hold.
#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if !$cond {
            $crate::fatal!(concat!(stringify!($cond), " condition failed!"));
        }
    };
}
