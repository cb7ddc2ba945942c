//----------------------------------------------------------------------------------------- std lib
use std::io::Write;
use std::time::Instant;
//--------------------------------------------------------------------------------- other libraries
use log::info;
use once_cell::sync::Lazy;

/// When the logger was initialized, log lines are stamped relative to it.
pub static INIT_INSTANT: Lazy<Instant> = Lazy::new(Instant::now);

/// The filter used when `RUST_LOG` isn't set.
///
/// Silences every dependency except the tunedir crates, whose targets all start with `tunedir`.
#[must_use]
#[inline]
pub fn default_filter(level: log::LevelFilter) -> String {
    format!("off,tunedir={level}")
}

//---------------------------------------------------------------------------------------------------- Logger init function
#[allow(clippy::module_name_repetitions)]
/// Initializes the logger.
///
/// This enables console logging on all the internals of `tunedir`.
///
/// Functionality is provided by [`log`], `tracing` events and spans are forwarded to it.
///
/// The levels are:
/// - ERROR
/// - WARN
/// - INFO
/// - DEBUG
/// - TRACE
///
/// Calling this more than once is harmless, later calls are ignored.
#[cfg(not(tarpaulin_include))]
#[inline]
pub fn init_logger(filter: log::LevelFilter) {
    // Initialize timer.
    let now = Lazy::force(&INIT_INSTANT);

    // `RUST_LOG` wins over the configured level.
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let filters = if env.is_empty() {
        default_filter(filter)
    } else {
        env.clone()
    };

    let result = env_logger::Builder::new()
        .format(move |buf, record| {
            let style = buf.default_level_style(record.level());
            let level = match record.level() {
                log::Level::Debug => "D",
                log::Level::Trace => "T",
                log::Level::Info => "I",
                log::Level::Warn => "W",
                log::Level::Error => "E",
            };
            let elapsed = now.elapsed();
            writeln!(
                buf,
                // Longest PATH in the repo: `daemon/src/services/library.rs` - `30` characters
                "| {style}{level}{style:#} | {: >4}.{:03} | {: >30} @ {: <3} | {}",
                elapsed.as_secs(),
                elapsed.subsec_millis(),
                record.file_static().unwrap_or("???"),
                record.line().unwrap_or(0),
                record.args(),
            )
        })
        .write_style(env_logger::WriteStyle::Auto)
        .parse_filters(&filters)
        .try_init();

    if result.is_err() {
        return;
    }

    if env.is_empty() {
        info!("Log Level (Flag) ... {filter}");
    } else {
        info!("Log Level (RUST_LOG) ... {env}");
    }
}
