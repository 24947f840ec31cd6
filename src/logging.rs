use crate::config;
use anyhow::Result;
use log::LevelFilter;
use std::env;
use std::path::PathBuf;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const TIMESTAMP: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Sends `log` records to `reel.log` in the config directory. The terminal
/// belongs to the UI, so nothing goes to stderr.
pub fn setup_logging(offset: UtcOffset) -> Result<PathBuf> {
    let path = config::log_path()?;

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let timestamp = OffsetDateTime::now_utc()
                .to_offset(offset)
                .format(TIMESTAMP)
                .unwrap_or_default();
            out.finish(format_args!(
                "[{}][{}] {}",
                timestamp,
                record.level(),
                message
            ))
        })
        .level(level_from_env())
        .level_for("symphonia_core", LevelFilter::Warn)
        .chain(fern::log_file(&path)?)
        .apply()?;

    Ok(path)
}

pub fn level_from_env() -> LevelFilter {
    parse_level(env::var("REEL_LOG").ok().as_deref())
}

pub fn parse_level(raw: Option<&str>) -> LevelFilter {
    let Some(raw) = raw else {
        return LevelFilter::Info;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}
