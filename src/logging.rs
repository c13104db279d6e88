//! Logger setup for the daemon.
//!
//! The `log` facade is used throughout the crate; this installs `env_logger`
//! with an `info` default (override with `RUST_LOG`). With a log path, lines
//! are appended to that file as `<local time> : <LEVEL> : <message>`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Arguments;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

pub fn init_logging(log_path: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = log_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log folder {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        builder
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}",
                    format_line(&Local::now(), record.level(), record.args())
                )
            })
            .target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("install logger")?;
    Ok(())
}

fn format_line(now: &DateTime<Local>, level: log::Level, message: &Arguments<'_>) -> String {
    format!("{} : {} : {}", now.format(LOG_TIME_FORMAT), level, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_lines_use_the_movement_log_layout() {
        let now = Local
            .with_ymd_and_hms(2024, 5, 1, 3, 12, 45)
            .single()
            .expect("unambiguous local time")
            + chrono::Duration::milliseconds(120);
        let line = format_line(&now, log::Level::Info, &format_args!("Movement detected"));
        assert_eq!(line, "2024-05-01 03:12:45,120 : INFO : Movement detected");
    }
}
