use std::path::PathBuf;

use color_eyre::Result;
use color_eyre::eyre::Context;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The network library logs every packet at info.
const NOISY_TARGETS: &[&str] = &["soulseek_rs"];

/// Most verbose level any output wants; the root dispatch filters at this.
fn root_level(console_level: LevelFilter, file_level: Option<LevelFilter>) -> LevelFilter {
    file_level.map_or(console_level, |file| console_level.max(file))
}

/// Colored console output on stderr, plus an optional plain log file.
pub fn setup_logging(
    console_level: LevelFilter,
    log_file: Option<PathBuf>,
    file_level: LevelFilter,
) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format(TIMESTAMP_FORMAT),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(console_level)
        .chain(std::io::stderr());

    let mut root = fern::Dispatch::new()
        .level(root_level(
            console_level,
            log_file.as_ref().map(|_| file_level),
        ))
        .chain(console);
    for target in NOISY_TARGETS {
        root = root.level_for(*target, LevelFilter::Warn);
    }

    if let Some(path) = log_file {
        let file = fern::log_file(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        root = root.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} [{}] {}: {}",
                        chrono::Local::now().format(TIMESTAMP_FORMAT),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .level(file_level)
                .chain(file),
        );
    }

    root.apply().wrap_err("Failed to install logger")?;
    Ok(())
}
