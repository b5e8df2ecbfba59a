use std::path::Path;

use anyhow::Result;
use log::{info, LevelFilter};
use svg::Document;

use crate::EPOCH;

pub mod cli;
pub mod svg_export;

pub fn write_svg(document: &Document, path: &Path) -> Result<()> {
    svg::save(path, document)?;
    info!("layout SVG written to {}", path.display());
    Ok(())
}

/// Stdout logger prefixing every line with the level and the seconds
/// elapsed since process start.
pub fn init_logger(level_filter: LevelFilter) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{:<5} {:>9.3}s  {message}",
                record.level(),
                EPOCH.elapsed().as_secs_f64()
            ))
        })
        .level(level_filter)
        .chain(std::io::stdout())
        .apply()?;
    info!("started at {}", jiff::Timestamp::now());
    Ok(())
}
