use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

/// 2D irregular bin packing: maximal free rectangles, gravity compression
/// and NFP-backed placement.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Instance file describing the bin and the pieces
    pub input_file: PathBuf,
    /// Folder receiving the Bin-<k>.txt files
    #[arg(short, long, value_name = "FOLDER", default_value = ".")]
    pub output_folder: PathBuf,
    /// JSON file overriding the default PackConfig
    #[arg(short, long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,
    /// Use the 5°-step rotation set in stages 2 and 3
    #[arg(long)]
    pub fine_rotations: bool,
    /// Fan the free-rectangle slot search out over a thread pool
    #[arg(long)]
    pub parallel: bool,
    /// Route the collision oracle through the NFP module
    #[arg(long)]
    pub nfp_collision: bool,
    /// Enable the exact free-space island placement stage
    #[arg(long)]
    pub islands: bool,
    /// Pack the pieces in input order instead of descending area
    #[arg(long)]
    pub preserve_order: bool,
    /// Also write one SVG drawing per produced bin
    #[arg(long)]
    pub svg: bool,
    #[arg(
        short,
        long,
        value_name = "[off, error, warn, info, debug, trace]",
        default_value = "info"
    )]
    pub log_level: LevelFilter,
}
