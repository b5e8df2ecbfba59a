use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::entities::Bin;

/// Writes one `Bin-<k>.txt` (k is 1-based) per bin into `dir` and returns
/// the created paths.
pub fn write_bin_files(bins: &[Bin], dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(bins.len());
    for (k, bin) in bins.iter().enumerate() {
        let path = dir.join(format!("Bin-{}.txt", k + 1));
        write_bin_file(bin, &path)?;
        paths.push(path);
    }
    Ok(paths)
}

/// First line: the placed count. One line per placed piece afterwards:
/// `<id> <rotation-degrees> <x>,<y>` with (x, y) the min-corner of the
/// piece's bbox in the bin's coordinate system.
pub fn write_bin_file(bin: &Bin, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("could not create output file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{}", bin.n_placed())?;
    for piece in bin.placed_pieces() {
        let bbox = piece.bbox();
        writeln!(
            out,
            "{} {} {},{}",
            piece.id(),
            piece.rotation(),
            bbox.x_min,
            bbox.y_min
        )?;
    }
    out.flush()?;
    info!("placements written to {}", path.display());
    Ok(())
}
