use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use geo::Coord;

use crate::geometry::{Piece, Rect};

/// A parsed instance: the bin rectangle and the pieces to place, ids
/// assigned 1-based in file order.
#[derive(Debug)]
pub struct Instance {
    pub bin: Rect,
    pub pieces: Vec<Piece>,
}

pub fn read_instance(path: &Path) -> Result<Instance> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not open instance file {}", path.display()))?;
    parse_instance(&text)
        .with_context(|| format!("could not parse instance file {}", path.display()))
}

/// Parses the piece file format:
/// - line 1: `W H`, the integer bin dimensions;
/// - line 2: `N`, the piece count;
/// - one line per piece: whitespace-separated `x,y` tokens in CCW order;
/// - optional `@ x,y x,y ...` lines carving a hole into the piece above;
/// - blank lines are ignored everywhere.
pub fn parse_instance(text: &str) -> Result<Instance> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let (header_no, header) = lines.next().context("missing bin dimension line")?;
    let tokens: Vec<&str> = header.split_whitespace().collect();
    ensure!(
        tokens.len() == 2,
        "line {header_no}: expected bin dimensions 'W H', got '{}'",
        header.trim()
    );
    let width: i64 = tokens[0]
        .parse()
        .with_context(|| format!("line {header_no}: invalid bin width '{}'", tokens[0]))?;
    let height: i64 = tokens[1]
        .parse()
        .with_context(|| format!("line {header_no}: invalid bin height '{}'", tokens[1]))?;
    let bin = Rect::try_new(0.0, 0.0, width as f64, height as f64)
        .with_context(|| format!("line {header_no}: non-positive bin dimensions"))?;

    let (count_no, count_line) = lines.next().context("missing piece count line")?;
    let declared: usize = count_line.trim().parse().with_context(|| {
        format!(
            "line {count_no}: invalid piece count '{}'",
            count_line.trim()
        )
    })?;

    let mut pieces: Vec<Piece> = Vec::with_capacity(declared);
    for (line_no, line) in lines {
        let trimmed = line.trim();
        if let Some(hole_tokens) = trimmed.strip_prefix('@') {
            let outer = pieces
                .pop()
                .with_context(|| format!("line {line_no}: hole line before the first piece"))?;
            let hole = Piece::new(parse_points(hole_tokens, line_no)?, outer.id())
                .with_context(|| format!("line {line_no}: invalid hole"))?;
            let pierced = Piece::with_hole(&outer, &hole)
                .with_context(|| format!("line {line_no}: hole swallows its piece"))?;
            pieces.push(pierced);
        } else {
            ensure!(
                pieces.len() < declared,
                "line {line_no}: more piece lines than the declared {declared}"
            );
            let id = pieces.len() as u64 + 1;
            let piece = Piece::new(parse_points(trimmed, line_no)?, id)
                .with_context(|| format!("line {line_no}: invalid piece"))?;
            pieces.push(piece);
        }
    }
    ensure!(
        pieces.len() == declared,
        "expected {declared} pieces, found {}",
        pieces.len()
    );

    Ok(Instance { bin, pieces })
}

fn parse_points(tokens: &str, line_no: usize) -> Result<Vec<Coord<f64>>> {
    let mut points = Vec::new();
    for token in tokens.split_whitespace() {
        let (x, y) = token
            .split_once(',')
            .with_context(|| format!("line {line_no}: malformed point '{token}'"))?;
        let x: f64 = x
            .parse()
            .with_context(|| format!("line {line_no}: invalid coordinate '{x}'"))?;
        let y: f64 = y
            .parse()
            .with_context(|| format!("line {line_no}: invalid coordinate '{y}'"))?;
        ensure!(
            x.is_finite() && y.is_finite(),
            "line {line_no}: non-finite coordinate in '{token}'"
        );
        points.push(Coord { x, y });
    }
    ensure!(!points.is_empty(), "line {line_no}: no points on piece line");
    Ok(points)
}
