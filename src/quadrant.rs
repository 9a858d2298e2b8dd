//! Fixed-grid partitioning of a full-screen capture.
//!
//! Whole-screen prompts are both expensive and inaccurate; splitting the
//! screenshot into a small grid lets the vision model reason over one tile
//! at a time.

use crate::config::GridConfig;
use crate::errors::ResolutionError;
use image::GenericImageView;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One tile of the partition grid, row-major, 1-based index.
#[derive(Debug, Clone)]
pub struct QuadrantTile {
    pub index: usize,
    pub path: PathBuf,
}

/// Split `image_path` into `rows * cols` equal tiles and write them under
/// `out_dir` as PNG files.
///
/// Tile dimensions are `width / cols` by `height / rows` using integer
/// division: when the screen size is not an exact multiple of the grid, the
/// right/bottom remainder strip is not covered by any tile. Deterministic
/// for a given `(image, rows, cols)`.
pub fn partition(
    image_path: &Path,
    grid: &GridConfig,
    out_dir: &Path,
) -> Result<Vec<QuadrantTile>, ResolutionError> {
    let image = image::open(image_path).map_err(|e| {
        ResolutionError::ImageLoad(format!("cannot load {}: {e}", image_path.display()))
    })?;
    fs::create_dir_all(out_dir)?;

    let (width, height) = image.dimensions();
    let tile_width = width / grid.cols;
    let tile_height = height / grid.rows;
    if tile_width == 0 || tile_height == 0 {
        return Err(ResolutionError::InvalidInput(format!(
            "image {width}x{height} too small for a {}x{} grid",
            grid.rows, grid.cols
        )));
    }

    debug!(
        width,
        height, tile_width, tile_height, "partitioning screenshot"
    );

    let mut tiles = Vec::with_capacity((grid.rows * grid.cols) as usize);
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let index = (row * grid.cols + col + 1) as usize;
            let tile = image.crop_imm(col * tile_width, row * tile_height, tile_width, tile_height);
            let path = out_dir.join(format!("quadrant_{index:02}.png"));
            tile.save(&path).map_err(|e| {
                ResolutionError::ImageWrite(format!("cannot write {}: {e}", path.display()))
            })?;
            tiles.push(QuadrantTile { index, path });
        }
    }

    info!(tiles = tiles.len(), "screenshot partitioned");
    Ok(tiles)
}
