//! Spritesheet stitching - places every avatar into a square grid

use image::RgbaImage;
use tracing::{debug, info};

use crate::avatar::{AvatarError, RenderAvatar, CELL_STRIDE};
use crate::models::{Loc, Manifest};

/// Grid geometry for a sheet holding a given number of avatars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// Cells per row and per column
    pub sheet_size: u32,
    /// Pixels from one cell's top-left corner to the next
    pub cell_stride: u32,
}

impl GridLayout {
    /// Smallest square grid that fits `count` avatars row-major.
    ///
    /// # Examples
    ///
    /// ```
    /// use avatar_sheet::spritesheet::GridLayout;
    ///
    /// assert_eq!(GridLayout::for_count(0).sheet_size, 0);
    /// assert_eq!(GridLayout::for_count(3).sheet_size, 2);
    /// assert_eq!(GridLayout::for_count(9).sheet_size, 3);
    /// assert_eq!(GridLayout::for_count(10).sheet_size, 4);
    /// ```
    pub fn for_count(count: usize) -> Self {
        let count = count as u64;
        let mut side = (count as f64).sqrt() as u64;
        while side * side < count {
            side += 1;
        }
        while side > 0 && (side - 1) * (side - 1) >= count {
            side -= 1;
        }

        Self { sheet_size: side as u32, cell_stride: CELL_STRIDE }
    }

    /// Width and height of the sheet in pixels.
    pub fn pixel_size(&self) -> u32 {
        self.sheet_size * self.cell_stride
    }

    /// Top-left pixel of the cell at `index`, filling rows left to right.
    pub fn cell_origin(&self, index: usize) -> Loc {
        let index = index as u32;
        Loc::new(
            (index % self.sheet_size) * self.cell_stride,
            (index / self.sheet_size) * self.cell_stride,
        )
    }
}

/// A stitched sheet and the manifest describing it.
#[derive(Debug, Clone)]
pub struct Spritesheet {
    pub image: RgbaImage,
    pub manifest: Manifest,
}

impl Spritesheet {
    pub fn is_empty(&self) -> bool {
        self.manifest.locations.is_empty()
    }
}

/// Draw every avatar into a fresh sheet, in input order.
///
/// Cells are handed out row by row; unused trailing cells stay transparent.
/// No avatars gives a 0x0 sheet with `sheet_size` 0.
///
/// # Errors
///
/// The first avatar that fails to render aborts the whole sheet.
pub fn compose_spritesheet<A: RenderAvatar>(avatars: &[A]) -> Result<Spritesheet, AvatarError> {
    let layout = GridLayout::for_count(avatars.len());
    let side = layout.pixel_size();
    let mut image = RgbaImage::new(side, side);
    let mut manifest = Manifest::new(layout.sheet_size);

    info!(count = avatars.len(), sheet_size = layout.sheet_size, "stitching avatars");

    for (i, avatar) in avatars.iter().enumerate() {
        let loc = layout.cell_origin(i);
        avatar.render(&mut image, loc.x, loc.y)?;
        debug!(team = avatar.team_number(), x = loc.x, y = loc.y, "placed avatar");
        manifest.locations.insert(avatar.team_number(), loc);
    }

    Ok(Spritesheet { image, manifest })
}
