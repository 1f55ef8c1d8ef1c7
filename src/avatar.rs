//! Avatar sources - things that can draw a 40x40 team avatar into a sheet
//!
//! Two kinds exist: avatars freshly downloaded from the events API (encoded
//! image bytes) and avatars cut out of the sheet a previous run produced.
//! The stitcher only talks to them through [`RenderAvatar`].

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageFormat, ImageOutputFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::models::{Loc, TeamNumber};

/// All FRC avatars are 40x40.
pub const AVATAR_SIZE: u32 = 40;

/// Gap between neighbouring avatars in a sheet.
///
/// Keeps avatars from bleeding into each other when the whole sheet is
/// resized by the map client.
pub const AVATAR_BORDER: u32 = 2;

/// Distance between the top-left corners of adjacent cells.
pub const CELL_STRIDE: u32 = AVATAR_SIZE + AVATAR_BORDER;

/// Decoders tried by the fallback path, in order, ignoring magic bytes.
const FALLBACK_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Ico,
    ImageFormat::Tiff,
    ImageFormat::Tga,
    ImageFormat::Pnm,
];

/// Error raised while drawing an avatar into a sheet.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AvatarError {
    /// Neither the primary nor the fallback codec could read the image
    #[error("Failed to decode avatar for team {team}: {source}")]
    Decode {
        team: TeamNumber,
        #[source]
        source: ImageError,
    },
    /// The legacy location does not fit inside the legacy sheet
    #[error("Legacy avatar for team {team} at ({x}, {y}) lies outside the {sheet_w}x{sheet_h} legacy sheet")]
    LegacyRegionOutOfBounds { team: TeamNumber, x: u32, y: u32, sheet_w: u32, sheet_h: u32 },
}

/// Drawing contract shared by every avatar kind.
pub trait RenderAvatar {
    /// Team this avatar belongs to.
    fn team_number(&self) -> TeamNumber;

    /// Draw the 40x40 avatar with its top-left corner at `(x, y)` in `sheet`.
    ///
    /// Cells start out transparent, so pixels are copied as-is rather than
    /// blended.
    fn render(&self, sheet: &mut RgbaImage, x: u32, y: u32) -> Result<(), AvatarError>;
}

/// An avatar downloaded from the events API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAvatar {
    team: TeamNumber,
    data: Vec<u8>,
}

impl EncodedAvatar {
    /// Wrap already base64-decoded image bytes.
    pub fn new(team: TeamNumber, data: Vec<u8>) -> Self {
        Self { team, data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Decode the stored bytes into a 40x40 RGBA image.
    pub fn decode(&self) -> Result<RgbaImage, AvatarError> {
        // Let the codec sniff the format. Some uploads are JPEGs saved
        // with a .png name, so the declared format can't be trusted.
        let decoded = match image::load_from_memory(&self.data) {
            Ok(img) => img,
            Err(primary) => {
                warn!(team = self.team, error = %primary, "primary decoder failed, retrying with fallback decoders");
                decode_fallback(&self.data)
                    .map_err(|source| AvatarError::Decode { team: self.team, source })?
            }
        };

        Ok(fit_to_cell(decoded.to_rgba8()))
    }
}

impl RenderAvatar for EncodedAvatar {
    fn team_number(&self) -> TeamNumber {
        self.team
    }

    fn render(&self, sheet: &mut RgbaImage, x: u32, y: u32) -> Result<(), AvatarError> {
        let avatar = self.decode()?;
        imageops::replace(sheet, &avatar, i64::from(x), i64::from(y));
        Ok(())
    }
}

/// An avatar cut from the sheet of a previous run.
///
/// Many of these share one legacy sheet; rendering only ever reads from it.
#[derive(Debug, Clone)]
pub struct LegacySheetAvatar {
    team: TeamNumber,
    sheet: Arc<RgbaImage>,
    loc: Loc,
}

impl LegacySheetAvatar {
    pub fn new(team: TeamNumber, sheet: Arc<RgbaImage>, loc: Loc) -> Self {
        Self { team, sheet, loc }
    }

    pub fn loc(&self) -> Loc {
        self.loc
    }

    /// Copy the avatar's region out of the shared legacy sheet.
    pub fn crop(&self) -> Result<RgbaImage, AvatarError> {
        let (sheet_w, sheet_h) = self.sheet.dimensions();
        let Loc { x, y } = self.loc;
        let fits = x.checked_add(AVATAR_SIZE).is_some_and(|right| right <= sheet_w)
            && y.checked_add(AVATAR_SIZE).is_some_and(|bottom| bottom <= sheet_h);
        if !fits {
            return Err(AvatarError::LegacyRegionOutOfBounds { team: self.team, x, y, sheet_w, sheet_h });
        }

        Ok(imageops::crop_imm(&*self.sheet, x, y, AVATAR_SIZE, AVATAR_SIZE).to_image())
    }
}

impl RenderAvatar for LegacySheetAvatar {
    fn team_number(&self) -> TeamNumber {
        self.team
    }

    fn render(&self, sheet: &mut RgbaImage, x: u32, y: u32) -> Result<(), AvatarError> {
        let avatar = self.crop()?;
        imageops::replace(sheet, &avatar, i64::from(x), i64::from(y));
        Ok(())
    }
}

/// Any avatar the stitcher can place.
#[derive(Debug, Clone)]
pub enum AvatarSource {
    Encoded(EncodedAvatar),
    Legacy(LegacySheetAvatar),
}

impl RenderAvatar for AvatarSource {
    fn team_number(&self) -> TeamNumber {
        match self {
            AvatarSource::Encoded(avatar) => avatar.team_number(),
            AvatarSource::Legacy(avatar) => avatar.team_number(),
        }
    }

    fn render(&self, sheet: &mut RgbaImage, x: u32, y: u32) -> Result<(), AvatarError> {
        match self {
            AvatarSource::Encoded(avatar) => avatar.render(sheet, x, y),
            AvatarSource::Legacy(avatar) => avatar.render(sheet, x, y),
        }
    }
}

impl From<EncodedAvatar> for AvatarSource {
    fn from(avatar: EncodedAvatar) -> Self {
        AvatarSource::Encoded(avatar)
    }
}

impl From<LegacySheetAvatar> for AvatarSource {
    fn from(avatar: LegacySheetAvatar) -> Self {
        AvatarSource::Legacy(avatar)
    }
}

/// Try every bundled decoder regardless of magic bytes, then round-trip the
/// first success through BMP.
fn decode_fallback(data: &[u8]) -> Result<DynamicImage, ImageError> {
    let mut outcome = image::load_from_memory_with_format(data, FALLBACK_FORMATS[0]);
    for &format in &FALLBACK_FORMATS[1..] {
        if outcome.is_ok() {
            break;
        }
        outcome = image::load_from_memory_with_format(data, format);
    }

    reencode_as_bmp(outcome?)
}

fn reencode_as_bmp(img: DynamicImage) -> Result<DynamicImage, ImageError> {
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let mut bmp = Cursor::new(Vec::new());
    rgba.write_to(&mut bmp, ImageOutputFormat::Bmp)?;
    image::load_from_memory_with_format(bmp.get_ref(), ImageFormat::Bmp)
}

/// Resize anything that isn't exactly 40x40 so it can't spill into the next cell.
fn fit_to_cell(img: RgbaImage) -> RgbaImage {
    if img.dimensions() == (AVATAR_SIZE, AVATAR_SIZE) {
        img
    } else {
        imageops::resize(&img, AVATAR_SIZE, AVATAR_SIZE, FilterType::Triangle)
    }
}
