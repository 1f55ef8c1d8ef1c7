//! Fallback to the sheet and manifest written by a previous run
//!
//! Teams the events API no longer has an avatar for keep the one they had
//! last time, cut out of the old `avatars.png`.

use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::avatar::LegacySheetAvatar;
use crate::models::{Manifest, PendingSet};

/// Error reading legacy data that is present but unusable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LegacyError {
    #[error("Failed to read legacy manifest '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse legacy manifest '{}': {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to load legacy sheet '{}': {source}", path.display())]
    Sheet {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Load legacy avatars for every team that is still pending.
///
/// Missing manifest or sheet files aren't an error: a warning is logged and
/// `pending` is left untouched.
pub fn load_legacy_avatars(
    manifest_path: &Path,
    sheet_path: &Path,
    pending: &mut PendingSet,
) -> Result<Vec<LegacySheetAvatar>, LegacyError> {
    if !manifest_path.is_file() || !sheet_path.is_file() {
        warn!(
            manifest = %manifest_path.display(),
            sheet = %sheet_path.display(),
            "old avatars manifest or sheet not found, skipping import of old avatars"
        );
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(manifest_path)
        .map_err(|source| LegacyError::Io { path: manifest_path.to_path_buf(), source })?;
    let manifest: Manifest = serde_json::from_str(&content)
        .map_err(|source| LegacyError::Manifest { path: manifest_path.to_path_buf(), source })?;
    let sheet = image::open(sheet_path)
        .map_err(|source| LegacyError::Sheet { path: sheet_path.to_path_buf(), source })?
        .to_rgba8();

    let avatars = match_legacy_avatars(&manifest, Arc::new(sheet), pending);
    info!(count = avatars.len(), "reused avatars from the previous sheet");
    Ok(avatars)
}

/// Take every pending team listed in `manifest`, in the manifest's order.
pub fn match_legacy_avatars(
    manifest: &Manifest,
    sheet: Arc<RgbaImage>,
    pending: &mut PendingSet,
) -> Vec<LegacySheetAvatar> {
    let mut avatars = Vec::new();

    for (team, loc) in manifest.locations.iter() {
        if pending.is_empty() {
            break;
        }
        if pending.take(team) {
            let avatar = LegacySheetAvatar::new(team, Arc::clone(&sheet), loc);
            debug!(team, x = avatar.loc().x, y = avatar.loc().y, "reusing old avatar");
            avatars.push(avatar);
        }
    }

    avatars
}
