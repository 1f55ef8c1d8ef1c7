//! Writing the stitched sheet and its manifest

use image::{ImageFormat, RgbaImage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Manifest;
use crate::spritesheet::Spritesheet;

/// Error type for output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("manifest encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the manifest and sheet end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub manifest: PathBuf,
    pub sheet: PathBuf,
}

/// Save an RGBA image as PNG, whatever the path's extension.
///
/// Parent directories are created if they don't exist.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), OutputError> {
    create_parent(path)?;
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Write a manifest as compact JSON.
pub fn write_manifest(manifest: &Manifest, path: &Path) -> Result<(), OutputError> {
    create_parent(path)?;
    let json = serde_json::to_string(manifest)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write the sheet and manifest as a pair.
///
/// Both are written to `.tmp` siblings first and only renamed into place once
/// both encoded successfully, sheet first. The previous sheet is moved to a
/// `.bak` sibling while the pair is swapped in; if either rename fails it is
/// put back, so the old pair stays together. Temporaries never outlive the
/// call.
pub fn save_spritesheet(sheet: &Spritesheet, paths: &OutputPaths) -> Result<(), OutputError> {
    let sheet_tmp = temp_path(&paths.sheet);
    let manifest_tmp = temp_path(&paths.manifest);

    let staged = save_png(&sheet.image, &sheet_tmp)
        .and_then(|()| write_manifest(&sheet.manifest, &manifest_tmp));
    if let Err(e) = staged {
        discard(&[&sheet_tmp, &manifest_tmp]);
        return Err(e);
    }

    let backup = backup_path(&paths.sheet);
    let had_previous = paths.sheet.exists();
    if had_previous {
        if let Err(e) = fs::rename(&paths.sheet, &backup) {
            discard(&[&sheet_tmp, &manifest_tmp]);
            return Err(e.into());
        }
    }

    let swapped = fs::rename(&sheet_tmp, &paths.sheet).and_then(|()| fs::rename(&manifest_tmp, &paths.manifest));
    if let Err(e) = swapped {
        warn!(sheet = %paths.sheet.display(), error = %e, "could not install new sheet pair, restoring previous sheet");
        let _ = fs::remove_file(&paths.sheet);
        if had_previous {
            fs::rename(&backup, &paths.sheet)?;
        }
        discard(&[&sheet_tmp, &manifest_tmp]);
        return Err(e.into());
    }

    if had_previous {
        let _ = fs::remove_file(&backup);
    }

    info!(sheet = %paths.sheet.display(), manifest = %paths.manifest.display(), "saved avatar sheet");
    Ok(())
}

/// `avatars.png` -> `avatars.png.tmp`
fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

/// `avatars.png` -> `avatars.png.bak`
fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "output".into());
    name.push(suffix);
    path.with_file_name(name)
}

fn discard(paths: &[&Path]) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

fn create_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Loc;
    use image::Rgba;
    use tempfile::TempDir;

    fn small_sheet() -> Spritesheet {
        let mut manifest = Manifest::new(1);
        manifest.locations.insert(254, Loc::new(0, 0));
        Spritesheet { image: RgbaImage::from_pixel(42, 42, Rgba([255, 0, 0, 255])), manifest }
    }

    fn paths(dir: &Path) -> OutputPaths {
        OutputPaths { manifest: dir.join("avatars.json"), sheet: dir.join("avatars.png") }
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(temp_path(Path::new("out/avatars.png")), PathBuf::from("out/avatars.png.tmp"));
    }

    #[test]
    fn test_save_png_creates_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/sheet.png");
        save_png(&RgbaImage::new(4, 4), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_save_spritesheet_writes_pair() {
        let temp = TempDir::new().unwrap();
        let out = paths(temp.path());

        save_spritesheet(&small_sheet(), &out).unwrap();

        let loaded = image::open(&out.sheet).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (42, 42));
        assert_eq!(*loaded.get_pixel(0, 0), Rgba([255, 0, 0, 255]));

        let manifest: Manifest = serde_json::from_str(&fs::read_to_string(&out.manifest).unwrap()).unwrap();
        assert_eq!(manifest, small_sheet().manifest);

        assert!(!temp_path(&out.sheet).exists());
        assert!(!temp_path(&out.manifest).exists());
    }

    #[test]
    fn test_failed_write_leaves_previous_outputs() {
        let temp = TempDir::new().unwrap();
        let out = paths(temp.path());
        fs::write(&out.manifest, "previous").unwrap();
        fs::write(&out.sheet, "previous").unwrap();

        // A directory in the way of the staged manifest
        fs::create_dir(temp_path(&out.manifest)).unwrap();
        assert!(save_spritesheet(&small_sheet(), &out).is_err());

        assert_eq!(fs::read_to_string(&out.manifest).unwrap(), "previous");
        assert_eq!(fs::read_to_string(&out.sheet).unwrap(), "previous");
        assert!(!temp_path(&out.sheet).exists());
    }

    #[test]
    fn test_failed_manifest_install_restores_previous_sheet() {
        let temp = TempDir::new().unwrap();
        let out = paths(temp.path());
        fs::write(&out.sheet, "previous").unwrap();

        // A non-empty directory where the manifest goes makes the final rename fail
        fs::create_dir(&out.manifest).unwrap();
        fs::write(out.manifest.join("keep"), "x").unwrap();

        assert!(save_spritesheet(&small_sheet(), &out).is_err());

        assert_eq!(fs::read_to_string(&out.sheet).unwrap(), "previous");
        assert!(out.manifest.join("keep").exists());
        assert!(!temp_path(&out.sheet).exists());
        assert!(!temp_path(&out.manifest).exists());
        assert!(!backup_path(&out.sheet).exists());
    }

    #[test]
    fn test_failed_manifest_install_without_previous_sheet() {
        let temp = TempDir::new().unwrap();
        let out = paths(temp.path());
        fs::create_dir(&out.manifest).unwrap();
        fs::write(out.manifest.join("keep"), "x").unwrap();

        assert!(save_spritesheet(&small_sheet(), &out).is_err());

        assert!(!out.sheet.exists());
        assert!(!temp_path(&out.manifest).exists());
    }

    #[test]
    fn test_save_spritesheet_replaces_previous_pair() {
        let temp = TempDir::new().unwrap();
        let out = paths(temp.path());
        fs::write(&out.manifest, "previous").unwrap();
        fs::write(&out.sheet, "previous").unwrap();

        save_spritesheet(&small_sheet(), &out).unwrap();

        assert_eq!(image::open(&out.sheet).unwrap().to_rgba8().dimensions(), (42, 42));
        assert_ne!(fs::read_to_string(&out.manifest).unwrap(), "previous");
        assert!(!backup_path(&out.sheet).exists());
    }
}
