use crate::error::RenderError;
use image::error::ImageError;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::{Cursor, Write};
use std::path::Path;
use tiny_skia::Pixmap;
use tracing::debug;

/// Output format implied by the file extension.
pub fn format_for(path: &Path) -> Result<ImageFormat, RenderError> {
    ImageFormat::from_path(path).map_err(|_| RenderError::UnsupportedFormat(path.to_path_buf()))
}

/// Opaque RGB copy of a pixmap. The figure background is already opaque.
pub fn to_rgb(pixmap: &Pixmap) -> RgbImage {
    let mut rgb = RgbImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in rgb.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        dst.0 = [color.red(), color.green(), color.blue()];
    }
    rgb
}

pub fn encode(pixmap: &Pixmap, format: ImageFormat, path: &Path) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Cursor::new(vec![]);
    DynamicImage::ImageRgb8(to_rgb(pixmap))
        .write_to(&mut bytes, format)
        .map_err(|e| match e {
            ImageError::Unsupported(_) => RenderError::UnsupportedFormat(path.to_path_buf()),
            other => RenderError::Encode(other),
        })?;
    Ok(bytes.into_inner())
}

/// Write through a hidden temporary beside `target` so a failure never leaves a partial file.
pub fn write_atomically(target: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = format!(
        ".{}.",
        target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".tmp");
    // Same mode a plain create would get, not the private 0600 of scratch files
    #[cfg(unix)]
    builder.permissions(std::os::unix::fs::PermissionsExt::from_mode(0o644));
    let mut temporary = builder.tempfile_in(dir).map_err(RenderError::Write)?;
    temporary.write_all(bytes).map_err(RenderError::Write)?;
    temporary.as_file().sync_all().map_err(RenderError::Write)?;
    // Dropping the temporary on any error removes it
    temporary
        .persist(target)
        .map_err(|e| RenderError::Write(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), target.display());
    Ok(())
}

pub fn save(pixmap: &Pixmap, target: &Path) -> Result<(), RenderError> {
    let format = format_for(target)?;
    let bytes = encode(pixmap, format, target)?;
    write_atomically(target, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn white(width: u32, height: u32) -> Pixmap {
        let mut pixmap = Pixmap::new(width, height).unwrap();
        pixmap.fill(tiny_skia::Color::WHITE);
        pixmap
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(format_for(Path::new("a/b.png")).unwrap(), ImageFormat::Png);
        assert_eq!(format_for(Path::new("b.JPG")).unwrap(), ImageFormat::Jpeg);
        assert_eq!(format_for(Path::new("b.tif")).unwrap(), ImageFormat::Tiff);
        assert!(matches!(
            format_for(Path::new("b.xyz")),
            Err(RenderError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            format_for(Path::new("no_extension")),
            Err(RenderError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn saves_and_decodes() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["map.png", "map.jpg", "map.bmp"] {
            let target = dir.path().join(name);
            save(&white(20, 10), &target).unwrap();
            let decoded = image::open(&target).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (20, 10));
        }
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing_dir").join("map.png");
        assert!(matches!(save(&white(4, 4), &target), Err(RenderError::Write(_))));
        assert!(!target.exists());
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn failed_rename_removes_temporary() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the final rename fail after the bytes are written
        let target = dir.path().join("map.png");
        fs::create_dir(&target).unwrap();
        assert!(matches!(save(&white(4, 4), &target), Err(RenderError::Write(_))));
        assert!(target.is_dir());
        assert_eq!(entries(dir.path()), vec!["map.png".to_string()]);
    }

    #[test]
    fn replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("map.png");
        fs::write(&target, b"stale").unwrap();
        save(&white(6, 3), &target).unwrap();
        let decoded = image::open(&target).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 3));
        assert_eq!(entries(dir.path()), vec!["map.png".to_string()]);
    }
}
