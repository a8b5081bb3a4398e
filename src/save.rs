// src/save.rs

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::ImageFormat;

use crate::extract::CapturedImage;

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("cannot create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// 默认文件名：`screenshot_<YYYYMMDD_HHMMSS>.png`
pub fn default_file_name(now: DateTime<Local>) -> String {
    format!("screenshot_{}.png", now.format("%Y%m%d_%H%M%S"))
}

/// 默认保存目录：桌面，没有桌面时退回主目录，再退回当前目录
pub fn default_directory() -> PathBuf {
    dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 保存对话框里没写扩展名时补上 `.png`
pub fn with_png_extension(mut path: PathBuf) -> PathBuf {
    if path.extension().is_none() {
        path.set_extension("png");
    }
    path
}

/// 以 PNG 编码写入 `path`，父目录不存在时先创建
pub fn write_png(image: &CapturedImage, path: &Path) -> Result<(), SaveError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| SaveError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    image
        .as_image()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| SaveError::Write { path: path.to_path_buf(), source })?;

    log::info!("Screenshot saved: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn sample() -> CapturedImage {
        CapturedImage::new(RgbaImage::from_fn(37, 21, |x, y| {
            Rgba([(x * 7) as u8, (y * 11) as u8, (x * y) as u8, (200 + x % 50) as u8])
        }))
    }

    #[test]
    fn file_name_uses_timestamp() {
        let t = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(default_file_name(t), "screenshot_20240309_070502.png");
    }

    #[test]
    fn missing_extension_becomes_png() {
        assert_eq!(with_png_extension(PathBuf::from("/tmp/shot")), PathBuf::from("/tmp/shot.png"));
        assert_eq!(with_png_extension(PathBuf::from("/tmp/shot.PNG")), PathBuf::from("/tmp/shot.PNG"));
    }

    #[test]
    fn png_round_trip_keeps_pixels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("shot.png");
        let img = sample();

        write_png(&img, &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded.dimensions(), (img.width(), img.height()));
        assert_eq!(reloaded.as_raw().as_slice(), img.as_raw());
    }

    #[test]
    fn unwritable_path_reports_error() {
        let dir = TempDir::new().unwrap();
        // 目标路径本身是目录，写入必然失败
        let err = write_png(&sample(), dir.path()).unwrap_err();
        assert!(matches!(err, SaveError::Write { .. }));
    }

    #[test]
    fn parent_that_is_a_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = write_png(&sample(), &blocker.join("shot.png")).unwrap_err();
        assert!(matches!(err, SaveError::CreateDir { .. }));
    }
}
