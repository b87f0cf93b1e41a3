//! Image encoding: `DynamicImage` → PNG temp file ready for upload.
//!
//! PNG is lossless; JPEG artefacts on rendered text make slides harder for
//! the vision model to read. Each page is written to its own uniquely named
//! file inside the run directory and handed to the publisher. The returned
//! [`NamedTempFile`] deletes the file when dropped, so the local copy is
//! gone whether the upload succeeds or not.

use crate::error::PodcastError;
use crate::output::PageImage;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &image::DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Write a page as `page_<N>_<random>.png` inside `dir`.
pub fn write_page_png(page: &PageImage, dir: &Path) -> Result<NamedTempFile, PodcastError> {
    let png = encode_png(&page.image).map_err(|e| PodcastError::RasterisationFailed {
        page: page.page_num,
        detail: format!("PNG encoding failed: {e}"),
    })?;

    let mut file = tempfile::Builder::new()
        .prefix(&format!("page_{}_", page.page_num))
        .suffix(".png")
        .tempfile_in(dir)
        .map_err(|e| PodcastError::Internal(format!("tempfile: {e}")))?;
    file.write_all(&png)
        .and_then(|()| file.flush())
        .map_err(|e| PodcastError::Internal(format!("tempfile write: {e}")))?;

    debug!(
        "Page {} ({}x{}) → {} ({} bytes PNG)",
        page.page_num,
        page.width(),
        page.height(),
        file.path().display(),
        png.len()
    );
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn page_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let page = PageImage {
            page_num: 7,
            image: DynamicImage::new_rgb8(8, 8),
        };
        let file = write_page_png(&page, dir.path()).unwrap();
        let path = file.path().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("page_7_") && name.ends_with(".png"), "got {name}");
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
    }
}
