//! PDF rasterisation: render selected pages to normalised images via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated blocking
//! thread so the runtime's worker threads never stall during rendering.
//!
//! Rendering is all-or-nothing: any page that fails to render aborts the
//! whole run and no partial page set is returned.

use crate::config::PodcastConfig;
use crate::error::PodcastError;
use crate::output::{DocumentMetadata, PageImage};
use crate::pipeline::normalize::normalize_image;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Rasterise the selected pages of a PDF held in memory.
///
/// Returns one normalised [`PageImage`] per selected page, in document order.
pub async fn rasterize(
    pdf_bytes: Vec<u8>,
    config: &PodcastConfig,
) -> Result<Vec<PageImage>, PodcastError> {
    let options = RenderOptions::from_config(config);
    let selection = config.pages.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(options.library_path.as_deref())?;
        let document = load_document(&pdfium, &pdf_bytes, options.password.as_deref())?;
        let total_pages = document.pages().len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let indices = selection.to_indices(total_pages);
        if indices.is_empty() {
            return Err(PodcastError::PageOutOfRange {
                page: 0,
                total: total_pages,
            });
        }
        render_pages_blocking(&document, &options, &indices)
    })
    .await
    .map_err(|e| PodcastError::Internal(format!("Render task panicked: {e}")))?
}

/// Settings the blocking render thread needs, detached from the config.
struct RenderOptions {
    dpi: u32,
    max_pixels: u32,
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl RenderOptions {
    fn from_config(config: &PodcastConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            library_path: config.pdfium_library_path.clone(),
        }
    }
}

/// Bind to pdfium: an explicit library file or directory, else the system library.
fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, PodcastError> {
    let bindings = match library_path {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PodcastError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    password: Option<&str>,
) -> Result<PdfDocument<'a>, PodcastError> {
    pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                PodcastError::WrongPassword
            } else {
                PodcastError::PasswordRequired
            }
        } else {
            PodcastError::CorruptPdf { detail: err_str }
        }
    })
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    document: &PdfDocument<'_>,
    options: &RenderOptions,
    page_indices: &[usize],
) -> Result<Vec<PageImage>, PodcastError> {
    let pages = document.pages();
    let max_pixels = i32::try_from(options.max_pixels).unwrap_or(i32::MAX);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(options.dpi as f32 / POINTS_PER_INCH)
        .set_maximum_width(max_pixels)
        .set_maximum_height(max_pixels);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        let page_num = idx + 1;
        let page_index = u16::try_from(idx).map_err(|_| PodcastError::RasterisationFailed {
            page: page_num,
            detail: "page index exceeds pdfium's range".into(),
        })?;

        let page = pages
            .get(page_index)
            .map_err(|e| PodcastError::RasterisationFailed {
                page: page_num,
                detail: format!("{e:?}"),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            PodcastError::RasterisationFailed {
                page: page_num,
                detail: format!("{e:?}"),
            }
        })?;

        let raw = bitmap.as_image();
        let (raw_w, raw_h) = (raw.width(), raw.height());
        let image = normalize_image(raw);
        debug!(
            "Rendered page {} → {}x{} px, normalised to {}x{}",
            page_num,
            raw_w,
            raw_h,
            image.width(),
            image.height()
        );

        results.push(PageImage { page_num, image });
    }

    Ok(results)
}

/// Extract document metadata from a PDF without rendering pages.
pub async fn extract_metadata(
    pdf_bytes: Vec<u8>,
    config: &PodcastConfig,
) -> Result<DocumentMetadata, PodcastError> {
    let options = RenderOptions::from_config(config);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(options.library_path.as_deref())?;
        let document = load_document(&pdfium, &pdf_bytes, options.password.as_deref())?;
        Ok(read_metadata(&document))
    })
    .await
    .map_err(|e| PodcastError::Internal(format!("Metadata task panicked: {e}")))?
}

fn read_metadata(document: &PdfDocument<'_>) -> DocumentMetadata {
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}
