//! PDF rasterisation: render one page to JPEG bytes via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! [`render_first_page`] moves the work onto tokio's blocking pool and awaits
//! it straight away, so the batch stays strictly one document at a time.
//!
//! ## Why 2× scale?
//!
//! Invoices are dense with small print (tax IDs, registration numbers). A
//! 2× linear upscale of the page's natural size gives the vision model enough
//! pixels per glyph to read them, at the cost of a larger image.

use super::{encode, input};
use crate::error::RenderError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Only the first page of an invoice is sent to the model.
pub const FIRST_PAGE: usize = 0;

/// Linear upscaling factor applied to the page's natural size.
pub const RENDER_SCALE: f32 = 2.0;

/// Turns one page of a document into encoded image bytes.
///
/// Implementations are blocking; [`render_first_page`] calls them from
/// `spawn_blocking`.
pub trait PageRenderer: Send + Sync {
    fn render(&self, path: &Path, page_index: usize) -> Result<Vec<u8>, RenderError>;
}

/// Render [`FIRST_PAGE`] of `path` on the blocking pool.
pub async fn render_first_page(
    renderer: &Arc<dyn PageRenderer>,
    path: &Path,
) -> Result<Vec<u8>, RenderError> {
    let renderer = Arc::clone(renderer);
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || renderer.render(&path, FIRST_PAGE))
        .await
        .map_err(|e| RenderError::TaskPanicked(e.to_string()))?
}

/// Production renderer backed by pdfium.
///
/// Binding order: the configured library path, a library next to the working
/// directory, then the system library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    fn bind(&self) -> Result<Pdfium, RenderError> {
        let bindings = match &self.library_path {
            Some(p) => Pdfium::bind_to_library(lib_path_for(p)),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| RenderError::PdfiumUnavailable(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

/// Accept either the library file itself or the directory containing it.
fn lib_path_for(path: &Path) -> PathBuf {
    if path.is_dir() {
        let dir = path.to_string_lossy().to_string();
        PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&dir))
    } else {
        path.to_path_buf()
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render(&self, path: &Path, page_index: usize) -> Result<Vec<u8>, RenderError> {
        let path = input::resolve_document(path)?;
        let pdfium = self.bind()?;

        let document =
            pdfium
                .load_pdf_from_file(&path, None)
                .map_err(|e| RenderError::CorruptPdf {
                    path: path.clone(),
                    detail: format!("{:?}", e),
                })?;

        let pages = document.pages();
        let total = pages.len() as usize;
        if page_index >= total {
            return Err(RenderError::PageOutOfRange {
                page: page_index,
                total,
            });
        }

        let page = pages
            .get(page_index as u16)
            .map_err(|e| RenderError::RasterisationFailed {
                page: page_index,
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(RENDER_SCALE);
        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| RenderError::RasterisationFailed {
                    page: page_index,
                    detail: format!("{:?}", e),
                })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered {} page {} → {}x{} px",
            path.display(),
            page_index,
            image.width(),
            image.height()
        );

        Ok(encode::encode_jpeg(&image)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingRenderer {
        pages: Mutex<Vec<usize>>,
    }

    impl PageRenderer for RecordingRenderer {
        fn render(&self, _path: &Path, page_index: usize) -> Result<Vec<u8>, RenderError> {
            self.pages.lock().unwrap().push(page_index);
            Ok(vec![0xFF, 0xD8])
        }
    }

    #[tokio::test]
    async fn first_page_is_always_requested() {
        let rec = Arc::new(RecordingRenderer {
            pages: Mutex::new(Vec::new()),
        });
        let renderer: Arc<dyn PageRenderer> = rec.clone();
        for _ in 0..3 {
            render_first_page(&renderer, Path::new("ten-pages.pdf"))
                .await
                .unwrap();
        }
        assert_eq!(*rec.pages.lock().unwrap(), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn missing_file_fails_before_binding_pdfium() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer: Arc<dyn PageRenderer> = Arc::new(PdfiumRenderer::default());
        let err = render_first_page(&renderer, &tmp.path().join("gone.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::FileNotFound { .. }));
    }

    #[test]
    fn lib_path_accepts_file() {
        let p = Path::new("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(lib_path_for(p), p.to_path_buf());
    }
}
