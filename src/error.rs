//! Error types for the invoice2json library.
//!
//! Two tiers of failure:
//!
//! * [`InvoiceError`]: **fatal**: the batch cannot proceed at all
//!   (unreadable input directory, output file cannot be written, invalid
//!   configuration). Returned as `Err(InvoiceError)` from the top-level
//!   `extract_*` functions.
//!
//! * [`RenderError`], [`ClientError`], [`NormalizeError`]: **per-document**:
//!   one invoice failed to render, the model call failed, or the response
//!   could not be coerced into a record. These never escape the batch loop;
//!   they are converted into an [`crate::output::ErrorRecord`] and the batch
//!   moves on to the next document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the invoice2json library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// The input directory does not exist or cannot be listed.
    #[error("Cannot read input directory '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The accumulated batch could not be serialised.
    #[error("Failed to serialise batch results: {0}")]
    Serialise(#[from] serde_json::Error),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure to turn a PDF page into an encoded image.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Neither the exact path nor a case-insensitive match exists.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The file exists but cannot be opened.
    #[error("Cannot open '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// pdfium could not parse the document (corrupt, encrypted, truncated).
    #[error("PDF '{path}' could not be loaded: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The requested page does not exist.
    #[error("Page index {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium returned an error while rasterising the page.
    #[error("Rasterisation failed for page index {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// JPEG encoding of the rendered bitmap failed.
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// No pdfium shared library could be bound.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the binary."
    )]
    PdfiumUnavailable(String),

    /// The blocking render task panicked or was cancelled.
    #[error("Render task failed: {0}")]
    TaskPanicked(String),
}

/// Failure to obtain usable text from the vision model.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, timeout, or the body could not be read.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status code.
    #[error("HTTP {status} from model endpoint: {body}")]
    Status { status: u16, body: String },

    /// The response is JSON but carries no string `message.content`.
    #[error("Response has no message.content field")]
    UnexpectedShape { body: serde_json::Value },
}

/// The normalizer could not produce a record from the model's text.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Strict parse and repair both failed, and the structural fallback hit
    /// a fault it could not recover from.
    #[error("All normalization stages failed: {reason}")]
    Exhausted { reason: String },
}
