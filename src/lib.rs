//! # invoice2json
//!
//! Extract structured invoice data from PDF files using a local vision model.
//!
//! ## Why a vision model?
//!
//! Invoices arrive as scans, exports from a dozen accounting packages and
//! photographed paper. Text extraction breaks on half of them. Instead this
//! crate rasterises the first page and asks a vision-capable model (Ollama
//! `llama3.2-vision` by default) to read it. Models rarely return clean JSON,
//! so most of the work happens afterwards, in the normalizer: strict parse,
//! textual repair, then a labelled-line fallback, all funnelled into one
//! fixed fifteen-field record.
//!
//! ## Pipeline Overview
//!
//! ```text
//! invoices/*.pdf
//!  │
//!  ├─ 1. Input      sorted *.pdf listing; case-insensitive path resolution
//!  ├─ 2. Render     page 0 at 2× via pdfium (spawn_blocking)
//!  ├─ 3. Encode     JPEG q85 → base64
//!  ├─ 4. Model      one POST /api/chat, stream: false
//!  ├─ 5. Normalize  strict → repaired → fallback → schema
//!  └─ 6. Persist    whole array rewritten after every document
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice2json::{extract_batch, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // ./invoices → ./extracted_invoices.json via http://localhost:11434
//!     let config = ExtractionConfig::default();
//!     let entries = extract_batch(&config).await?;
//!     let failed = entries.iter().filter(|e| e.is_error()).count();
//!     eprintln!("{} invoices, {} failed", entries.len(), failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2json` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! invoice2json = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{extract_batch, extract_batch_sync, extract_file, persist_results};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ClientError, InvoiceError, NormalizeError, RenderError};
pub use output::{BatchEntry, DocumentEnvelope, ErrorRecord, InvoiceRecord, LineItem, Party};
pub use pipeline::llm::{OllamaClient, VisionModel};
pub use pipeline::normalize::normalize;
pub use pipeline::render::{PageRenderer, PdfiumRenderer};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
