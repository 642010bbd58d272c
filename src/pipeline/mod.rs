//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one step, so each can be tested
//! without the others and swapped behind a trait where it touches the
//! outside world (pdfium, the model server).
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ normalize
//! (path)    (pdfium)   (JPEG)     (VLM)   (repair / fallback / schema)
//! ```
//!
//! 1. [`input`]     discover PDFs; resolve mis-cased file names
//! 2. [`render`]    rasterise page 0 at 2×; runs in `spawn_blocking`
//! 3. [`encode`]    JPEG q85 and base64 for the request body
//! 4. [`llm`]       one non-streaming chat call; the only network I/O
//! 5. [`normalize`] strict parse, then [`repair`], then [`fallback`];
//!    every result is shaped by [`schema`]

pub mod encode;
pub mod fallback;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod render;
pub mod repair;
pub mod schema;
