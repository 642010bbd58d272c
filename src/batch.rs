//! Batch orchestration: every PDF in a directory → one JSON array on disk.
//!
//! ## Why persist after every document?
//!
//! A batch against a local vision model can run for hours. Rewriting the
//! whole result file after each document means an interrupted run keeps
//! everything finished so far, and a reader polling the file sees progress.
//! Each write goes to a sibling temp file that is then renamed over the
//! target, so the file is never observed half-written.

use crate::config::ExtractionConfig;
use crate::error::{ClientError, InvoiceError};
use crate::output::{BatchEntry, DocumentEnvelope, ErrorRecord, PDF_MIME_TYPE, STATUS_DONE};
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::llm::{OllamaClient, VisionModel};
use crate::pipeline::render::{self, PageRenderer, PdfiumRenderer};
use crate::pipeline::{input, normalize};
use chrono::{SecondsFormat, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Process every PDF in `config.input_dir` and persist the results to
/// `config.output_path`.
///
/// Documents are handled one at a time, in file-name order. A document that
/// fails at any stage becomes an [`ErrorRecord`] entry; it never aborts the
/// batch.
///
/// # Errors
/// Returns `Err(InvoiceError)` only for fatal errors:
/// - the input directory cannot be listed
/// - the output file cannot be written
/// - the HTTP client cannot be constructed
pub async fn extract_batch(config: &ExtractionConfig) -> Result<Vec<BatchEntry>, InvoiceError> {
    let batch_start = Instant::now();
    let documents = input::discover_documents(&config.input_dir)?;
    let total = documents.len();
    info!(
        "Found {} invoices in {}",
        total,
        config.input_dir.display()
    );

    let model = resolve_model(config)?;
    let renderer = resolve_renderer(config);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut entries: Vec<BatchEntry> = Vec::with_capacity(total);
    for (idx, path) in documents.iter().enumerate() {
        let index = idx + 1;
        let file_name = display_name(path);
        info!("Processing {} ({}/{})", file_name, index, total);
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(index, total, &file_name);
        }

        let entry = process_document(path, &renderer, &model).await;
        entries.push(entry);
        persist_results(&config.output_path, &entries).await?;

        if let Some(ref cb) = config.progress_callback {
            match entries.last().and_then(BatchEntry::error) {
                Some(err) => cb.on_document_error(index, total, &file_name, &err.error),
                None => cb.on_document_complete(index, total, &file_name),
            }
        }
    }

    persist_results(&config.output_path, &entries).await?;

    let success_count = entries.iter().filter(|e| !e.is_error()).count();
    info!(
        "Processing complete: {}/{} invoices extracted in {:?}, results saved to {}",
        success_count,
        total,
        batch_start.elapsed(),
        config.output_path.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, success_count);
    }

    Ok(entries)
}

/// Run the per-document pipeline on a single file, without writing anything.
///
/// `path` may differ in case from the file on disk. Per-document failures
/// come back as `Ok(BatchEntry::Error(..))`, exactly as they would appear in
/// a batch.
pub async fn extract_file(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<BatchEntry, InvoiceError> {
    let model = resolve_model(config)?;
    let renderer = resolve_renderer(config);
    Ok(process_document(path.as_ref(), &renderer, &model).await)
}

/// Synchronous wrapper around [`extract_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_batch_sync(config: &ExtractionConfig) -> Result<Vec<BatchEntry>, InvoiceError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_batch(config))
}

/// Overwrite `path` with the pretty-printed `entries`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn persist_results(path: &Path, entries: &[BatchEntry]) -> Result<(), InvoiceError> {
    let json = serde_json::to_string_pretty(entries)?;
    let write_failed = |source| InvoiceError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(write_failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }

    debug!("Saved {} entries to {}", entries.len(), path.display());
    Ok(())
}

// ── Per-document pipeline ────────────────────────────────────────────────

async fn process_document(
    path: &Path,
    renderer: &Arc<dyn PageRenderer>,
    model: &Arc<dyn VisionModel>,
) -> BatchEntry {
    let file_name = display_name(path);
    let render_failed = || ErrorRecord::new(format!("Failed to convert PDF to image: {}", file_name));

    // ── Render ───────────────────────────────────────────────────────────
    let resolved = match input::resolve_document(path) {
        Ok(p) => p,
        Err(e) => {
            warn!("{}: {}", file_name, e);
            return render_failed().into();
        }
    };
    let jpeg = match render::render_first_page(renderer, &resolved).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("{}: {}", file_name, e);
            return render_failed().into();
        }
    };
    let image = EncodedImage::from_jpeg(&jpeg);
    debug!("{}: {} bytes of JPEG", file_name, jpeg.len());

    // ── Query ────────────────────────────────────────────────────────────
    let raw = match model.query(&image).await {
        Ok(text) => text,
        Err(ClientError::UnexpectedShape { body }) => {
            warn!("{}: response has no message content", file_name);
            return ErrorRecord::new("Unexpected response format")
                .with_raw_response(body)
                .into();
        }
        Err(e) => {
            warn!("{}: request failed: {}", file_name, e);
            return ErrorRecord::new(format!("Request failed: {}", e)).into();
        }
    };

    // ── Normalize ────────────────────────────────────────────────────────
    let record = match normalize::normalize_with_stage(&raw) {
        Ok((record, stage)) => {
            debug!("{}: record produced by {:?} stage", file_name, stage);
            record
        }
        Err(e) => {
            warn!("{}: {}", file_name, e);
            return ErrorRecord::new("Failed to parse or fix JSON response")
                .with_raw_response(raw)
                .into();
        }
    };

    let file_size = match tokio::fs::metadata(&resolved).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            // Reported with the render wording; the render itself succeeded.
            warn!(
                "{}: rendered and extracted, but reading file size failed: {}",
                file_name, e
            );
            return render_failed().into();
        }
    };

    info!("Extracted {}", file_name);
    DocumentEnvelope {
        record,
        status: STATUS_DONE.to_string(),
        file_name: display_name(&resolved),
        file_path: resolved.to_string_lossy().into_owned(),
        file_size: file_size.to_string(),
        mime_type: PDF_MIME_TYPE.to_string(),
        document_id: None,
        upload_date: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
    }
    .into()
}

// ── Collaborator resolution ──────────────────────────────────────────────

/// A configured model takes priority; otherwise build an Ollama client from
/// `endpoint`, `model` and the timeout.
fn resolve_model(config: &ExtractionConfig) -> Result<Arc<dyn VisionModel>, InvoiceError> {
    if let Some(ref model) = config.vision_model {
        return Ok(Arc::clone(model));
    }

    let client = OllamaClient::new(
        config.endpoint.clone(),
        config.model.clone(),
        config.request_timeout(),
    )
    .map_err(|e| InvoiceError::Internal(format!("Failed to build HTTP client: {}", e)))?;
    debug!("Using model '{}' at {}", client.model(), client.endpoint());
    Ok(Arc::new(client))
}

fn resolve_renderer(config: &ExtractionConfig) -> Arc<dyn PageRenderer> {
    match config.renderer {
        Some(ref renderer) => Arc::clone(renderer),
        None => Arc::new(PdfiumRenderer::new(config.pdfium_lib_path.clone())),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::output::InvoiceRecord;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StaticRenderer;

    impl PageRenderer for StaticRenderer {
        fn render(&self, _path: &Path, _page_index: usize) -> Result<Vec<u8>, RenderError> {
            Ok(vec![0xFF, 0xD8, 0xFF])
        }
    }

    struct StaticModel(Result<String, u16>);

    #[async_trait]
    impl VisionModel for StaticModel {
        async fn query(&self, _image: &EncodedImage) -> Result<String, ClientError> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(ClientError::Status {
                    status: *status,
                    body: "busy".into(),
                }),
            }
        }
    }

    fn write_pdf(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"%PDF-1.4\n%%EOF\n").unwrap();
        path
    }

    async fn run_one(path: &Path, model: StaticModel) -> BatchEntry {
        let renderer: Arc<dyn PageRenderer> = Arc::new(StaticRenderer);
        let model: Arc<dyn VisionModel> = Arc::new(model);
        process_document(path, &renderer, &model).await
    }

    #[tokio::test]
    async fn success_builds_envelope() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_pdf(tmp.path(), "a.pdf");
        let entry = run_one(&path, StaticModel(Ok(r#"{"invoice_id": "7"}"#.into()))).await;

        let doc = entry.document().expect("document entry");
        assert_eq!(doc.record.invoice_id.as_deref(), Some("7"));
        assert_eq!(doc.file_name, "a.pdf");
        assert_eq!(doc.file_size, "15");
        assert_eq!(doc.status, "Done");
        assert_eq!(doc.mime_type, "application/pdf");
        assert!(doc.document_id.is_none());
        assert!(doc.upload_date.ends_with("+00:00"), "got {}", doc.upload_date);
    }

    #[tokio::test]
    async fn status_error_becomes_request_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_pdf(tmp.path(), "a.pdf");
        let entry = run_one(&path, StaticModel(Err(503))).await;

        let err = entry.error().expect("error entry");
        assert!(err.error.starts_with("Request failed: "), "got {}", err.error);
        assert!(err.raw_response.is_none());
    }

    #[tokio::test]
    async fn missing_file_is_a_render_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = run_one(&tmp.path().join("gone.pdf"), StaticModel(Ok("{}".into()))).await;
        assert_eq!(
            entry.error().unwrap().error,
            "Failed to convert PDF to image: gone.pdf"
        );
    }

    #[tokio::test]
    async fn prose_answer_still_yields_a_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_pdf(tmp.path(), "a.pdf");
        let entry = run_one(&path, StaticModel(Ok("I cannot read this.".into()))).await;
        assert_eq!(entry.document().unwrap().record, InvoiceRecord::default());
    }

    #[tokio::test]
    async fn persist_writes_pretty_json_without_leftovers() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested/out.json");
        let entries = vec![BatchEntry::from(ErrorRecord::new("boom"))];

        persist_results(&out, &entries).await.unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text, "[\n  {\n    \"error\": \"boom\"\n  }\n]");
        assert!(!out.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("taken");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("keep"), "x").unwrap();

        let err = persist_results(&out, &[]).await.unwrap_err();

        assert!(matches!(err, InvoiceError::OutputWriteFailed { .. }));
        assert!(!out.with_extension("json.tmp").exists());
    }

    /// Deletes the document while "rendering" it.
    struct VanishingRenderer;

    impl PageRenderer for VanishingRenderer {
        fn render(&self, path: &Path, _page_index: usize) -> Result<Vec<u8>, RenderError> {
            std::fs::remove_file(path).unwrap();
            Ok(vec![0xFF, 0xD8, 0xFF])
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn stat_failure_is_logged_as_such() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let tmp = tempfile::tempdir().unwrap();
        let path = write_pdf(tmp.path(), "a.pdf");
        let renderer: Arc<dyn PageRenderer> = Arc::new(VanishingRenderer);
        let model: Arc<dyn VisionModel> = Arc::new(StaticModel(Ok("{}".into())));

        let entry = process_document(&path, &renderer, &model).await;

        assert_eq!(
            entry.error().unwrap().error,
            "Failed to convert PDF to image: a.pdf"
        );
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("reading file size failed"), "logs: {text}");
    }

    #[test]
    fn configured_model_takes_priority() {
        let model: Arc<dyn VisionModel> = Arc::new(StaticModel(Ok(String::new())));
        let config = ExtractionConfig {
            vision_model: Some(Arc::clone(&model)),
            ..Default::default()
        };
        let resolved = resolve_model(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &model));
    }
}
