//! Configuration for a batch extraction run.
//!
//! Every knob lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The defaults reproduce the plain invocation:
//! read `./invoices`, write `./extracted_invoices.json`, ask a local Ollama
//! `llama3.2-vision`.

use crate::error::InvoiceError;
use crate::pipeline::llm::VisionModel;
use crate::pipeline::render::PageRenderer;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default input directory.
pub const DEFAULT_INPUT_DIR: &str = "invoices";
/// Default output file, overwritten after every document.
pub const DEFAULT_OUTPUT_PATH: &str = "extracted_invoices.json";
/// Default local Ollama chat endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/chat";
/// Default vision model.
pub const DEFAULT_MODEL: &str = "llama3.2-vision";
/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Configuration for invoice extraction.
///
/// # Example
/// ```rust
/// use invoice2json::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .input_dir("scans/2024-01")
///     .output_path("out/january.json")
///     .model("llava:13b")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Directory scanned (non-recursively) for `*.pdf`. Default: `invoices`.
    pub input_dir: PathBuf,

    /// JSON array of results, rewritten after every document.
    /// Default: `extracted_invoices.json`.
    pub output_path: PathBuf,

    /// Chat endpoint URL. Default: `http://localhost:11434/api/chat`.
    pub endpoint: String,

    /// Model name sent in the request. Default: `llama3.2-vision`.
    pub model: String,

    /// Per-request timeout for the model call. `None` waits indefinitely.
    /// Default: 300 s.
    ///
    /// Local vision models on CPU can take minutes for one page, so the
    /// default is generous; it exists so a hung server does not stall the
    /// batch forever.
    pub request_timeout_secs: Option<u64>,

    /// Path to libpdfium (file or containing directory). If None, looks in
    /// the working directory and then the system library path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Pre-constructed model client. Takes precedence over `endpoint`/`model`.
    pub vision_model: Option<Arc<dyn VisionModel>>,

    /// Pre-constructed page renderer. Takes precedence over `pdfium_lib_path`.
    pub renderer: Option<Arc<dyn PageRenderer>>,

    /// Optional per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            pdfium_lib_path: None,
            vision_model: None,
            renderer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("input_dir", &self.input_dir)
            .field("output_path", &self.output_path)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "vision_model",
                &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"),
            )
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn PageRenderer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// `None` disables the timeout.
    pub fn request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision_model = Some(model);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.vision_model.is_none()
            && !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://"))
        {
            return Err(InvoiceError::InvalidConfig(format!(
                "Endpoint must be an http:// or https:// URL, got '{}'",
                c.endpoint
            )));
        }
        if c.vision_model.is_none() && c.model.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig("Model name must not be empty".into()));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(InvoiceError::InvalidConfig(
                "Request timeout must be ≥ 1 second (use None to disable)".into(),
            ));
        }
        if c.output_path.as_os_str().is_empty() {
            return Err(InvoiceError::InvalidConfig("Output path must not be empty".into()));
        }
        Ok(self.config)
    }
}
