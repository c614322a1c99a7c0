use thiserror::Error;

/// Request-level failure taxonomy.
///
/// Asset and compaction problems are normally recovered where they happen;
/// only the variants below ever reach a caller.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid request: {0}")]
    Input(String),

    #[error("No usable assets: {0}")]
    Asset(String),

    #[error("Rendering failed: {0}")]
    Backend(#[from] RenderError),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl ReportError {
    /// HTTP-style status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ReportError::Input(_) | ReportError::Asset(_) => 400,
            ReportError::Backend(_) | ReportError::Unavailable(_) => 500,
        }
    }

    /// Message safe to return to a caller. Internal detail of 500s stays in the log.
    pub fn public_message(&self) -> String {
        match self {
            ReportError::Input(msg) => msg.clone(),
            ReportError::Asset(msg) => msg.clone(),
            ReportError::Backend(_) => "Failed to generate PDF".to_string(),
            ReportError::Unavailable(_) => "PDF backend unavailable".to_string(),
        }
    }
}

impl From<PoolError> for ReportError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Unavailable(msg) => ReportError::Unavailable(msg),
            other => ReportError::Backend(RenderError::Browser(other.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to embed image: {0}")]
    ImageEmbed(String),

    #[error("PDF generation error: {0}")]
    PdfGeneration(String),

    #[error("Browser print failed: {0}")]
    Browser(String),

    #[error("Render task aborted: {0}")]
    TaskAborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single image or row that could not be used
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Invalid image data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Image encode failed: {0}")]
    Encode(String),

    #[error("Row {index} is not an object")]
    InvalidRow { index: usize },
}

#[derive(Error, Debug)]
pub enum CompactionError {
    #[error("Compaction tool could not be started: {0}")]
    ToolUnavailable(String),

    #[error("Compaction tool exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("Compaction produced no output")]
    EmptyOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("{0}")]
    Unavailable(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to open page: {0}")]
    Page(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid color specification: {0}")]
    InvalidColor(String),

    #[error("Invalid column specification: {0}")]
    InvalidColumn(String),
}
