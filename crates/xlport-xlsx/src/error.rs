use thiserror::Error;
use xlport_core::ModelError;

/// Errors that abort an export or import.
///
/// Per-cell problems (unparseable formulas, unsupported images, unknown theme
/// slots) never surface here; they degrade and end up in the warning list.
#[derive(Debug, Error)]
pub enum XlsxError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("template is missing required part {0}")]
    MissingTemplatePart(&'static str),

    #[error("package is missing required part {0}")]
    MissingPart(String),

    #[error("malformed part {part}: {reason}")]
    MalformedPart { part: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xml write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    #[error("xml parse error: {0}")]
    XmlParse(#[from] roxmltree::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, XlsxError>;

impl XlsxError {
    pub(crate) fn malformed(part: &str, reason: impl Into<String>) -> Self {
        XlsxError::MalformedPart {
            part: part.to_string(),
            reason: reason.into(),
        }
    }
}
