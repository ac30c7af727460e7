//! Document/OCR collaborator boundary.
//!
//! Parsing PDFs, spreadsheets, and images is an external concern. The
//! pipeline only consumes extracted text and an optional summary, so the
//! boundary is a narrow trait object.

use anyhow::Result;
use async_trait::async_trait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentText {
    pub succeeded: bool,
    pub extracted_text: String,
    pub summary: Option<String>,
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Extracts text from the file at `path`. `type_hint` is a format hint
    /// such as `"pdf"`; implementations may ignore it.
    async fn extract(&self, path: &str, type_hint: Option<&str>) -> Result<DocumentText>;
}
