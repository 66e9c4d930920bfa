//! Error type for parsing vendor payloads

/// Raised when fetched data does not have the shape a vendor expects
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to parse the document structure
    #[error("Failed to parse document: {0}")]
    ParseFailed(String),

    /// Tree-sitter related error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// An element the vendor relies on is absent from the page
    #[error("Missing element: {0}")]
    MissingElement(String),

    /// A column the vendor relies on is absent from the tabular dataset
    #[error("Missing column: {0}")]
    MissingColumn(String),
}
