//! Parser layer for vendor payloads
//! - error.rs: ParseError shared by all vendor parsers
//! - html.rs: tree-sitter backed HTML queries for support pages
//! - catalog.rs: tab-separated device catalog reader

pub mod catalog;
pub mod error;
pub mod html;

pub use catalog::{CatalogReader, CatalogRow};
pub use error::ParseError;
pub use html::{Element, HtmlDocument};
