//! Tab-separated catalog reader
//!
//! Bulk vendor datasets are published as a header line followed by one
//! device per line. Rows are yielded lazily so a lookup can stop at the
//! first match without materialising the whole file.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;

use crate::parser::error::ParseError;

/// Reads rows from a tab-separated dataset with a header line
pub struct CatalogReader<R> {
    reader: R,
    columns: Arc<HashMap<String, usize>>,
    buffer: Vec<u8>,
}

/// A single data row, addressable by column name
#[derive(Debug, Clone)]
pub struct CatalogRow {
    columns: Arc<HashMap<String, usize>>,
    values: Vec<String>,
}

impl CatalogRow {
    /// Value of the named column; missing trailing cells read as ""
    pub fn get(&self, column: &str) -> Option<&str> {
        let index = *self.columns.get(column)?;
        Some(self.values.get(index).map(String::as_str).unwrap_or(""))
    }
}

fn split_line(buffer: &[u8]) -> Vec<String> {
    // Invalid UTF-8 is replaced rather than rejected
    let line = String::from_utf8_lossy(buffer);
    line.trim_end_matches(['\n', '\r'])
        .split('\t')
        .map(str::to_string)
        .collect()
}

impl<R: BufRead> CatalogReader<R> {
    /// Reads the header line and checks that `required` columns exist
    pub fn new(mut reader: R, required: &[&str]) -> Result<Self, ParseError> {
        let mut buffer = Vec::new();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .map_err(|e| ParseError::ParseFailed(e.to_string()))?;
        if read == 0 {
            return Err(ParseError::ParseFailed("dataset is empty".to_string()));
        }

        let columns: HashMap<String, usize> = split_line(&buffer)
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();

        if let Some(missing) = required.iter().find(|c| !columns.contains_key(**c)) {
            return Err(ParseError::MissingColumn(missing.to_string()));
        }

        buffer.clear();
        Ok(Self {
            reader,
            columns: Arc::new(columns),
            buffer,
        })
    }
}

impl<R: BufRead> Iterator for CatalogReader<R> {
    type Item = Result<CatalogRow, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(ParseError::ParseFailed(e.to_string()))),
            }

            if self.buffer.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Some(Ok(CatalogRow {
                columns: Arc::clone(&self.columns),
                values: split_line(&self.buffer),
            }));
        }
    }
}
