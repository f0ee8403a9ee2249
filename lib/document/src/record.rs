//! Records and the documents that hold them.

use crate::error::DocumentError;
use crate::parser::parse_blocks;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Header fields of a record, as typed scalars.
pub type Metadata = serde_json::Map<String, JsonValue>;

/// A parsed metadata + content block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Identifier taken from the `id` header field.
    pub id: String,
    /// All header fields, including `id`.
    pub metadata: Metadata,
    /// Trimmed block content.
    pub content: String,
}

impl Record {
    /// Creates a record, resolving its id from the metadata.
    ///
    /// Returns `None` when the metadata carries no usable `id`: such a
    /// record cannot be referenced, so it never enters a document.
    #[must_use]
    pub fn new(metadata: Metadata, content: impl Into<String>) -> Option<Self> {
        let id = record_id(&metadata)?;
        Some(Self {
            id,
            metadata,
            content: content.into(),
        })
    }

    /// Returns the `type` header field, if it is text.
    #[must_use]
    pub fn record_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(JsonValue::as_str)
    }

    /// Returns a header field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.metadata.get(key)
    }

    /// Returns true if this record has the given `type`.
    #[must_use]
    pub fn is_type(&self, record_type: &str) -> bool {
        self.record_type() == Some(record_type)
    }
}

fn record_id(metadata: &Metadata) -> Option<String> {
    match metadata.get("id")? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The records of one source file, addressable by id.
///
/// Iteration follows file order of each id's first appearance. Inserting a
/// record whose id is already present replaces the earlier record in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses document text.
    ///
    /// Blocks without an `id` are dropped; duplicate ids keep the last block.
    ///
    /// # Errors
    ///
    /// Returns an error if a header is malformed or never closed.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut document = Self::new();
        for block in parse_blocks(text)? {
            if let Some(record) = Record::new(block.metadata, block.content) {
                document.insert(record);
            }
        }
        Ok(document)
    }

    /// Inserts a record, returning the record it replaced, if any.
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        match self.index.get(&record.id) {
            Some(&position) => Some(std::mem::replace(&mut self.records[position], record)),
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    /// Gets a record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.index.get(id).map(|&position| &self.records[position])
    }

    /// Returns all records.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Returns records of the given `type`.
    pub fn records_of_type<'a>(
        &'a self,
        record_type: &'a str,
    ) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| r.is_type(record_type))
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the document has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
