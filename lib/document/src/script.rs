//! Typed views over thread and message records.
//!
//! A runnable document has one `thread` record supplying the system
//! context and any number of `message` records, replayed in `order`.

use crate::error::DocumentError;
use crate::record::{Document, Record};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Model used when a message does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Record type of the system-context record.
pub const THREAD_TYPE: &str = "thread";

/// Record type of conversation turns.
pub const MESSAGE_TYPE: &str = "message";

/// The thread record of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thread {
    /// Thread identifier.
    pub id: String,
    /// Target of the run's event log, if any.
    pub log_file: Option<String>,
    /// System-context text, before template resolution.
    pub content: String,
}

/// Sort key of a message.
///
/// Numbers sort before text; within each kind values compare naturally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderKey {
    /// Numeric order.
    Number(f64),
    /// Textual order.
    Text(String),
}

impl OrderKey {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

/// Messages without an order sort after all ordered ones.
fn compare_order(a: Option<&OrderKey>, b: Option<&OrderKey>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.compare(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A message record with its defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Message identifier.
    pub id: String,
    /// Correlation id echoed into logs and the default output path.
    pub thread_id: Option<String>,
    /// Sort key.
    pub order: Option<OrderKey>,
    /// Whether the message is skipped.
    pub disabled: bool,
    /// Model to run the turn against.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Name of the tool offered to the model for this turn.
    pub response_handler: Option<String>,
    /// Output path relative to the run's output directory.
    pub output_file: Option<String>,
    /// Turn text, before template resolution.
    pub content: String,
}

impl Message {
    /// Returns where the response of this message is saved.
    ///
    /// Defaults to `{thread_id}/{id}.md`, using `fallback_thread_id` when
    /// the message carries no thread id of its own.
    #[must_use]
    pub fn output_path(&self, fallback_thread_id: &str) -> String {
        match &self.output_file {
            Some(path) => path.clone(),
            None => {
                let thread_id = self.thread_id.as_deref().unwrap_or(fallback_thread_id);
                format!("{thread_id}/{}.md", self.id)
            }
        }
    }

    /// Returns true if this turn is answered through a tool.
    #[must_use]
    pub fn uses_tool(&self) -> bool {
        self.response_handler.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct MessageMetadata {
    #[serde(default, deserialize_with = "text_or_number")]
    thread_id: Option<String>,
    #[serde(default)]
    order: Option<OrderKey>,
    #[serde(default)]
    disabled: bool,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default)]
    temperature: f64,
    #[serde(default)]
    response_handler: Option<String>,
    #[serde(default)]
    output_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadMetadata {
    #[serde(default)]
    log_file: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(s) => s,
        Scalar::Number(n) => n.to_string(),
    }))
}

fn typed_metadata<T: for<'de> Deserialize<'de>>(record: &Record) -> Result<T, DocumentError> {
    serde_json::from_value(JsonValue::Object(record.metadata.clone())).map_err(|e| {
        DocumentError::InvalidMetadata {
            id: record.id.clone(),
            reason: e.to_string(),
        }
    })
}

impl Thread {
    /// Builds a thread view from a record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` if `log_file` is not text.
    pub fn from_record(record: &Record) -> Result<Self, DocumentError> {
        let metadata: ThreadMetadata = typed_metadata(record)?;
        Ok(Self {
            id: record.id.clone(),
            log_file: metadata.log_file,
            content: record.content.clone(),
        })
    }
}

impl Message {
    /// Builds a message view from a record, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` if a field has the wrong type.
    pub fn from_record(record: &Record) -> Result<Self, DocumentError> {
        let metadata: MessageMetadata = typed_metadata(record)?;
        Ok(Self {
            id: record.id.clone(),
            thread_id: metadata.thread_id,
            order: metadata.order,
            disabled: metadata.disabled,
            model: metadata.model,
            temperature: metadata.temperature,
            response_handler: metadata.response_handler,
            output_file: metadata.output_file,
            content: record.content.clone(),
        })
    }
}

impl Document {
    /// Returns the thread of this document.
    ///
    /// When several thread records exist the first in file order is used.
    ///
    /// # Errors
    ///
    /// Returns `MissingThread` if there is no thread record.
    pub fn thread(&self) -> Result<Thread, DocumentError> {
        let record = self
            .records_of_type(THREAD_TYPE)
            .next()
            .ok_or(DocumentError::MissingThread)?;
        Thread::from_record(record)
    }

    /// Returns the messages of this document in replay order.
    ///
    /// Messages sort ascending by `order`; unordered messages come last and
    /// ties keep file order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` if any message has mistyped fields.
    pub fn messages(&self) -> Result<Vec<Message>, DocumentError> {
        let mut messages = self
            .records_of_type(MESSAGE_TYPE)
            .map(Message::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        messages.sort_by(|a, b| compare_order(a.order.as_ref(), b.order.as_ref()));
        Ok(messages)
    }
}
