//! Host document the finished outline is written into

use crate::outline::{empty_rich_text, Outline};
use crate::runtime::DocumentSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to access document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Document {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Field path '{0}' is empty or crosses a non-object value")]
    InvalidPath(String),
}

/// A single write to one field of the host document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "UPDATE", rename_all = "camelCase")]
pub struct FieldUpdate {
    pub path: String,
    /// Value the field falls back to when reset
    pub initial_value: Value,
    pub value: Value,
}

impl FieldUpdate {
    /// Write `outline` as rich text into the field at `path`
    pub fn outline(path: impl Into<String>, outline: &Outline) -> Self {
        Self {
            path: path.into(),
            initial_value: empty_rich_text(),
            value: outline.to_rich_text(),
        }
    }
}

/// Document stored as a JSON object on disk
#[derive(Debug, Clone)]
pub struct JsonFileDocument {
    path: PathBuf,
}

impl JsonFileDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Value, DocumentError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Value::Object(Map::new())),
            Ok(text) => serde_json::from_str(&text).map_err(|source| DocumentError::Json {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
            Err(source) => Err(DocumentError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[async_trait]
impl DocumentSink for JsonFileDocument {
    async fn write_field(&self, update: &FieldUpdate) -> Result<(), DocumentError> {
        let mut document = self.load().await?;
        set_field(&mut document, &update.path, update.value.clone())?;

        let text = serde_json::to_string_pretty(&document).map_err(|source| DocumentError::Json {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|source| DocumentError::Io {
                path: self.path.clone(),
                source,
            })?;

        tracing::info!(path = %self.path.display(), field = %update.path, "Document field updated");
        Ok(())
    }
}

/// Set a dot-separated field, creating intermediate objects
fn set_field(document: &mut Value, path: &str, value: Value) -> Result<(), DocumentError> {
    let invalid = || DocumentError::InvalidPath(path.to_string());
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err(invalid());
    };
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid());
    }

    let mut current = document;
    for segment in parents {
        let object = current.as_object_mut().ok_or_else(invalid)?;
        current = object
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current
        .as_object_mut()
        .ok_or_else(invalid)?
        .insert((*last).to_string(), value);
    Ok(())
}
