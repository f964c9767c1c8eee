use anyhow::Context;
use chrono::Utc;
use controller::DraftStore;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const UPDATED_AT_FIELD: &str = "updatedAt";

type Document = Map<String, Value>;

/// Draft records kept in one JSON document on disk:
/// `{ "<key>": { "<field>": <value>, ..., "updatedAt": "<rfc3339>" } }`.
///
/// Merges are last-write-wins per field. Writes go through a temp file and a
/// rename so a crash never leaves half a document.
pub struct JsonDraftStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> anyhow::Result<Document> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Document::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Corrupt draft file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    async fn store(&self, document: &Document) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(document)?).await?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))
    }

    /// Overlays `fields` on the record stored under `key`.
    pub async fn merge_fields(&self, key: &str, fields: Map<String, Value>) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;

        let record = document
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !record.is_object() {
            *record = Value::Object(Map::new());
        }
        if let Value::Object(record) = record {
            record.extend(fields);
            record.insert(
                UPDATED_AT_FIELD.to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        self.store(&document).await?;
        tracing::debug!(key, path = %self.path.display(), "Draft record merged");
        Ok(())
    }

    pub async fn read_record(&self, key: &str) -> anyhow::Result<Option<Map<String, Value>>> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        Ok(match document.remove(key) {
            Some(Value::Object(record)) => Some(record),
            _ => None,
        })
    }

    pub async fn flag(&self, key: &str, field: &str) -> anyhow::Result<bool> {
        Ok(self
            .read_record(key)
            .await?
            .and_then(|record| record.get(field).and_then(Value::as_bool))
            .unwrap_or(false))
    }

    pub async fn remove_record(&self, key: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        if document.remove(key).is_some() {
            self.store(&document).await?;
        }
        Ok(())
    }
}

impl DraftStore for JsonDraftStore {
    async fn merge_record(&self, key: &str, fields: &[(&str, bool)]) -> anyhow::Result<()> {
        let fields = fields
            .iter()
            .map(|(name, value)| (name.to_string(), Value::Bool(*value)))
            .collect();
        self.merge_fields(key, fields).await
    }
}
