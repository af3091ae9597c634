//! MongoDB collection backend using the official async driver.
//!
//! # Feature flag
//!
//! Gated behind `mongodb_backend`:
//! ```toml
//! [dependencies]
//! campus-rs = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! One MongoDB collection per resource. Records are converted through
//! `serde_json::Value` so the HTTP layer sees the same shapes as with the
//! in-memory backend. Identifiers are generated client-side as strings.
//!
//! Query parameters arrive as text; when building a filter document,
//! numeric-looking values are sent as numbers so `price[gte]=5` compares
//! numerically against stored numbers.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use serde_json::Value;
use uuid::Uuid;

use crate::core::filter::Filter;
use crate::core::store::{
    CREATED_AT_FIELD, Collection, CollectionQuery, ID_FIELD, Projection, Record, SortKey,
    StoreError, UPDATED_AT_FIELD, VERSION_FIELD,
};
use crate::core::sort::SortOrder;

const DUPLICATE_KEY_CODE: i32 = 11000;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn record_to_document(record: &Record) -> Result<Document> {
    mongodb::bson::to_document(record)
        .map_err(|e| anyhow!("Failed to convert record to BSON: {}", e))
}

fn document_to_record(doc: Document) -> Result<Record> {
    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(record) => Ok(record),
        other => Err(anyhow!("Expected BSON document, got {}", other)),
    }
}

/// Numeric-looking query text becomes a number
fn scalar(value: &str) -> Value {
    if let Ok(n) = value.parse::<i64>() {
        return Value::from(n);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

fn filter_to_document(filter: &Filter) -> Result<Document> {
    mongodb::bson::to_document(&filter.to_document_with(scalar))
        .map_err(|e| anyhow!("Failed to convert filter to BSON: {}", e))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE
    )
}

// ---------------------------------------------------------------------------
// MongoCollection
// ---------------------------------------------------------------------------

/// Collection backed by MongoDB
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use campus::storage::MongoCollection;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let courses = MongoCollection::new(client.database("campus").collection("courses"))
///     .with_key_field("code");
/// ```
#[derive(Clone, Debug)]
pub struct MongoCollection {
    collection: mongodb::Collection<Document>,
    key_field: String,
}

impl MongoCollection {
    pub fn new(collection: mongodb::Collection<Document>) -> Self {
        Self {
            collection,
            key_field: ID_FIELD.to_string(),
        }
    }

    /// Look records up by another unique field
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    fn key_filter(&self, id: &str) -> Document {
        let mut filter = Document::new();
        filter.insert(self.key_field.clone(), id);
        filter
    }

    fn duplicate(&self, record: &Record) -> StoreError {
        StoreError::Duplicate {
            field: self.key_field.clone(),
            value: record
                .get(&self.key_field)
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Collection for MongoCollection {
    type Query = MongoQuery;

    fn find(&self, filter: Filter) -> MongoQuery {
        MongoQuery {
            collection: self.collection.clone(),
            filter,
            sort: Vec::new(),
            projection: None,
            skip: 0,
            limit: 0,
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Record>> {
        self.collection
            .find_one(self.key_filter(id))
            .await
            .map_err(|e| anyhow!("Failed to fetch record: {}", e))?
            .map(document_to_record)
            .transpose()
    }

    async fn insert(&self, mut record: Record) -> Result<Record> {
        let now = timestamp();
        record.insert(
            ID_FIELD.to_string(),
            Value::String(Uuid::new_v4().simple().to_string()),
        );
        record.insert(CREATED_AT_FIELD.to_string(), Value::String(now.clone()));
        record.insert(UPDATED_AT_FIELD.to_string(), Value::String(now));
        record.insert(VERSION_FIELD.to_string(), Value::from(0));

        if !record.contains_key(&self.key_field) {
            return Err(StoreError::MissingKey {
                field: self.key_field.clone(),
            }
            .into());
        }

        let document = record_to_document(&record)?;
        match self.collection.insert_one(document).await {
            Ok(_) => Ok(record),
            Err(e) if is_duplicate_key(&e) => Err(self.duplicate(&record).into()),
            Err(e) => Err(anyhow!("Failed to insert record: {}", e)),
        }
    }

    async fn update(&self, id: &str, mut patch: Record) -> Result<Option<Record>> {
        for managed in [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD, VERSION_FIELD] {
            patch.remove(managed);
        }
        patch.insert(UPDATED_AT_FIELD.to_string(), Value::String(timestamp()));

        let set = record_to_document(&patch)?;
        let result = self
            .collection
            .find_one_and_update(self.key_filter(id), doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await;

        match result {
            Ok(updated) => updated.map(document_to_record).transpose(),
            Err(e) if is_duplicate_key(&e) => Err(self.duplicate(&patch).into()),
            Err(e) => Err(anyhow!("Failed to update record: {}", e)),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(self.key_filter(id))
            .await
            .map_err(|e| anyhow!("Failed to delete record: {}", e))?;
        Ok(result.deleted_count > 0)
    }
}

// ---------------------------------------------------------------------------
// MongoQuery
// ---------------------------------------------------------------------------

/// Pending MongoDB `find`
///
/// Window values follow driver semantics: a negative skip is clamped to
/// zero, a zero limit means "no limit".
#[derive(Clone, Debug)]
pub struct MongoQuery {
    collection: mongodb::Collection<Document>,
    filter: Filter,
    sort: Vec<SortKey>,
    projection: Option<Projection>,
    skip: i64,
    limit: i64,
}

impl MongoQuery {
    fn sort_document(&self) -> Document {
        let mut sort = Document::new();
        for key in &self.sort {
            let direction = match key.order {
                SortOrder::Asc => 1,
                SortOrder::Desc => -1,
            };
            sort.insert(key.field.clone(), direction);
        }
        sort
    }

    fn projection_document(&self) -> Option<Document> {
        let (fields, flag) = match self.projection.as_ref()? {
            Projection::Include(fields) => (fields, 1),
            Projection::Exclude(fields) => (fields, 0),
        };
        let mut projection = Document::new();
        for field in fields {
            projection.insert(field.clone(), flag);
        }
        Some(projection)
    }
}

#[async_trait]
impl CollectionQuery for MongoQuery {
    fn find(mut self, filter: Filter) -> Self {
        self.filter.merge(filter);
        self
    }

    fn skip(mut self, n: i64) -> Self {
        self.skip = n;
        self
    }

    fn limit(mut self, n: i64) -> Self {
        self.limit = n;
        self
    }

    fn sort(mut self, keys: Vec<SortKey>) -> Self {
        for key in keys {
            match self.sort.iter_mut().find(|k| k.field == key.field) {
                Some(existing) => existing.order = key.order,
                None => self.sort.push(key),
            }
        }
        self
    }

    fn select(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    async fn execute(self) -> Result<Vec<Record>> {
        let filter = filter_to_document(&self.filter)?;
        tracing::debug!(filter = %filter, "mongodb find");

        let mut find = self
            .collection
            .find(filter)
            .skip(self.skip.max(0) as u64)
            .limit(self.limit);
        if !self.sort.is_empty() {
            find = find.sort(self.sort_document());
        }
        if let Some(projection) = self.projection_document() {
            find = find.projection(projection);
        }

        let cursor = find
            .await
            .map_err(|e| anyhow!("Failed to query collection: {}", e))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| anyhow!("Failed to read query results: {}", e))?;

        documents.into_iter().map(document_to_record).collect()
    }
}
