//! In-memory collection for testing and development

use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::core::filter::Filter;
use crate::core::sort::{SortOrder, compare_values};
use crate::core::store::{
    CREATED_AT_FIELD, Collection, CollectionQuery, ID_FIELD, Projection, Record, SortKey,
    StoreError, UPDATED_AT_FIELD, VERSION_FIELD,
};

fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// In-memory collection
///
/// Records live behind an `RwLock` shared by every clone, so a collection
/// handed to the server and one kept by a test observe the same data.
#[derive(Clone)]
pub struct InMemoryCollection {
    records: Arc<RwLock<Vec<Record>>>,
    key_field: String,
}

impl InMemoryCollection {
    /// Create an empty collection keyed by `_id`
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            key_field: ID_FIELD.to_string(),
        }
    }

    /// Look records up by another unique field (e.g. a course code)
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_of(&self, record: &Record) -> Option<String> {
        record.get(&self.key_field).and_then(key_text)
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collection for InMemoryCollection {
    type Query = InMemoryQuery;

    fn find(&self, filter: Filter) -> InMemoryQuery {
        InMemoryQuery {
            records: self.records.clone(),
            filter,
            sort: Vec::new(),
            projection: None,
            skip: 0,
            limit: 0,
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Record>> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(records
            .iter()
            .find(|r| self.key_of(r).as_deref() == Some(id))
            .cloned())
    }

    async fn insert(&self, mut record: Record) -> Result<Record> {
        let now = timestamp();
        record.insert(
            ID_FIELD.to_string(),
            Value::String(Uuid::new_v4().simple().to_string()),
        );
        record.insert(CREATED_AT_FIELD.to_string(), now.clone());
        record.insert(UPDATED_AT_FIELD.to_string(), now);
        record.insert(VERSION_FIELD.to_string(), Value::from(0));

        let key = self.key_of(&record).ok_or_else(|| StoreError::MissingKey {
            field: self.key_field.clone(),
        })?;

        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if records.iter().any(|r| self.key_of(r).as_deref() == Some(&key)) {
            return Err(StoreError::Duplicate {
                field: self.key_field.clone(),
                value: key,
            }
            .into());
        }

        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, mut patch: Record) -> Result<Option<Record>> {
        for managed in [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD, VERSION_FIELD] {
            patch.remove(managed);
        }

        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if let Some(new_key) = patch.get(&self.key_field).and_then(key_text) {
            if new_key != id && records.iter().any(|r| self.key_of(r).as_deref() == Some(&new_key)) {
                return Err(StoreError::Duplicate {
                    field: self.key_field.clone(),
                    value: new_key,
                }
                .into());
            }
        }

        let Some(existing) = records
            .iter_mut()
            .find(|r| r.get(&self.key_field).and_then(key_text).as_deref() == Some(id))
        else {
            return Ok(None);
        };

        existing.extend(patch);
        existing.insert(UPDATED_AT_FIELD.to_string(), timestamp());
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let before = records.len();
        records.retain(|r| self.key_of(r).as_deref() != Some(id));
        Ok(records.len() != before)
    }
}

/// Pending query over an [`InMemoryCollection`]
///
/// Backend semantics for the raw window values: a negative skip counts as
/// zero, a limit of zero means "no limit", a negative limit uses its
/// absolute value.
#[derive(Debug, Clone)]
pub struct InMemoryQuery {
    records: Arc<RwLock<Vec<Record>>>,
    filter: Filter,
    sort: Vec<SortKey>,
    projection: Option<Projection>,
    skip: i64,
    limit: i64,
}

impl InMemoryQuery {
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn window(&self) -> (i64, i64) {
        (self.skip, self.limit)
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }
}

fn compare_records(a: &Record, b: &Record, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ord = match (a.get(&key.field), b.get(&key.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        };
        let ord = match key.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl CollectionQuery for InMemoryQuery {
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
        let mut matched: Vec<Record> = {
            let records = self
                .records
                .read()
                .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
            records
                .iter()
                .filter(|r| self.filter.matches(r))
                .cloned()
                .collect()
        };

        if !self.sort.is_empty() {
            matched.sort_by(|a, b| compare_records(a, b, &self.sort));
        }

        let skip = usize::try_from(self.skip.max(0)).unwrap_or(usize::MAX);
        let take = match self.limit.unsigned_abs() {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|record| match &self.projection {
                Some(projection) => projection.apply(record),
                None => record,
            })
            .collect())
    }
}
