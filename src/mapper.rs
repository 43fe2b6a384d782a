//! Generic schema-driven mapping between entities and the document store.
//!
//! A [`Mapper`] pairs a [`DocumentStore`] with one [`EntitySchema`] and gives
//! that entity create/read/update/soft-delete/search semantics. Soft-deleted
//! documents stay in the store but are invisible to every operation here.
//!
//! Uniqueness is checked with a read before the insert. The two calls are not
//! atomic, so two concurrent creations of the same unique value can both
//! succeed.

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::access::AccessLevel;
use crate::query::{same_value, Filter, FindOptions};
use crate::schema::EntitySchema;
use crate::store::{DocumentStore, StoreError};
use crate::{Document, DELETED_FIELD, ID_FIELD};

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("{collection} with id '{id}' not found")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    #[error("attribute {0} is required, but not present in request")]
    MissingRequiredField(String),

    #[error("a document with the same {0} already exists")]
    DuplicateValue(String),

    #[error("unable to create document, _id attribute already set")]
    AlreadyPersisted,

    #[error("field '{field}' is not declared on {collection}")]
    UnknownField {
        collection: &'static str,
        field: String,
    },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Matches documents that have not been soft-deleted.
pub fn not_deleted() -> Filter {
    Filter::Or(vec![
        Filter::missing(DELETED_FIELD),
        Filter::eq(DELETED_FIELD, false),
    ])
}

/// One entity instance: the declared fields of its schema plus `_id` and
/// the deletion marker. Nothing else can be stored on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: &'static EntitySchema,
    values: Document,
}

impl Record {
    /// An empty, unpersisted record of `schema`.
    pub fn new(schema: &'static EntitySchema) -> Self {
        Self {
            schema,
            values: Document::new(),
        }
    }

    /// Hydrates a stored document, dropping any key the schema does not know.
    pub fn from_document(schema: &'static EntitySchema, doc: Document) -> Self {
        let values = doc
            .into_iter()
            .filter(|(k, _)| is_settable(schema, k))
            .collect();
        Self { schema, values }
    }

    /// The schema this record's fields are checked against.
    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    /// The store-assigned id, once persisted.
    pub fn id(&self) -> Option<&str> {
        self.values.get(ID_FIELD).and_then(Value::as_str)
    }

    /// The value of `field`. A stored `null` reads as absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Whether `field` holds a non-null value.
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Writes a declared field. Access-level fields are normalized to their
    /// stored integer form.
    ///
    /// # Errors
    ///
    /// * `field` is not declared by the schema → [`MapperError::UnknownField`]
    /// * an unreadable access level → [`MapperError::InvalidValue`]
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), MapperError> {
        if !is_settable(self.schema, field) {
            return Err(MapperError::UnknownField {
                collection: self.schema.collection,
                field: field.to_string(),
            });
        }

        let value = if self.schema.access_field == Some(field) && !value.is_null() {
            AccessLevel::from_json(&value)
                .map_err(|e| MapperError::InvalidValue {
                    field: field.to_string(),
                    reason: e.to_string(),
                })?
                .to_json()
        } else {
            value
        };

        self.values.insert(field.to_string(), value);
        Ok(())
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.values.get(DELETED_FIELD), Some(Value::Bool(true)))
    }

    /// Persisted records carry a store id or their business id.
    pub fn is_persisted(&self) -> bool {
        self.id().is_some_and(|id| !id.is_empty()) || self.contains(self.schema.id_field)
    }

    /// The flattened field map, including `_id` once persisted.
    pub fn as_document(&self) -> &Document {
        &self.values
    }

    pub fn into_document(self) -> Document {
        self.values
    }
}

fn is_settable(schema: &EntitySchema, field: &str) -> bool {
    field == ID_FIELD || field == DELETED_FIELD || schema.declares(field)
}

/// Generic create/read/update/delete engine for one entity.
#[derive(Debug, Clone, Copy)]
pub struct Mapper<'a> {
    store: &'a dyn DocumentStore,
    schema: &'static EntitySchema,
}

impl<'a> Mapper<'a> {
    /// Binds `schema` to `store`. Mappers are cheap and meant to be built
    /// per call.
    pub fn new(store: &'a dyn DocumentStore, schema: &'static EntitySchema) -> Self {
        Self { store, schema }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    /// Resolves a record by its business id, then by its store id.
    ///
    /// The store id is only tried when `id` is a well-formed UUID.
    ///
    /// # Errors
    ///
    /// * no live record under either id → [`MapperError::NotFound`]
    /// * storage failures → [`MapperError::Store`]
    pub async fn lookup(&self, id: &str) -> Result<Record, MapperError> {
        let by_business_id = not_deleted().and(business_id_filter(self.schema.id_field, id));
        if let Some(doc) = self.store.find_one(self.schema.collection, &by_business_id).await? {
            return Ok(Record::from_document(self.schema, doc));
        }

        if Uuid::parse_str(id).is_ok() {
            let by_store_id = not_deleted().and(Filter::eq(ID_FIELD, id));
            if let Some(doc) = self.store.find_one(self.schema.collection, &by_store_id).await? {
                return Ok(Record::from_document(self.schema, doc));
            }
        }

        Err(MapperError::NotFound {
            collection: self.schema.collection,
            id: id.to_string(),
        })
    }

    /// Validated insertion from a request payload.
    ///
    /// Checks run in a fixed order so the reported error is deterministic:
    /// field copy, required fields, uniqueness, identity, insert.
    ///
    /// # Parameters
    ///
    /// * `payload` - Request body. Keys the schema does not declare and
    ///   `null` values are ignored.
    ///
    /// # Returns
    ///
    /// The stored record, carrying its newly assigned `_id`.
    ///
    /// # Errors
    ///
    /// * a required field is absent → [`MapperError::MissingRequiredField`]
    /// * a unique field collides with a live record → [`MapperError::DuplicateValue`]
    /// * the payload carries `_id` → [`MapperError::AlreadyPersisted`]
    pub async fn create(&self, payload: &Document) -> Result<Record, MapperError> {
        let mut record = Record::new(self.schema);

        for field in std::iter::once(ID_FIELD).chain(self.schema.fields.iter().copied()) {
            if let Some(value) = payload.get(field).filter(|v| !v.is_null()) {
                record.set(field, value.clone())?;
            }
        }

        for field in self.schema.required_fields {
            if !record.contains(field) {
                return Err(MapperError::MissingRequiredField(field.to_string()));
            }
        }

        for field in self.schema.unique_fields {
            if let Some(value) = record.get(field) {
                if self.find_collision(field, value, None).await?.is_some() {
                    return Err(MapperError::DuplicateValue(field.to_string()));
                }
            }
        }

        if record.contains(ID_FIELD) {
            return Err(MapperError::AlreadyPersisted);
        }

        let id = self
            .store
            .insert(self.schema.collection, record.values.clone())
            .await?;
        debug!(collection = self.schema.collection, %id, "record created");
        record.values.insert(ID_FIELD.to_string(), Value::String(id));
        Ok(record)
    }

    /// Overwrites the declared fields present in `payload`, then saves the
    /// whole record. Fields absent from the payload keep their values.
    pub async fn update(&self, record: &mut Record, payload: &Document) -> Result<(), MapperError> {
        if !record.is_persisted() {
            return Err(MapperError::MissingRequiredField(ID_FIELD.to_string()));
        }

        let mut changed = Record::clone(record);
        for field in self.schema.fields {
            if let Some(value) = payload.get(*field).filter(|v| !v.is_null()) {
                changed.set(field, value.clone())?;
            }
        }

        for field in self.schema.unique_fields {
            let Some(value) = changed.get(field) else {
                continue;
            };
            if record.get(field).is_some_and(|old| same_value(old, value)) {
                continue;
            }
            if self.find_collision(field, value, changed.id()).await?.is_some() {
                return Err(MapperError::DuplicateValue(field.to_string()));
            }
        }

        self.save(&changed).await?;
        *record = changed;
        Ok(())
    }

    /// Full replace of the stored document with the record's current values.
    ///
    /// A record with an `_id` is written through that id alone; otherwise
    /// the live document holding its business id is replaced.
    ///
    /// # Errors
    ///
    /// * the record has neither id → [`MapperError::MissingRequiredField`]
    /// * nothing matched → [`MapperError::NotFound`]
    pub async fn save(&self, record: &Record) -> Result<(), MapperError> {
        let filter = match record.id().filter(|id| !id.is_empty()) {
            Some(id) => Filter::eq(ID_FIELD, id),
            None => match record.get(self.schema.id_field) {
                Some(business_id) => {
                    not_deleted().and(Filter::Eq(self.schema.id_field.to_string(), business_id.clone()))
                }
                None => return Err(MapperError::MissingRequiredField(ID_FIELD.to_string())),
            },
        };

        let replaced = self
            .store
            .replace_one(self.schema.collection, &filter, record.values.clone())
            .await?;
        if replaced == 0 {
            return Err(MapperError::NotFound {
                collection: self.schema.collection,
                id: record
                    .id()
                    .map(str::to_string)
                    .or_else(|| record.get(self.schema.id_field).map(Value::to_string))
                    .unwrap_or_default(),
            });
        }

        debug!(collection = self.schema.collection, id = ?record.id(), "record saved");
        Ok(())
    }

    /// Marks the record deleted. Its other fields are left untouched.
    pub async fn soft_delete(&self, record: &mut Record) -> Result<(), MapperError> {
        if !record.is_persisted() {
            return Err(MapperError::MissingRequiredField(ID_FIELD.to_string()));
        }
        record.set(DELETED_FIELD, Value::Bool(true))?;
        self.save(record).await
    }

    /// Case-insensitive regex search over the schema's search fields.
    pub async fn search(&self, pattern: &str) -> Result<Vec<Record>, MapperError> {
        Ok(self
            .find_matching(pattern)
            .await?
            .into_iter()
            .map(|doc| Record::from_document(self.schema, doc))
            .collect())
    }

    /// Same as [`search`](Mapper::search), returning flattened field maps.
    pub async fn search_raw(&self, pattern: &str) -> Result<Vec<Document>, MapperError> {
        Ok(self
            .search(pattern)
            .await?
            .into_iter()
            .map(Record::into_document)
            .collect())
    }

    /// Every live record, in insertion order.
    pub async fn list_all(&self) -> Result<Vec<Record>, MapperError> {
        let docs = self
            .store
            .find(self.schema.collection, FindOptions::new(not_deleted()))
            .await?;
        Ok(docs
            .into_iter()
            .map(|doc| Record::from_document(self.schema, doc))
            .collect())
    }

    /// Number of live records. Soft-deleted ones are not counted.
    pub async fn count(&self) -> Result<u64, MapperError> {
        Ok(self.store.count(self.schema.collection, &not_deleted()).await?)
    }

    async fn find_matching(&self, pattern: &str) -> Result<Vec<Document>, MapperError> {
        if self.schema.search_fields.is_empty() {
            return Ok(Vec::new());
        }
        let re = compile_pattern(pattern)?;
        let any_field = Filter::Or(
            self.schema
                .search_fields
                .iter()
                .map(|field| Filter::Regex(field.to_string(), re.clone()))
                .collect(),
        );
        Ok(self
            .store
            .find(
                self.schema.collection,
                FindOptions::new(not_deleted().and(any_field)),
            )
            .await?)
    }

    /// A live document other than `except` already holding `value` in
    /// `field`. Array values collide on any shared element.
    async fn find_collision(
        &self,
        field: &str,
        value: &Value,
        except: Option<&str>,
    ) -> Result<Option<Document>, MapperError> {
        let same = match value {
            Value::Array(items) => Filter::is_in(field, items.clone()),
            other => Filter::Eq(field.to_string(), other.clone()),
        };
        let docs = self
            .store
            .find(self.schema.collection, FindOptions::new(not_deleted().and(same)))
            .await?;
        Ok(docs.into_iter().find(|doc| {
            except.map_or(true, |id| doc.get(ID_FIELD).and_then(Value::as_str) != Some(id))
        }))
    }
}

/// Path parameters arrive as strings; a numeric business id (such as an
/// event timestamp) also matches its number form.
fn business_id_filter(field: &str, id: &str) -> Filter {
    let mut candidates = vec![Value::String(id.to_string())];
    if let Ok(n) = id.parse::<i64>() {
        candidates.push(Value::from(n));
    } else if let Some(n) = id.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        candidates.push(Value::Number(n));
    }
    Filter::is_in(field, candidates)
}

/// Compiles a search pattern case-insensitively. Patterns that are not valid
/// regular expressions are matched literally, with `*` as a wildcard.
pub fn compile_pattern(pattern: &str) -> Result<Regex, MapperError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(pattern).replace(r"\*", ".*"))
                .case_insensitive(true)
                .build()
        })
        .map_err(|e| MapperError::InvalidPattern(e.to_string()))
}
