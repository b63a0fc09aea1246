//! In-memory document store
//!
//! Collections are `DashMap` entries holding documents keyed by id. Each
//! write locks only its own collection, so inserts and unique checks are
//! atomic per collection. Reads clone matching documents out before
//! sorting, projecting and populating.
//!
//! Rollups run after a write has released its collection: the source
//! collection is read and the target collection locked one at a time.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use super::error::{StoreError, StoreOperation, StoreResult};
use super::eval;
use super::schema::CollectionSchema;
use super::traits::{Document, DocumentStore, UpdateOptions};
use crate::ids::DocumentId;
use crate::query::{Populate, Predicate, Projection, Query, Relation, ID_FIELD, VERSION_FIELD};

/// How many levels of related documents a read expands
const MAX_POPULATE_DEPTH: usize = 3;

type Collection = BTreeMap<String, Document>;

#[derive(Debug, Default)]
struct Inner {
    collections: DashMap<String, Collection>,
    schemas: HashMap<String, CollectionSchema>,
}

/// A [`DocumentStore`] held entirely in process memory
///
/// Cloning is cheap; clones share the same collections.
///
/// ```rust
/// use serde_json::json;
/// use tourbook_service::query::Query;
/// use tourbook_service::store::{DocumentStore, MemoryStore};
///
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// rt.block_on(async {
///     let store = MemoryStore::new();
///     let body = json!({"name": "The Sea Explorer"}).as_object().cloned().unwrap();
///     let created = store.create("tours", body).await.unwrap();
///     assert!(created.contains_key("_id"));
///
///     let all = store.find(&Query::find("tours")).await.unwrap();
///     assert_eq!(all.len(), 1);
/// });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// A store without schemas; documents are stored as given
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemas(schemas: impl IntoIterator<Item = CollectionSchema>) -> Self {
        Self {
            inner: Arc::new(Inner {
                collections: DashMap::new(),
                schemas: schemas
                    .into_iter()
                    .map(|schema| (schema.name.clone(), schema))
                    .collect(),
            }),
        }
    }

    pub fn schema(&self, collection: &str) -> Option<&CollectionSchema> {
        self.inner.schemas.get(collection)
    }

    /// Number of stored documents, ignoring any scope
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .get(collection)
            .map_or(0, |docs| docs.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Bulk-load trusted documents.
    ///
    /// Supplied `_id`s are kept so references between imported collections
    /// stay intact. Defaults and casts apply; validation rules do not.
    /// Unique indexes are still enforced.
    pub fn import(&self, collection: &str, documents: Vec<Document>) -> StoreResult<usize> {
        let op = StoreOperation::Import;
        let mut prepared = Vec::with_capacity(documents.len());
        for mut document in documents {
            let id = match document.remove(ID_FIELD) {
                Some(Value::String(raw)) => parse_id(op, collection, &raw)?,
                Some(other) => return Err(StoreError::invalid_id(op, collection, other.to_string())),
                None => DocumentId::new(),
            };
            if let Some(schema) = self.schema(collection) {
                document = schema
                    .prepare_import(document)
                    .map_err(|messages| StoreError::validation_failed(op, collection, messages))?;
            }
            document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            document
                .entry(VERSION_FIELD.to_string())
                .or_insert_with(|| Value::from(0));
            prepared.push((id, document));
        }

        let count = prepared.len();
        let touched: Vec<Document> = prepared.iter().map(|(_, doc)| doc.clone()).collect();
        {
            let mut docs = self.inner.collections.entry(collection.to_string()).or_default();
            for (id, document) in prepared {
                if let Some(schema) = self.schema(collection) {
                    if let Some((fields, value)) = unique_violation(schema, &docs, &document, None) {
                        return Err(StoreError::duplicate(op, collection, fields, value));
                    }
                }
                docs.insert(id.to_string(), document);
            }
        }
        self.apply_rollups(collection, &touched);
        tracing::debug!(collection, count, "imported documents");
        Ok(count)
    }

    /// Remove every document from `collection`
    pub fn clear(&self, collection: &str) -> usize {
        self.inner
            .collections
            .remove(collection)
            .map_or(0, |(_, docs)| docs.len())
    }

    fn scoped(&self, collection: &str, predicate: Predicate) -> Predicate {
        match self.schema(collection) {
            Some(schema) => schema.scope.clone().merge(predicate),
            None => predicate,
        }
    }

    fn cast_filter(&self, collection: &str, predicate: &Predicate) -> StoreResult<Predicate> {
        match self.schema(collection) {
            Some(schema) => schema
                .cast_predicate(predicate.clone())
                .map_err(|failure| StoreError::cast_failed(StoreOperation::Find, collection, failure)),
            None => Ok(predicate.clone()),
        }
    }

    fn hidden(&self, collection: &str) -> Vec<&str> {
        self.schema(collection)
            .map(|schema| schema.hidden_fields().collect())
            .unwrap_or_default()
    }

    fn default_populates(&self, collection: &str) -> Vec<Populate> {
        self.schema(collection)
            .map(|schema| schema.populate.clone())
            .unwrap_or_default()
    }

    fn snapshot(&self, collection: &str, predicate: &Predicate) -> Vec<Document> {
        self.inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| eval::matches(doc, predicate))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lookup(&self, collection: &str, id: &str, scope: &Predicate) -> Option<Document> {
        let id = DocumentId::parse(id)?;
        self.inner
            .collections
            .get(collection)?
            .get(id.as_str())
            .filter(|doc| eval::matches(doc, scope))
            .cloned()
    }

    /// Project a stored document and add the collection's computed fields
    fn output(&self, collection: &str, document: &Document, projection: &Projection) -> Document {
        let mut output = eval::project(document, projection, &self.hidden(collection));
        if let Some(schema) = self.schema(collection) {
            schema.apply_computed(&mut output);
        }
        output
    }

    /// Project for output and expand the collection's standing relations
    /// plus `extra`.
    fn present(&self, collection: &str, document: &Document, extra: &[Populate]) -> Document {
        let mut output = self.output(collection, document, &Projection::all());
        let mut populates = self.default_populates(collection);
        populates.extend_from_slice(extra);
        self.populate_all(std::slice::from_mut(&mut output), &populates, 0);
        output
    }

    fn populate_all(&self, docs: &mut [Document], populates: &[Populate], depth: usize) {
        if depth >= MAX_POPULATE_DEPTH || populates.is_empty() {
            return;
        }
        for doc in docs.iter_mut() {
            for populate in populates {
                self.populate_one(doc, populate, depth);
            }
        }
    }

    fn populate_one(&self, doc: &mut Document, populate: &Populate, depth: usize) {
        let scope = self.scoped(&populate.from, Predicate::new());
        let mut nested = self.default_populates(&populate.from);
        nested.extend(populate.nested.iter().cloned());

        let resolve = |found: Vec<Document>| -> Vec<Document> {
            let mut found: Vec<Document> = found
                .iter()
                .map(|related| self.output(&populate.from, related, &populate.select))
                .collect();
            self.populate_all(&mut found, &nested, depth + 1);
            found
        };

        let replacement = match &populate.relation {
            Relation::Reference => match doc.get(&populate.path) {
                Some(Value::String(id)) => {
                    let found = self.lookup(&populate.from, id, &scope).into_iter().collect();
                    resolve(found)
                        .pop()
                        .map_or(Value::Null, Value::Object)
                }
                Some(Value::Array(ids)) => {
                    let found = ids
                        .iter()
                        .filter_map(Value::as_str)
                        .filter_map(|id| self.lookup(&populate.from, id, &scope))
                        .collect();
                    Value::Array(resolve(found).into_iter().map(Value::Object).collect())
                }
                _ => return,
            },
            Relation::Virtual { foreign_field } => {
                let Some(id) = doc.get(ID_FIELD).cloned() else {
                    return;
                };
                let predicate = scope.clone().merge(Predicate::new().field(foreign_field.clone(), id));
                let found = self.snapshot(&populate.from, &predicate);
                Value::Array(resolve(found).into_iter().map(Value::Object).collect())
            }
        };
        doc.insert(populate.path.clone(), replacement);
    }

    /// Recompute every rollup target referenced by `touched`
    fn apply_rollups(&self, collection: &str, touched: &[Document]) {
        let Some(schema) = self.schema(collection) else {
            return;
        };
        for rollup in &schema.rollups {
            let targets: BTreeSet<&str> = touched
                .iter()
                .filter_map(|doc| doc.get(&rollup.foreign_field))
                .filter_map(Value::as_str)
                .collect();

            for target in targets {
                let Some(target_id) = DocumentId::parse(target) else {
                    continue;
                };
                let values: Vec<f64> = self
                    .inner
                    .collections
                    .get(collection)
                    .map(|docs| {
                        docs.values()
                            .filter(|doc| {
                                doc.get(&rollup.foreign_field).and_then(Value::as_str) == Some(target)
                            })
                            .filter_map(|doc| doc.get(&rollup.value_field).and_then(Value::as_f64))
                            .collect()
                    })
                    .unwrap_or_default();

                let mut summary = rollup.summary(&values);
                if let Some(target_schema) = self.schema(&rollup.target) {
                    if let Ok(normalized) = target_schema.prepare_update(summary.clone(), false) {
                        summary = normalized;
                    }
                }

                if let Some(mut docs) = self.inner.collections.get_mut(&rollup.target) {
                    if let Some(doc) = docs.get_mut(target_id.as_str()) {
                        doc.extend(summary);
                        tracing::trace!(collection, target = %target_id, count = values.len(), "rollup applied");
                    }
                }
            }
        }
    }
}

fn parse_id(op: StoreOperation, collection: &str, raw: &str) -> StoreResult<DocumentId> {
    DocumentId::parse(raw).ok_or_else(|| StoreError::invalid_id(op, collection, raw))
}

fn strip_managed(mut document: Document) -> Document {
    document.remove(ID_FIELD);
    document.remove(VERSION_FIELD);
    document
}

/// First unique index `candidate` would violate, with the clashing value
fn unique_violation(
    schema: &CollectionSchema,
    docs: &Collection,
    candidate: &Document,
    own_id: Option<&str>,
) -> Option<(Vec<String>, String)> {
    for fields in &schema.unique {
        let values: Option<Vec<&Value>> = fields
            .iter()
            .map(|field| eval::get_path(candidate, field).filter(|v| !v.is_null()))
            .collect();
        let Some(values) = values else {
            continue;
        };

        let clash = docs
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != own_id)
            .any(|(_, other)| {
                fields
                    .iter()
                    .zip(&values)
                    .all(|(field, value)| eval::get_path(other, field) == Some(*value))
            });
        if clash {
            let shown = match values.as_slice() {
                [single] => single.to_string(),
                _ => Value::Object(
                    fields
                        .iter()
                        .cloned()
                        .zip(values.iter().map(|v| (*v).clone()))
                        .collect(),
                )
                .to_string(),
            };
            return Some((fields.clone(), shown));
        }
    }
    None
}

impl DocumentStore for MemoryStore {
    async fn find(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let collection = query.collection();
        let predicate = self.cast_filter(collection, query.predicate())?;
        let predicate = self.scoped(collection, predicate);
        let mut docs = self.snapshot(collection, &predicate);
        docs.sort_by(|a, b| eval::compare_docs(a, b, query.sort_keys()));

        let skip = usize::try_from(query.skip_count()).unwrap_or(usize::MAX);
        let limit = query
            .limit_count()
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
        let mut page: Vec<Document> = docs
            .iter()
            .skip(skip)
            .take(limit)
            .map(|doc| self.output(collection, doc, query.projection()))
            .collect();

        let mut populates = self.default_populates(collection);
        populates.extend_from_slice(query.populates());
        self.populate_all(&mut page, &populates, 0);

        tracing::trace!(collection, matched = docs.len(), returned = page.len(), "find");
        Ok(page)
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        populate: &[Populate],
    ) -> StoreResult<Option<Document>> {
        let id = parse_id(StoreOperation::FindById, collection, id)?;
        let scope = self.scoped(collection, Predicate::new());
        let found = self.lookup(collection, id.as_str(), &scope);
        Ok(found.map(|doc| self.present(collection, &doc, populate)))
    }

    async fn create(&self, collection: &str, document: Document) -> StoreResult<Document> {
        let op = StoreOperation::Create;
        let mut document = strip_managed(document);
        if let Some(schema) = self.schema(collection) {
            document = schema
                .prepare_create(document)
                .map_err(|messages| StoreError::validation_failed(op, collection, messages))?;
        }

        let id = DocumentId::new();
        document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        document.insert(VERSION_FIELD.to_string(), Value::from(0));

        {
            let mut docs = self.inner.collections.entry(collection.to_string()).or_default();
            if let Some(schema) = self.schema(collection) {
                if let Some((fields, value)) = unique_violation(schema, &docs, &document, None) {
                    return Err(StoreError::duplicate(op, collection, fields, value));
                }
            }
            docs.insert(id.to_string(), document.clone());
        }
        self.apply_rollups(collection, std::slice::from_ref(&document));

        tracing::debug!(collection, id = %id, "document created");
        Ok(self.output(collection, &document, &Projection::all()))
    }

    async fn find_by_id_and_update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
        options: UpdateOptions,
    ) -> StoreResult<Option<Document>> {
        let op = StoreOperation::FindByIdAndUpdate;
        let id = parse_id(op, collection, id)?;
        let mut patch = strip_managed(patch);
        if let Some(schema) = self.schema(collection) {
            patch = schema
                .prepare_update(patch, options.run_validators)
                .map_err(|messages| {
                    StoreError::validation_failed(op, collection, messages)
                        .with_document_id(id.as_str())
                })?;
        }
        let scope = self.scoped(collection, Predicate::new());

        let (before, after) = {
            let Some(mut docs) = self.inner.collections.get_mut(collection) else {
                return Ok(None);
            };
            let Some(before) = docs
                .get(id.as_str())
                .filter(|doc| eval::matches(doc, &scope))
                .cloned()
            else {
                return Ok(None);
            };

            let mut after = before.clone();
            after.extend(patch);
            if let Some(schema) = self.schema(collection) {
                if let Some((fields, value)) =
                    unique_violation(schema, &docs, &after, Some(id.as_str()))
                {
                    return Err(StoreError::duplicate(op, collection, fields, value)
                        .with_document_id(id.as_str()));
                }
            }
            docs.insert(id.to_string(), after.clone());
            (before, after)
        };
        self.apply_rollups(collection, &[before.clone(), after.clone()]);

        tracing::debug!(collection, id = %id, "document updated");
        let returned = if options.return_new { after } else { before };
        Ok(Some(self.present(collection, &returned, &[])))
    }

    async fn find_by_id_and_delete(
        &self,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<Document>> {
        let id = parse_id(StoreOperation::FindByIdAndDelete, collection, id)?;
        let scope = self.scoped(collection, Predicate::new());

        let removed = {
            let Some(mut docs) = self.inner.collections.get_mut(collection) else {
                return Ok(None);
            };
            let in_scope = docs
                .get(id.as_str())
                .is_some_and(|doc| eval::matches(doc, &scope));
            if !in_scope {
                return Ok(None);
            }
            docs.remove(id.as_str())
        };

        if let Some(doc) = &removed {
            self.apply_rollups(collection, std::slice::from_ref(doc));
            tracing::debug!(collection, id = %id, "document deleted");
        }
        Ok(removed.map(|doc| self.output(collection, &doc, &Projection::all())))
    }
}
