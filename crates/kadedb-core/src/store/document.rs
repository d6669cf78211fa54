//! Document storage engine
//!
//! Collections map string keys to documents, optionally governed by a
//! `DocumentSchema`. `put` auto-creates a schemaless collection; explicit
//! `create_collection` collisions are errors. Query results are deep
//! clones in key-insertion order.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{KadeError, KadeResult};
use crate::predicate::DocPredicate;
use crate::row::Document;
use crate::schema::DocumentSchema;
use crate::validation::{validate_document, validate_unique_documents};

#[derive(Debug)]
struct Collection {
    schema: Option<DocumentSchema>,
    docs: IndexMap<String, Document>,
}

/// In-memory document store
#[derive(Debug, Default)]
pub struct DocumentStore {
    inner: Mutex<HashMap<String, Collection>>,
}

impl DocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> KadeResult<MutexGuard<'_, HashMap<String, Collection>>> {
        self.inner
            .lock()
            .map_err(|_| KadeError::internal("document store lock poisoned"))
    }

    /// Create a collection, optionally schema-governed
    pub fn create_collection(
        &self,
        name: &str,
        schema: Option<DocumentSchema>,
    ) -> KadeResult<()> {
        let mut collections = self.guard()?;
        if collections.contains_key(name) {
            return Err(KadeError::already_exists(format!("collection '{name}'")));
        }
        collections.insert(
            name.to_string(),
            Collection {
                schema,
                docs: IndexMap::new(),
            },
        );
        Ok(())
    }

    /// Drop a collection and all of its documents
    pub fn drop_collection(&self, name: &str) -> KadeResult<()> {
        self.guard()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| KadeError::not_found(format!("collection '{name}'")))
    }

    /// Collection names, in arbitrary order
    pub fn list_collections(&self) -> KadeResult<Vec<String>> {
        Ok(self.guard()?.keys().cloned().collect())
    }

    /// Insert or replace a document
    ///
    /// A missing collection is auto-created without a schema. With a
    /// schema, the document is validated and uniqueness is checked across
    /// the prospective post-put set; a failed check restores the previous
    /// document.
    pub fn put(&self, collection: &str, key: &str, doc: Document) -> KadeResult<()> {
        let mut collections = self.guard()?;
        let coll = collections.entry(collection.to_string()).or_insert_with(|| {
            debug!("➕ auto-creating collection '{collection}'");
            Collection {
                schema: None,
                docs: IndexMap::new(),
            }
        });
        if let Some(schema) = &coll.schema {
            if let Some(message) = validate_document(schema, &doc) {
                return Err(KadeError::invalid_argument(message));
            }
        }
        let previous = coll.docs.insert(key.to_string(), doc);
        if let Some(schema) = &coll.schema {
            if let Some(message) = validate_unique_documents(schema, coll.docs.values(), true) {
                // Roll back to the pre-put state.
                match previous {
                    Some(prev) => {
                        coll.docs.insert(key.to_string(), prev);
                    }
                    None => {
                        coll.docs.shift_remove(key);
                    }
                }
                return Err(KadeError::failed_precondition(message));
            }
        }
        Ok(())
    }

    /// Deep clone of a document by key
    pub fn get(&self, collection: &str, key: &str) -> KadeResult<Document> {
        let collections = self.guard()?;
        let coll = lookup(&collections, collection)?;
        coll.docs
            .get(key)
            .map(Document::deep_copy)
            .ok_or_else(|| KadeError::not_found(format!("key '{key}' in '{collection}'")))
    }

    /// Remove a document by key
    pub fn erase(&self, collection: &str, key: &str) -> KadeResult<()> {
        let mut collections = self.guard()?;
        let coll = lookup_mut(&mut collections, collection)?;
        coll.docs
            .shift_remove(key)
            .map(|_| ())
            .ok_or_else(|| KadeError::not_found(format!("key '{key}' in '{collection}'")))
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> KadeResult<usize> {
        let collections = self.guard()?;
        Ok(lookup(&collections, collection)?.docs.len())
    }

    /// Filter by `predicate` and project `fields` (empty = whole document)
    ///
    /// Returns deep-cloned `(key, document)` pairs in key-insertion order.
    /// When the collection has a schema, predicate and projection field
    /// names must be declared.
    pub fn query(
        &self,
        collection: &str,
        fields: &[String],
        predicate: Option<&DocPredicate>,
    ) -> KadeResult<Vec<(String, Document)>> {
        let collections = self.guard()?;
        let coll = lookup(&collections, collection)?;
        if let Some(schema) = &coll.schema {
            if let Some(pred) = predicate {
                pred.validate_fields(schema)?;
            }
            for field in fields {
                if !schema.has_field(field) {
                    return Err(KadeError::invalid_argument(format!(
                        "unknown projection field '{field}'"
                    )));
                }
            }
        }

        let mut out = Vec::new();
        for (key, doc) in &coll.docs {
            if !predicate.is_none_or(|p| p.evaluate(doc)) {
                continue;
            }
            let projected = if fields.is_empty() {
                doc.deep_copy()
            } else {
                let mut projected = Document::new();
                for field in fields {
                    projected.set(field.clone(), doc.get(field).cloned().unwrap_or(None));
                }
                projected
            };
            out.push((key.clone(), projected));
        }
        Ok(out)
    }
}

fn lookup<'a>(
    collections: &'a HashMap<String, Collection>,
    name: &str,
) -> KadeResult<&'a Collection> {
    collections
        .get(name)
        .ok_or_else(|| KadeError::not_found(format!("collection '{name}'")))
}

fn lookup_mut<'a>(
    collections: &'a mut HashMap<String, Collection>,
    name: &str,
) -> KadeResult<&'a mut Collection> {
    collections
        .get_mut(name)
        .ok_or_else(|| KadeError::not_found(format!("collection '{name}'")))
}
