//! In-process backend
//!
//! Mirrors the server's duplicate and conflict semantics closely enough to
//! exercise the bootstrap without a live database. Used by tests.

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::schema::{ExistingIndex, IndexSpec, RoleGrant, UserSpec};
use super::{ensure_collection_absent, AdminBackend};
use crate::error::{BootstrapError, Result};

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Ping,
    CreateUser,
    UserRoles,
    CreateCollection,
    ListCollections,
    CreateIndex,
    ListIndexes,
    CountDocuments,
    InsertDocument,
}

/// Failure returned by an operation until cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Connection,
    PermissionDenied,
    /// The operation never completes
    Stall,
}

#[derive(Debug)]
struct MemoryCollection {
    indexes: Vec<ExistingIndex>,
    documents: Vec<Document>,
}

impl MemoryCollection {
    fn new() -> Self {
        Self {
            indexes: vec![ExistingIndex {
                name: "_id_".to_string(),
                keys: doc! { "_id": 1 },
            }],
            documents: Vec::new(),
        }
    }
}

/// Thread-safe in-memory `AdminBackend`
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    database: String,
    users: Arc<RwLock<HashMap<String, UserSpec>>>,
    collections: Arc<RwLock<BTreeMap<String, MemoryCollection>>>,
    failures: Arc<RwLock<HashMap<Operation, InjectedFailure>>>,
}

impl MemoryBackend {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            users: Arc::new(RwLock::new(HashMap::new())),
            collections: Arc::new(RwLock::new(BTreeMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Make `op` fail with `failure` until `clear_failures` is called
    pub async fn inject_failure(&self, op: Operation, failure: InjectedFailure) {
        self.failures.write().await.insert(op, failure);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Number of existing users
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    /// All documents in a collection, in insertion order
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.documents.clone())
            .unwrap_or_default()
    }

    /// Seed an index as if another tool had built it
    pub async fn insert_index(&self, collection: &str, index: ExistingIndex) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new)
            .indexes
            .push(index);
    }

    async fn check(&self, op: Operation) -> Result<()> {
        let failure = self.failures.read().await.get(&op).copied();
        match failure {
            Some(InjectedFailure::Connection) => Err(BootstrapError::ConnectionFailure(format!(
                "{:?}: server unreachable",
                op
            ))),
            Some(InjectedFailure::PermissionDenied) => Err(BootstrapError::PermissionDenied(
                format!("{:?}: not authorized", op),
            )),
            Some(InjectedFailure::Stall) => std::future::pending().await,
            None => Ok(()),
        }
    }
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| document.get(key) == Some(value))
}

#[async_trait]
impl AdminBackend for MemoryBackend {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> Result<()> {
        self.check(Operation::Ping).await
    }

    async fn create_user(&self, user: &UserSpec) -> Result<()> {
        self.check(Operation::CreateUser).await?;

        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(BootstrapError::AlreadyExists(format!(
                "User \"{}@{}\" already exists",
                user.username, self.database
            )));
        }
        users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn user_roles(&self, username: &str) -> Result<Option<Vec<RoleGrant>>> {
        self.check(Operation::UserRoles).await?;

        Ok(self
            .users
            .read()
            .await
            .get(username)
            .map(|u| u.roles.clone()))
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        self.check(Operation::CreateCollection).await?;

        let mut collections = self.collections.write().await;
        let existing: Vec<String> = collections.keys().cloned().collect();
        ensure_collection_absent(&existing, &self.database, name)?;
        collections.insert(name.to_string(), MemoryCollection::new());
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.check(Operation::ListCollections).await?;

        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        self.check(Operation::CreateIndex).await?;

        let name = index.name();
        let keys = index.keys_document();
        let mut collections = self.collections.write().await;
        // Index creation implicitly creates the collection
        let target = collections
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new);

        for existing in &target.indexes {
            match (existing.name == name, existing.keys == keys) {
                // Identical index: no-op
                (true, true) => return Ok(()),
                (true, false) => {
                    return Err(BootstrapError::AlreadyExists(format!(
                        "An existing index has the same name as the requested index: {}",
                        name
                    )))
                }
                (false, true) => {
                    return Err(BootstrapError::AlreadyExists(format!(
                        "Index already exists with a different name: {}",
                        existing.name
                    )))
                }
                (false, false) => {}
            }
        }

        target.indexes.push(ExistingIndex { name, keys });
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<ExistingIndex>> {
        self.check(Operation::ListIndexes).await?;

        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default())
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64> {
        self.check(Operation::CountDocuments).await?;

        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| matches_filter(d, &filter))
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn insert_document(&self, collection: &str, mut document: Document) -> Result<()> {
        self.check(Operation::InsertDocument).await?;

        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        // Inserts create the collection lazily
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new)
            .documents
            .push(document);
        Ok(())
    }
}
