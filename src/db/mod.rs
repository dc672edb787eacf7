pub mod memory;
pub mod mongo;
pub mod schema;

use async_trait::async_trait;
use bson::Document;

use crate::error::{BootstrapError, Result};
use schema::{ExistingIndex, IndexSpec, RoleGrant, UserSpec};

pub use memory::MemoryBackend;
pub use mongo::{connect, MongoBackend};

/// Administrative operations against one target database
///
/// Every call is a single round trip; implementations map server errors onto
/// `BootstrapError` so callers can tell duplicates from fatal failures.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    /// Name of the database this backend operates on
    fn database_name(&self) -> &str;

    async fn ping(&self) -> Result<()>;

    async fn create_user(&self, user: &UserSpec) -> Result<()>;

    /// Roles granted to `username`, or `None` if the user does not exist
    async fn user_roles(&self, username: &str) -> Result<Option<Vec<RoleGrant>>>;

    async fn create_collection(&self, name: &str) -> Result<()>;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()>;

    async fn list_indexes(&self, collection: &str) -> Result<Vec<ExistingIndex>>;

    /// Count documents whose top-level fields equal those in `filter`
    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64>;

    async fn insert_document(&self, collection: &str, document: Document) -> Result<()>;
}

/// Fail with `AlreadyExists` when `name` is among the `existing` collections
///
/// Servers from 7.0 accept a repeated `create` with identical options, so the
/// check is made before creating rather than read off the server's reply.
pub(crate) fn ensure_collection_absent(existing: &[String], database: &str, name: &str) -> Result<()> {
    if existing.iter().any(|collection| collection == name) {
        return Err(BootstrapError::AlreadyExists(format!(
            "Collection {}.{} already exists.",
            database, name
        )));
    }
    Ok(())
}
