use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::Deserialize;

use super::schema::{ExistingIndex, IndexSpec, RoleGrant, UserSpec};
use super::{ensure_collection_absent, AdminBackend};
use crate::config::Config;
use crate::error::Result;

const APP_NAME: &str = "budget-bootstrap";

/// Connect to the server with the administrative connection string
///
/// Fails fast with `ConnectionFailure` when no server answers a `ping`
/// within the configured timeout.
pub async fn connect(config: &Config) -> Result<Client> {
    tracing::info!("Connecting to {}", config.redacted_uri());

    let mut options = ClientOptions::parse(config.mongodb_uri.as_str()).await?;
    options.app_name = Some(APP_NAME.to_string());
    options.server_selection_timeout = Some(config.timeout());
    options.connect_timeout = Some(config.timeout());

    let client = Client::with_options(options)?;
    client.database("admin").run_command(doc! { "ping": 1 }).await?;

    tracing::info!("Connected to database server");

    Ok(client)
}

/// `AdminBackend` over a live server
#[derive(Clone)]
pub struct MongoBackend {
    database: Database,
}

impl MongoBackend {
    pub fn new(client: &Client, database_name: &str) -> Self {
        Self {
            database: client.database(database_name),
        }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[derive(Debug, Deserialize)]
struct UsersInfoReply {
    users: Vec<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    roles: Vec<RoleGrant>,
}

#[async_trait]
impl AdminBackend for MongoBackend {
    fn database_name(&self) -> &str {
        self.database.name()
    }

    async fn ping(&self) -> Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn create_user(&self, user: &UserSpec) -> Result<()> {
        let roles: Vec<Document> = user.roles.iter().map(RoleGrant::to_document).collect();
        self.database
            .run_command(doc! {
                "createUser": user.username.as_str(),
                "pwd": user.password.as_str(),
                "roles": roles,
            })
            .await?;
        Ok(())
    }

    async fn user_roles(&self, username: &str) -> Result<Option<Vec<RoleGrant>>> {
        let reply = self
            .database
            .run_command(doc! { "usersInfo": username })
            .await?;
        let reply: UsersInfoReply = bson::from_document(reply)?;
        Ok(reply.users.into_iter().next().map(|u| u.roles))
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        let existing = self
            .database
            .list_collection_names()
            .filter(doc! { "name": name })
            .await?;
        ensure_collection_absent(&existing, self.database_name(), name)?;

        self.database.create_collection(name).await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.database.list_collection_names().await?)
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        let model = IndexModel::builder()
            .keys(index.keys_document())
            .options(IndexOptions::builder().name(index.name()).build())
            .build();
        self.collection(collection).create_index(model).await?;
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<ExistingIndex>> {
        let models: Vec<IndexModel> = self
            .collection(collection)
            .list_indexes()
            .await?
            .try_collect()
            .await?;

        Ok(models
            .into_iter()
            .map(|model| ExistingIndex {
                name: model.options.and_then(|o| o.name).unwrap_or_default(),
                keys: model.keys,
            })
            .collect())
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64> {
        Ok(self.collection(collection).count_documents(filter).await?)
    }

    async fn insert_document(&self, collection: &str, document: Document) -> Result<()> {
        self.collection(collection).insert_one(document).await?;
        Ok(())
    }
}
