use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use bson::{Document, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, Credential},
};
use tracing::{debug, error, info};
use docmodel_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    config::StoreConfig,
    entity::ID_KEY,
    error::{ModelError, ModelResult},
    query::{CountOptions, Query},
};

use crate::options::{count_options, find_options};

/// Server error code for a missing collection.
const NAMESPACE_NOT_FOUND: i32 = 26;

fn backend_error(e: MongoError) -> ModelError {
    ModelError::Backend(e.to_string())
}

fn is_namespace_not_found(e: &MongoError) -> bool {
    matches!(e.kind.as_ref(), ErrorKind::Command(command) if command.code == NAMESPACE_NOT_FOUND)
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(config: StoreConfig) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::from_config(config)
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Checks that the server is reachable.
    pub async fn ping(&self) -> ModelResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ModelError::Configuration(format!("Ping failed: {}", e)))?;

        Ok(())
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn count_documents(
        &self,
        collection: &str,
        filter: Document,
        options: CountOptions,
    ) -> ModelResult<u64> {
        self.get_collection(collection)
            .count_documents(filter)
            .with_options(count_options(&options))
            .await
            .map_err(backend_error)
    }

    async fn find_documents(&self, collection: &str, query: Query) -> ModelResult<DocumentStream> {
        let (filter, options) = find_options(query);

        Ok(
            self.get_collection(collection)
                .find(filter)
                .with_options(options)
                .await
                .map_err(backend_error)?
                .map_err(backend_error)
                .boxed()
        )
    }

    async fn aggregate_documents(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> ModelResult<DocumentStream> {
        Ok(
            self.get_collection(collection)
                .aggregate(pipeline)
                .await
                .map_err(backend_error)?
                .map_err(backend_error)
                .boxed()
        )
    }

    async fn insert_document(&self, collection: &str, document: Document) -> ModelResult<ObjectId> {
        let result = self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(backend_error)?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ModelError::InvalidDocument(format!(
                "expected an ObjectId identity, got {}",
                result.inserted_id
            )))
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: ObjectId,
        mut document: Document,
    ) -> ModelResult<u64> {
        document.remove(ID_KEY);

        Ok(
            self.get_collection(collection)
                .replace_one(doc! { ID_KEY: id }, document)
                .await
                .map_err(backend_error)?
                .matched_count
        )
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> ModelResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_one(filter)
                .await
                .map_err(backend_error)?
                .deleted_count
        )
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> ModelResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(filter)
                .await
                .map_err(backend_error)?
                .deleted_count
        )
    }

    async fn drop_collection(&self, collection: &str) -> ModelResult<()> {
        self.get_collection(collection)
            .drop()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn create_index(&self, collection: &str, keys: Document) -> ModelResult<String> {
        Ok(
            self.get_collection(collection)
                .create_index(
                    IndexModel::builder()
                    .keys(keys)
                    .build()
                )
                .await
                .map_err(backend_error)?
                .index_name
        )
    }

    async fn drop_index(&self, collection: &str, name: &str) -> ModelResult<()> {
        self.get_collection(collection)
            .drop_index(name)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn drop_indexes(&self, collection: &str) -> ModelResult<()> {
        match self.get_collection(collection).drop_indexes().await {
            Ok(_) => Ok(()),
            Err(e) if is_namespace_not_found(&e) => Ok(()),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn list_index_names(&self, collection: &str) -> ModelResult<Vec<String>> {
        match self.get_collection(collection).list_index_names().await {
            Ok(names) => Ok(names),
            Err(e) if is_namespace_not_found(&e) => {
                debug!("No indexes for missing collection {}", collection);
                Ok(Vec::new())
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn shutdown(self) -> ModelResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builds a [`MongoDbStore`] from a [`StoreConfig`].
///
/// Building parses the connection string, attaches credentials when both a username and a
/// password are configured (authenticating against the target database), and pings the server
/// so that an unreachable store fails here rather than on first use.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    config: StoreConfig,
}

impl MongoDbStoreBuilder {
    pub fn from_config(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    async fn client_options(&self) -> ModelResult<ClientOptions> {
        let uri = self.config.connection_uri();
        let mut client_options = ClientOptions::parse(uri.as_str())
            .await
            .map_err(|e| ModelError::Configuration(e.to_string()))?;

        if let Some(app) = &self.config.app_name {
            client_options.app_name = Some(app.clone());
        }
        if let Some((username, password)) = self.config.login() {
            client_options.credential = Some(
                Credential::builder()
                    .username(username.to_string())
                    .password(password.to_string())
                    .source(self.config.database.clone())
                    .build()
            );
        }

        Ok(client_options)
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> ModelResult<Self::Backend> {
        let client_options = self.client_options().await.inspect_err(|e| {
            error!("Invalid connection settings for {}: {}", self.config.connection_uri(), e)
        })?;

        let store = MongoDbStore::new(
            Client::with_options(client_options)
                .map_err(|e| ModelError::Configuration(e.to_string()))?,
            self.config.database,
        );

        store.ping().await.inspect_err(|e| error!("{}", e))?;
        info!("Connected to database {}", store.database);

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_options_from_host_and_port() {
        let builder = MongoDbStoreBuilder::from_config(
            StoreConfig::new().host("db.internal").port(27018).app_name("people"),
        );

        let options = builder.client_options().await.unwrap();

        assert_eq!(options.hosts.len(), 1);
        assert_eq!(options.hosts[0].to_string(), "db.internal:27018");
        assert_eq!(options.app_name.as_deref(), Some("people"));
        assert!(options.credential.is_none());
    }

    #[tokio::test]
    async fn test_credentials_use_target_database() {
        let builder = MongoDbStoreBuilder::from_config(
            StoreConfig::new().database("people").credentials("ann", "secret"),
        );

        let options = builder.client_options().await.unwrap();
        let credential = options.credential.unwrap();

        assert_eq!(credential.username.as_deref(), Some("ann"));
        assert_eq!(credential.password.as_deref(), Some("secret"));
        assert_eq!(credential.source.as_deref(), Some("people"));
    }

    #[tokio::test]
    async fn test_malformed_uri_is_a_configuration_error() {
        let builder = MongoDbStoreBuilder::from_config(StoreConfig::new().uri("not-a-uri"));

        let err = builder.build().await.unwrap_err();

        assert!(matches!(err, ModelError::Configuration(_)));
    }
}
