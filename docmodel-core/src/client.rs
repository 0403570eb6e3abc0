//! Lazily initialised store handle.
//!
//! A [`StoreClient`] holds a backend builder and opens the store on first use. Concurrent
//! first calls are serialised and exactly one backend is built; every later call shares it.
//! A failed initialisation is kept too, so the store is not hammered with reconnect attempts:
//! every call reports the same [`ModelError::Configuration`] until [`StoreClient::reset`].
//!
//! ```ignore
//! use docmodel::client::StoreClient;
//! use docmodel::mongodb::MongoDbStoreBuilder;
//!
//! let client = StoreClient::new(MongoDbStoreBuilder::from_config(config));
//!
//! let gateway = client.gateway().await?;
//! let count = gateway.repository::<Person>().count().await?;
//! ```

use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::{
    backend::StoreBackendBuilder,
    error::{ModelError, ModelResult},
    gateway::Gateway,
};

pub struct StoreClient<F: StoreBackendBuilder> {
    builder: F,
    gateway: OnceCell<Result<Gateway<F::Backend>, String>>,
}

impl<F> StoreClient<F>
where
    F: StoreBackendBuilder + Clone + Send + Sync,
{
    pub fn new(builder: F) -> Self {
        Self {
            builder,
            gateway: OnceCell::new(),
        }
    }

    /// Returns the gateway, opening the store on the first call.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Configuration`] if the store could not be opened, now or on an
    /// earlier call.
    pub async fn gateway(&self) -> ModelResult<&Gateway<F::Backend>> {
        let gateway = self
            .gateway
            .get_or_init(|| async {
                match self.builder.clone().build().await {
                    Ok(backend) => {
                        info!("Store initialised: {:?}", backend);
                        Ok(Gateway::new(backend))
                    }
                    Err(e) => {
                        error!("Store initialisation failed: {}", e);
                        Err(match e {
                            ModelError::Configuration(message) => message,
                            other => other.to_string(),
                        })
                    }
                }
            })
            .await;

        gateway
            .as_ref()
            .map_err(|e| ModelError::Configuration(e.clone()))
    }

    /// Whether an initialisation attempt has completed, successfully or not.
    pub fn is_initialized(&self) -> bool {
        self.gateway.initialized()
    }

    /// Forgets the current handle or failure; the next call initialises again.
    ///
    /// The previous backend is dropped without being shut down.
    pub fn reset(&mut self) {
        self.gateway.take();
    }

    /// Shuts the backend down if it was initialised successfully.
    pub async fn shutdown(self) -> ModelResult<()> {
        match self.gateway.into_inner() {
            Some(Ok(gateway)) => gateway.shutdown().await,
            _ => Ok(()),
        }
    }
}

impl<F> std::fmt::Debug for StoreClient<F>
where
    F: StoreBackendBuilder + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("builder", &self.builder)
            .field("initialized", &self.gateway.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entity::tests::Person, testing::CountingBuilder};

    #[tokio::test]
    async fn test_gateway_is_built_once() {
        let builder = CountingBuilder::new(false);
        let client = StoreClient::new(builder.clone());
        assert!(!client.is_initialized());

        client.gateway().await.unwrap();
        client.gateway().await.unwrap();

        assert!(client.is_initialized());
        assert_eq!(builder.build_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_build() {
        let builder = CountingBuilder::new(false);
        let client = StoreClient::new(builder.clone());

        let (a, b, c) = tokio::join!(client.gateway(), client.gateway(), client.gateway());

        let a = a.unwrap();
        assert!(std::ptr::eq(a, b.unwrap()));
        assert!(std::ptr::eq(a, c.unwrap()));
        assert_eq!(builder.build_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_kept_until_reset() {
        let builder = CountingBuilder::new(true);
        let mut client = StoreClient::new(builder.clone());

        for _ in 0..3 {
            let err = client.gateway().await.unwrap_err();
            assert!(matches!(err, ModelError::Configuration(ref m) if m == "connection refused"));
        }
        assert_eq!(builder.build_count(), 1);

        client.reset();
        assert!(!client.is_initialized());
        assert!(client.gateway().await.is_err());
        assert_eq!(builder.build_count(), 2);
    }

    #[tokio::test]
    async fn test_configuration_error_is_not_wrapped_twice() {
        let client = StoreClient::new(CountingBuilder::new(true));

        let err = client.gateway().await.unwrap_err();

        assert_eq!(err.to_string(), "Configuration error: connection refused");
    }

    #[tokio::test]
    async fn test_gateway_is_usable() {
        let client = StoreClient::new(CountingBuilder::new(false));

        let gateway = client.gateway().await.unwrap();
        assert_eq!(gateway.repository::<Person>().count().await.unwrap(), 0);

        client.shutdown().await.unwrap();
    }
}
