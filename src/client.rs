//! Backend client cache.
//!
//! [`ClientCache`] is the one piece of shared mutable state: a map from
//! `(service, region, profile)` to a store handle. Entries are created lazily
//! on first use by a [`ClientFactory`] and never evicted. Creation is
//! serialized per service, so concurrent first use of the same key yields a
//! single handle.

use crate::adapters::{ParameterAdapter, SecretAdapter};
use crate::backend::{ParameterStore, SecretStore};
use crate::config::{process_env, PROFILE_ENV_VAR, REGION_ENV_VAR};
use crate::retry::RetryPolicy;
use crate::{ConnectionOptions, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Fallback key component when neither the call nor the environment
/// names a region or profile.
const DEFAULT_KEY: &str = "default";

/// Remote service a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Versioned secret store
    SecretsManager,
    /// Hierarchical parameter store
    ParameterStore,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SecretsManager => write!(f, "sm"),
            Self::ParameterStore => write!(f, "ssm"),
        }
    }
}

/// Cache key for one client handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub service: Service,
    pub region: String,
    pub profile: String,
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.service, self.region, self.profile)
    }
}

/// Builds store handles for a connection target.
///
/// Construction may resolve credentials, so the cache calls it at most once
/// per key.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn secret_store(&self, target: &ConnectionOptions) -> Result<Arc<dyn SecretStore>>;

    async fn parameter_store(&self, target: &ConnectionOptions) -> Result<Arc<dyn ParameterStore>>;
}

/// Process-lifetime registry of backend clients.
///
/// Owned by the application entry point and shared behind an [`Arc`].
///
/// # Example
///
/// ```
/// # #[cfg(feature = "mock")]
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> senvar::Result<()> {
/// use senvar::backends::mock::MockFactory;
/// use senvar::{ClientCache, ConnectionOptions};
/// use std::sync::Arc;
///
/// let clients = ClientCache::new(Arc::new(MockFactory::new()));
/// let target = ConnectionOptions::new().with_region("us-east-1");
///
/// let first = clients.secret_store(&target).await?;
/// let second = clients.secret_store(&target).await?;
/// assert!(Arc::ptr_eq(&first, &second));
/// # Ok(())
/// # }
/// # #[cfg(not(feature = "mock"))]
/// # fn main() {}
/// ```
pub struct ClientCache {
    factory: Arc<dyn ClientFactory>,
    retry: RetryPolicy,
    defaults: ConnectionOptions,
    secret_stores: Mutex<HashMap<ClientKey, Arc<dyn SecretStore>>>,
    parameter_stores: Mutex<HashMap<ClientKey, Arc<dyn ParameterStore>>>,
}

impl ClientCache {
    /// Creates a cache whose default region/profile come from `AWS_REGION`
    /// and `AWS_PROFILE`.
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            retry: RetryPolicy::default(),
            defaults: ConnectionOptions {
                region: process_env(REGION_ENV_VAR),
                profile: process_env(PROFILE_ENV_VAR),
            },
            secret_stores: Mutex::new(HashMap::new()),
            parameter_stores: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the environment-derived defaults.
    pub fn with_defaults(mut self, defaults: ConnectionOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sets the retry policy handed to every adapter.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Retry policy handed to every adapter.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Applies the cache defaults to unset fields of `options`.
    pub fn target(&self, options: &ConnectionOptions) -> ConnectionOptions {
        options.or(&self.defaults)
    }

    /// Computes the cache key for a service and connection target.
    pub fn key(&self, service: Service, options: &ConnectionOptions) -> ClientKey {
        let target = self.target(options);
        ClientKey {
            service,
            region: target.region.unwrap_or_else(|| DEFAULT_KEY.to_string()),
            profile: target.profile.unwrap_or_else(|| DEFAULT_KEY.to_string()),
        }
    }

    /// Returns the secret-store handle for `options`, creating it on first use.
    pub async fn secret_store(&self, options: &ConnectionOptions) -> Result<Arc<dyn SecretStore>> {
        let key = self.key(Service::SecretsManager, options);
        let mut stores = self.secret_stores.lock().await;
        if let Some(store) = stores.get(&key) {
            return Ok(Arc::clone(store));
        }

        debug!(key = %key, "Creating secret store client");
        let store = self.factory.secret_store(&self.target(options)).await?;
        stores.insert(key, Arc::clone(&store));
        Ok(store)
    }

    /// Returns the parameter-store handle for `options`, creating it on first use.
    pub async fn parameter_store(
        &self,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn ParameterStore>> {
        let key = self.key(Service::ParameterStore, options);
        let mut stores = self.parameter_stores.lock().await;
        if let Some(store) = stores.get(&key) {
            return Ok(Arc::clone(store));
        }

        debug!(key = %key, "Creating parameter store client");
        let store = self.factory.parameter_store(&self.target(options)).await?;
        stores.insert(key, Arc::clone(&store));
        Ok(store)
    }

    /// Secret-store adapter bound to the cached handle for `options`.
    pub async fn secrets(&self, options: &ConnectionOptions) -> Result<SecretAdapter> {
        Ok(SecretAdapter::new(self.secret_store(options).await?, self.retry))
    }

    /// Parameter-store adapter bound to the cached handle for `options`.
    pub async fn parameters(&self, options: &ConnectionOptions) -> Result<ParameterAdapter> {
        Ok(ParameterAdapter::new(self.parameter_store(options).await?, self.retry))
    }

    /// Number of cached handles across both services.
    pub async fn len(&self) -> usize {
        self.secret_stores.lock().await.len() + self.parameter_stores.lock().await.len()
    }

    /// True when no handle has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
