//! Variables stored in the secret store.

use super::{Descriptor, Variable, VariableKind};
use crate::client::ClientCache;
use crate::rotation::RotationHandler;
use crate::{ConnectionOptions, Result, VariableOptions};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// A variable stored in the secret store.
///
/// Writes create the secret on first use with the variable's tags, then
/// put the value as a new version. Deletion is recoverable for seven days
/// unless `permanent` is set.
#[derive(Clone)]
pub struct Secret {
    descriptor: Descriptor,
    clients: Arc<ClientCache>,
}

impl Secret {
    /// Describes `name` under the app/stage resolved from `options`.
    pub fn new(name: &str, options: VariableOptions, clients: Arc<ClientCache>) -> Result<Self> {
        Ok(Self {
            descriptor: Descriptor::new(name, &options)?,
            clients,
        })
    }

    /// Describes a secret from its fully-qualified or legacy name.
    pub fn from_name(
        identifier: &str,
        options: VariableOptions,
        clients: Arc<ClientCache>,
    ) -> Result<Self> {
        Ok(Self {
            descriptor: Descriptor::from_name(identifier, &options)?,
            clients,
        })
    }

    /// Builds a secret around an already-resolved descriptor.
    pub fn with_descriptor(descriptor: Descriptor, clients: Arc<ClientCache>) -> Self {
        Self { descriptor, clients }
    }

    /// Replaces the value with one computed by `handler`.
    ///
    /// The handler receives the current value, or `None` when the secret
    /// does not exist yet. The new value is written with the same
    /// create-then-put sequence as [`Variable::set`] and returned.
    pub async fn rotate(
        &self,
        handler: &dyn RotationHandler,
        options: &ConnectionOptions,
    ) -> Result<String> {
        let current = match self.get_with(options).await {
            Ok(value) => Some(value),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let next = handler.rotate(current).await?;
        self.set_with(&next, options).await?;

        info!(name = %self.full_name(), "Rotated secret");
        Ok(next)
    }
}

#[async_trait]
impl Variable for Secret {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn kind(&self) -> VariableKind {
        VariableKind::Secret
    }

    async fn ensure_with(&self, options: &ConnectionOptions) -> Result<()> {
        let adapter = self
            .clients
            .secrets(&self.descriptor.connection_for(options))
            .await?;
        adapter
            .ensure_secret(&self.full_name(), self.descriptor.tags())
            .await?;

        info!(name = %self.full_name(), "Ensured secret");
        Ok(())
    }

    async fn get_with(&self, options: &ConnectionOptions) -> Result<String> {
        let adapter = self
            .clients
            .secrets(&self.descriptor.connection_for(options))
            .await?;
        adapter.get_secret_value(&self.full_name()).await
    }

    async fn set_with(&self, value: &str, options: &ConnectionOptions) -> Result<()> {
        let adapter = self
            .clients
            .secrets(&self.descriptor.connection_for(options))
            .await?;
        let name = self.full_name();

        adapter.ensure_secret(&name, self.descriptor.tags()).await?;
        adapter.set_secret_value(&name, value).await?;

        info!(name = %name, "Set secret value");
        Ok(())
    }

    async fn delete_with(&self, options: &ConnectionOptions, permanent: bool) -> Result<()> {
        let adapter = self
            .clients
            .secrets(&self.descriptor.connection_for(options))
            .await?;
        adapter.delete_secret(&self.full_name(), permanent).await?;

        info!(name = %self.full_name(), permanent, "Deleted secret");
        Ok(())
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::adapters::PLACEHOLDER_VALUE;
    use crate::backend::DeletionMode;
    use crate::backends::mock::{MockCall, MockFactory};
    use crate::retry::RetryPolicy;
    use crate::SenvarError;
    use std::time::Duration;

    fn setup() -> (Arc<MockFactory>, Arc<ClientCache>) {
        let factory = Arc::new(MockFactory::new());
        let clients = ClientCache::new(factory.clone())
            .with_defaults(ConnectionOptions::default())
            .with_retry_policy(
                RetryPolicy::default()
                    .with_base_delay(Duration::from_millis(1))
                    .with_max_delay(Duration::from_millis(2)),
            );
        (factory, Arc::new(clients))
    }

    fn options() -> VariableOptions {
        VariableOptions::new().with_app("shop").with_stage("prod")
    }

    #[tokio::test]
    async fn test_set_creates_then_puts() {
        let (factory, clients) = setup();
        let secret = Secret::new("dbPassword", options(), clients).unwrap();

        secret.set("p@ss1").await.unwrap();
        assert_eq!(secret.get().await.unwrap(), "p@ss1");

        let store = factory.secrets();
        let name = "/senvar/shop/prod/dbPassword";
        assert_eq!(store.tags_of(name).await.unwrap()["app"], "shop");
        assert!(matches!(
            &store.calls().await[..2],
            [MockCall::CreateSecret { .. }, MockCall::PutSecretValue { .. }]
        ));
    }

    #[tokio::test]
    async fn test_set_keeps_existing_secret() {
        let (factory, clients) = setup();
        let secret = Secret::new("apiKey", options(), clients).unwrap();

        let store = factory.secrets();
        let name = "/senvar/shop/prod/apiKey";

        secret.set("one").await.unwrap();
        let first = store.version_of(name).await;
        secret.set("two").await.unwrap();

        assert_eq!(secret.get().await.unwrap(), "two");
        assert_ne!(store.version_of(name).await, first);
        let creates = store
            .calls()
            .await
            .into_iter()
            .filter(|call| matches!(call, MockCall::CreateSecret { .. }))
            .count();
        assert_eq!(creates, 2);
    }

    #[tokio::test]
    async fn test_ensure_writes_placeholder_once() {
        let (_factory, clients) = setup();
        let secret = Secret::new("apiKey", options(), clients).unwrap();

        secret.ensure().await.unwrap();
        assert_eq!(secret.get().await.unwrap(), PLACEHOLDER_VALUE);

        secret.set("real").await.unwrap();
        secret.ensure().await.unwrap();
        assert_eq!(secret.get().await.unwrap(), "real");
    }

    #[tokio::test]
    async fn test_rotate_without_current_value() {
        let (_factory, clients) = setup();
        let secret = Secret::new("token", options(), clients).unwrap();

        let handler = |current: Option<String>| async move {
            assert!(current.is_none());
            Ok::<_, SenvarError>("fresh".to_string())
        };
        let next = secret
            .rotate(&handler, &ConnectionOptions::default())
            .await
            .unwrap();

        assert_eq!(next, "fresh");
        assert_eq!(secret.get().await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_rotate_passes_current_value() {
        let (_factory, clients) = setup();
        let secret = Secret::new("token", options(), clients).unwrap();
        secret.set("v1").await.unwrap();

        let handler = |current: Option<String>| async move {
            Ok::<_, SenvarError>(format!("{}-next", current.unwrap_or_default()))
        };
        let next = secret
            .rotate(&handler, &ConnectionOptions::default())
            .await
            .unwrap();

        assert_eq!(next, "v1-next");
        assert_eq!(secret.get().await.unwrap(), "v1-next");
    }

    #[tokio::test]
    async fn test_rotate_handler_failure_leaves_value() {
        let (_factory, clients) = setup();
        let secret = Secret::new("token", options(), clients).unwrap();
        secret.set("v1").await.unwrap();

        let handler = |_: Option<String>| async move {
            Err::<String, _>(SenvarError::CommandFailed("generator exited 1".to_string()))
        };
        let err = secret
            .rotate(&handler, &ConnectionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SenvarError::CommandFailed(_)));
        assert_eq!(secret.get().await.unwrap(), "v1");
    }

    #[tokio::test]
    async fn test_delete_modes() {
        let (factory, clients) = setup();
        let soft = Secret::new("soft", options(), clients.clone()).unwrap();
        let hard = Secret::new("hard", options(), clients).unwrap();
        soft.set("x").await.unwrap();
        hard.set("y").await.unwrap();

        soft.delete(false).await.unwrap();
        hard.delete(true).await.unwrap();

        let deletes: Vec<_> = factory
            .secrets()
            .calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                MockCall::DeleteSecret { name, mode } => Some((name, mode)),
                _ => None,
            })
            .collect();
        assert_eq!(
            deletes,
            vec![
                (
                    "/senvar/shop/prod/soft".to_string(),
                    DeletionMode::Recoverable { window_days: 7 }
                ),
                ("/senvar/shop/prod/hard".to_string(), DeletionMode::Immediate),
            ]
        );
    }

    #[tokio::test]
    async fn test_from_name_legacy() {
        let (_factory, clients) = setup();
        let secret =
            Secret::from_name("shop-prod-db-url", VariableOptions::new(), clients).unwrap();
        assert_eq!(secret.full_name(), "/senvar/shop/prod/db-url");
    }
}
