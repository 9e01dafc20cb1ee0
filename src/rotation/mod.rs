//! Rotation handlers and the registries that find them.
//!
//! A [`RotationHandler`] turns the current value of a secret (or `None`
//! when it has never been set) into its replacement. Handlers are looked up
//! per variable through a [`HandlerRegistry`]: either a compiled-in
//! [`StaticRegistry`] or a [`ScriptRegistry`] that runs executables from a
//! rotation directory.
//!
//! # Example
//!
//! ```
//! use senvar::rotation::{HandlerRegistry, RotationHandler, StaticRegistry};
//! use senvar::Address;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> senvar::Result<()> {
//!     let registry =
//!         StaticRegistry::new().with_handler("apiKey", |current: Option<String>| async move {
//!             Ok::<_, senvar::SenvarError>(format!("{}+1", current.unwrap_or_default()))
//!         });
//!
//!     let address = Address::new("shop", "prod", "apiKey")?;
//!     if let Some(handler) = registry.load_handler(&address).await? {
//!         assert_eq!(handler.rotate(Some("v".into())).await?, "v+1");
//!     }
//!     Ok(())
//! }
//! ```

mod script;

pub use script::{ScriptHandler, ScriptRegistry, DEFAULT_ROTATION_DIR};

use crate::{Address, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Computes the next value of a secret from its current one.
#[async_trait]
pub trait RotationHandler: Send + Sync {
    async fn rotate(&self, current: Option<String>) -> Result<String>;
}

#[async_trait]
impl<F, Fut> RotationHandler for F
where
    F: Fn(Option<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    async fn rotate(&self, current: Option<String>) -> Result<String> {
        self(current).await
    }
}

/// Finds the rotation handler for a variable, if one is registered.
#[async_trait]
pub trait HandlerRegistry: Send + Sync {
    async fn load_handler(&self, address: &Address) -> Result<Option<Arc<dyn RotationHandler>>>;
}

/// Handlers registered in code, keyed by fully-qualified name or short name.
///
/// A fully-qualified key wins over a short one for the same variable.
#[derive(Default, Clone)]
pub struct StaticRegistry {
    handlers: HashMap<String, Arc<dyn RotationHandler>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `key` (a full name like
    /// `/senvar/app/stage/name`, or just `name`).
    pub fn with_handler(
        mut self,
        key: impl Into<String>,
        handler: impl RotationHandler + 'static,
    ) -> Self {
        self.register(key, handler);
        self
    }

    pub fn register(&mut self, key: impl Into<String>, handler: impl RotationHandler + 'static) {
        self.handlers.insert(key.into(), Arc::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl HandlerRegistry for StaticRegistry {
    async fn load_handler(&self, address: &Address) -> Result<Option<Arc<dyn RotationHandler>>> {
        Ok(self
            .handlers
            .get(&address.full_name())
            .or_else(|| self.handlers.get(&address.name))
            .cloned())
    }
}
