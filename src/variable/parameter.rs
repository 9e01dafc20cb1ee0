//! Variables stored in the parameter store, encrypted unless asked otherwise.

use super::{Descriptor, Variable, VariableKind};
use crate::adapters::{PutOptions, PLACEHOLDER_VALUE};
use crate::client::ClientCache;
use crate::{ConnectionOptions, Result, VariableOptions};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// A variable stored in the parameter store.
///
/// Values are written as encrypted `SecureString`s unless a plaintext
/// write is requested with [`Parameter::set_plain`]. Deletion is always
/// immediate; the parameter store has no recovery window.
#[derive(Clone)]
pub struct Parameter {
    descriptor: Descriptor,
    clients: Arc<ClientCache>,
}

impl Parameter {
    /// Describes `name` under the app/stage resolved from `options`.
    pub fn new(name: &str, options: VariableOptions, clients: Arc<ClientCache>) -> Result<Self> {
        Ok(Self {
            descriptor: Descriptor::new(name, &options)?,
            clients,
        })
    }

    /// Describes a parameter from its fully-qualified or legacy name.
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

    pub fn with_descriptor(descriptor: Descriptor, clients: Arc<ClientCache>) -> Self {
        Self { descriptor, clients }
    }

    /// Creates the parameter with a placeholder if it does not exist.
    pub async fn ensure_secure(&self, secure: bool, options: &ConnectionOptions) -> Result<()> {
        let adapter = self
            .clients
            .parameters(&self.descriptor.connection_for(options))
            .await?;
        let name = self.full_name();
        let create = PutOptions::create(self.descriptor.tags().clone()).with_secure(secure);

        match adapter.put_parameter(&name, PLACEHOLDER_VALUE, &create).await {
            Ok(()) => {
                info!(name = %name, secure, "Ensured parameter");
                Ok(())
            }
            Err(e) if e.is_already_exists() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Writes `value` as a create, falling back to an overwrite when the
    /// parameter already exists. Either way the tag set ends up attached.
    ///
    /// On the overwrite path the tags are written by a second call after the
    /// value. If that call fails the value is updated and the tags are stale.
    pub async fn set_secure(
        &self,
        value: &str,
        secure: bool,
        options: &ConnectionOptions,
    ) -> Result<()> {
        let adapter = self
            .clients
            .parameters(&self.descriptor.connection_for(options))
            .await?;
        let name = self.full_name();
        let tags = self.descriptor.tags().clone();

        match adapter
            .put_parameter(&name, value, &PutOptions::create(tags.clone()).with_secure(secure))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {
                debug!(name = %name, "Parameter exists, overwriting");
                adapter
                    .put_parameter(&name, value, &PutOptions::overwrite(tags).with_secure(secure))
                    .await?;
            }
            Err(e) => return Err(e),
        }

        info!(name = %name, secure, "Set parameter value");
        Ok(())
    }

    /// Writes `value` as a plaintext `String` parameter.
    pub async fn set_plain(&self, value: &str, options: &ConnectionOptions) -> Result<()> {
        self.set_secure(value, false, options).await
    }
}

#[async_trait]
impl Variable for Parameter {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn kind(&self) -> VariableKind {
        VariableKind::Parameter
    }

    async fn ensure_with(&self, options: &ConnectionOptions) -> Result<()> {
        self.ensure_secure(true, options).await
    }

    async fn get_with(&self, options: &ConnectionOptions) -> Result<String> {
        let adapter = self
            .clients
            .parameters(&self.descriptor.connection_for(options))
            .await?;
        adapter.get_parameter(&self.full_name()).await
    }

    async fn set_with(&self, value: &str, options: &ConnectionOptions) -> Result<()> {
        self.set_secure(value, true, options).await
    }

    async fn delete_with(&self, options: &ConnectionOptions, _permanent: bool) -> Result<()> {
        let adapter = self
            .clients
            .parameters(&self.descriptor.connection_for(options))
            .await?;
        adapter.delete_parameter(&self.full_name()).await?;

        info!(name = %self.full_name(), "Deleted parameter");
        Ok(())
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
