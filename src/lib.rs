//! Senvar - Secure environment variables on AWS.
//!
//! Senvar keeps application configuration in AWS Secrets Manager and the
//! SSM Parameter Store behind one async API. Variables are addressed by an
//! application, a stage and a name, and live under the path
//! `/senvar/{app}/{stage}/{name}` in either store.
//!
//! # Features
//!
//! - **One API, two stores**: [`Secret`] and [`Parameter`] share the
//!   [`Variable`] trait; backend quirks stay inside the adapters
//! - **Idempotent writes**: `ensure` and `set` converge on "value present
//!   and tagged" whether or not the variable existed
//! - **Safe deletes**: secrets are recoverable for seven days unless
//!   deleted permanently
//! - **Retries**: transient backend errors are retried with capped
//!   exponential backoff and jitter
//! - **Rotation**: secrets rotate through pluggable handlers, either
//!   compiled in or run as scripts
//! - **Feature Flags**: the AWS SDK and the binary are optional
//!
//! # Quick Start
//!
//! ```
//! use senvar::backends::mock::MockFactory;
//! use senvar::{define_secret, ClientCache, Variable, VariableOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> senvar::Result<()> {
//!     let clients = Arc::new(ClientCache::new(Arc::new(MockFactory::new())));
//!
//!     let options = VariableOptions::new().with_app("shop").with_stage("prod");
//!     let password = define_secret(&clients, "dbPassword", options)?;
//!
//!     password.set("p@ss1").await?;
//!     assert_eq!(password.get().await?, "p@ss1");
//!     assert_eq!(password.full_name(), "/senvar/shop/prod/dbPassword");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `mock` | yes | In-memory stores for tests |
//! | `aws` | no | AWS Secrets Manager and SSM via the AWS SDK |
//! | `cli` | no | The `senvar` binary (implies `aws`) |
//!
//! ```toml
//! [dependencies]
//! senvar = { version = "0.1", features = ["aws"] }
//! ```

pub mod adapters;
pub mod backend;
pub mod backends;
pub mod client;
pub mod config;
pub mod error;
pub mod listing;
pub mod retry;
pub mod rotation;
pub mod validation;
pub mod variable;

pub use client::{ClientCache, ClientFactory};
pub use config::{ConnectionOptions, VariableOptions};
pub use error::{Result, SenvarError};
pub use listing::{list_variables, ListRequest, ListedValue, ListedVariable, Listing};
pub use retry::RetryPolicy;
pub use rotation::{HandlerRegistry, RotationHandler};
pub use variable::{Address, Descriptor, Parameter, Secret, Variable, VariableKind};

use std::sync::Arc;

/// Describes a secret named `name`. No backend call is made.
pub fn define_secret(
    clients: &Arc<ClientCache>,
    name: &str,
    options: VariableOptions,
) -> Result<Secret> {
    Secret::new(name, options, Arc::clone(clients))
}

/// Describes a parameter named `name`. No backend call is made.
pub fn define_parameter(
    clients: &Arc<ClientCache>,
    name: &str,
    options: VariableOptions,
) -> Result<Parameter> {
    Parameter::new(name, options, Arc::clone(clients))
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::backends::mock::MockFactory;

    #[test]
    fn test_define_does_no_io() {
        let factory = Arc::new(MockFactory::new());
        let clients = Arc::new(ClientCache::new(factory.clone()));
        let options = VariableOptions::new().with_app("shop").with_stage("prod");

        let secret = define_secret(&clients, "a", options.clone()).unwrap();
        let parameter = define_parameter(&clients, "b", options).unwrap();

        assert_eq!(secret.kind(), VariableKind::Secret);
        assert_eq!(parameter.kind(), VariableKind::Parameter);
        assert_eq!(factory.secret_stores_built(), 0);
        assert_eq!(factory.parameter_stores_built(), 0);
    }

    #[test]
    fn test_define_rejects_bad_name() {
        let clients = Arc::new(ClientCache::new(Arc::new(MockFactory::new())));
        let options = VariableOptions::new().with_app("shop").with_stage("prod");

        let err = define_secret(&clients, "a/b", options).unwrap_err();
        assert!(matches!(err, SenvarError::Configuration(_)));
    }
}
