//! AWS backends: Secrets Manager and SSM Parameter Store.
//!
//! # Requirements
//!
//! - AWS credentials configured via:
//!   - Environment variables (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`)
//!   - Shared credentials file (`~/.aws/credentials`), selected by profile
//!   - IAM instance role (for EC2/ECS/Lambda)
//!
//! # Example
//!
//! ```no_run
//! use senvar::backends::aws::AwsClientFactory;
//! use senvar::{define_secret, ClientCache, Variable, VariableOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> senvar::Result<()> {
//!     let clients = Arc::new(ClientCache::new(Arc::new(AwsClientFactory::new())));
//!
//!     let secret = define_secret(
//!         &clients,
//!         "dbPassword",
//!         VariableOptions::new().with_app("shop").with_stage("prod"),
//!     )?;
//!     secret.set("p@ss1").await?;
//!
//!     Ok(())
//! }
//! ```

mod factory;
mod parameters;
mod secrets;

pub use factory::AwsClientFactory;
pub use parameters::SsmParameterStore;
pub use secrets::SecretsManagerStore;

use crate::SenvarError;

/// Maps an AWS error code onto the crate taxonomy.
///
/// `exists` and `missing` list the service-specific codes for duplicate
/// creation and missing resources; everything else is a backend error.
pub(crate) fn classify(
    name: &str,
    code: Option<&str>,
    message: String,
    exists: &[&str],
    missing: &[&str],
) -> SenvarError {
    match code {
        Some(code) if exists.contains(&code) => SenvarError::AlreadyExists(name.to_string()),
        Some(code) if missing.contains(&code) => SenvarError::NotFound(name.to_string()),
        _ => SenvarError::Backend(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let exists = &["ResourceExistsException"];
        let missing = &["ResourceNotFoundException"];

        let err = classify("s", Some("ResourceExistsException"), String::new(), exists, missing);
        assert!(err.is_already_exists());

        let err = classify("s", Some("ResourceNotFoundException"), String::new(), exists, missing);
        assert!(err.is_not_found());

        let err = classify("s", Some("ThrottlingException"), "slow down".into(), exists, missing);
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "backend error: slow down");

        let err = classify("s", None, "dispatch failure".into(), exists, missing);
        assert!(err.is_transient());
    }
}
