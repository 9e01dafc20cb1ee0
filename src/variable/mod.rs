//! Variables addressed by `(app, stage, name)`.
//!
//! A variable is a stateless descriptor: constructing one performs no I/O.
//! Its fully-qualified name is `/senvar/{app}/{stage}/{name}`; the legacy
//! flat form `{app}-{stage}-{name}` is accepted when parsing.

mod parameter;
mod secret;

pub use parameter::Parameter;
pub use secret::Secret;

use crate::backend::Tags;
use crate::validation::validate_segment;
use crate::{ConnectionOptions, Result, SenvarError, VariableOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Root segment of every fully-qualified name.
pub const ROOT: &str = "senvar";

/// The `(app, stage, name)` triple identifying a variable.
///
/// # Example
///
/// ```
/// use senvar::Address;
///
/// let address = Address::new("shop", "prod", "dbPassword").unwrap();
/// assert_eq!(address.full_name(), "/senvar/shop/prod/dbPassword");
///
/// assert_eq!(Address::parse("/senvar/shop/prod/dbPassword").unwrap(), address);
///
/// let legacy = Address::parse("shop-prod-db-password").unwrap();
/// assert_eq!(legacy.name, "db-password");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub app: String,
    pub stage: String,
    pub name: String,
}

impl Address {
    /// Builds an address from validated segments.
    pub fn new(
        app: impl Into<String>,
        stage: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let address = Self {
            app: app.into(),
            stage: stage.into(),
            name: name.into(),
        };
        validate_segment("app", &address.app)?;
        validate_segment("stage", &address.stage)?;
        validate_segment("name", &address.name)?;
        Ok(address)
    }

    /// The path-style name used as the backend key.
    pub fn full_name(&self) -> String {
        format!("/{}/{}/{}/{}", ROOT, self.app, self.stage, self.name)
    }

    /// Prefix shared by every variable of an app/stage.
    pub fn stage_prefix(app: &str, stage: &str) -> String {
        format!("/{}/{}/{}/", ROOT, app, stage)
    }

    /// True when `identifier` uses the path form.
    pub fn is_fully_qualified(identifier: &str) -> bool {
        identifier.starts_with(&format!("/{}/", ROOT))
    }

    /// Parses either `/senvar/app/stage/name` or legacy `app-stage-name`.
    ///
    /// # Errors
    ///
    /// Returns [`SenvarError::Configuration`] on a wrong segment count or an
    /// empty segment.
    pub fn parse(identifier: &str) -> Result<Self> {
        if Self::is_fully_qualified(identifier) {
            let segments: Vec<&str> = identifier[1..].split('/').collect();
            match segments.as_slice() {
                [root, app, stage, name] if *root == ROOT => Self::new(*app, *stage, *name)
                    .map_err(|e| malformed(identifier, "/senvar/app/stage/name", e)),
                _ => Err(SenvarError::Configuration(format!(
                    "\"{}\" must follow /senvar/app/stage/name format",
                    identifier
                ))),
            }
        } else {
            Self::parse_legacy(identifier)
        }
    }

    fn parse_legacy(identifier: &str) -> Result<Self> {
        let mut parts = identifier.splitn(3, '-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(app), Some(stage), Some(name)) => Self::new(app, stage, name)
                .map_err(|e| malformed(identifier, "/senvar/app/stage/name or app-stage-name", e)),
            _ => Err(SenvarError::Configuration(format!(
                "\"{}\" must follow /senvar/app/stage/name or app-stage-name format",
                identifier
            ))),
        }
    }
}

fn malformed(identifier: &str, format: &str, err: SenvarError) -> SenvarError {
    SenvarError::Configuration(format!(
        "\"{}\" must follow {} format ({})",
        identifier,
        format,
        match err {
            SenvarError::Configuration(reason) => reason,
            other => other.to_string(),
        }
    ))
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Which backend a variable lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Secret,
    Parameter,
}

impl std::fmt::Display for VariableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Secret => write!(f, "secret"),
            Self::Parameter => write!(f, "parameter"),
        }
    }
}

/// Everything a variable knows about itself: address, default connection
/// and the tag set written to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    address: Address,
    connection: ConnectionOptions,
    tags: Tags,
}

impl Descriptor {
    /// Resolves `options` against the process environment.
    pub fn new(name: &str, options: &VariableOptions) -> Result<Self> {
        Self::with_env(name, options, &crate::config::process_env)
    }

    /// Resolves `options` against the given environment lookup.
    pub fn with_env(
        name: &str,
        options: &VariableOptions,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(SenvarError::Configuration("variable name is required".to_string()));
        }
        let resolved = options.resolve_with(env)?;
        let address = Address::new(resolved.app, resolved.stage, name)?;

        let mut tags = Tags::new();
        tags.insert("app".to_string(), address.app.clone());
        tags.insert("stage".to_string(), address.stage.clone());
        tags.extend(resolved.tags);

        Ok(Self {
            address,
            connection: resolved.connection,
            tags,
        })
    }

    /// Parses a fully-qualified or legacy identifier; its app and stage
    /// replace those in `options`.
    pub fn from_name(identifier: &str, options: &VariableOptions) -> Result<Self> {
        let address = Address::parse(identifier)?;
        let options = options
            .clone()
            .with_app(address.app)
            .with_stage(address.stage);
        Self::new(&address.name, &options)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.address.name
    }

    pub fn app(&self) -> &str {
        &self.address.app
    }

    pub fn stage(&self) -> &str {
        &self.address.stage
    }

    pub fn full_name(&self) -> String {
        self.address.full_name()
    }

    /// Tags written at the backend: `app`, `stage`, plus custom entries.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Default connection captured at construction.
    pub fn connection(&self) -> &ConnectionOptions {
        &self.connection
    }

    /// Per-call connection: `overrides` first, then this variable's defaults.
    pub fn connection_for(&self, overrides: &ConnectionOptions) -> ConnectionOptions {
        overrides.or(&self.connection)
    }
}

/// Operations shared by secrets and parameters.
///
/// Every method takes per-call connection overrides; pass
/// `&ConnectionOptions::default()` to use the variable's own defaults.
#[async_trait]
pub trait Variable: Send + Sync {
    fn descriptor(&self) -> &Descriptor;

    fn kind(&self) -> VariableKind;

    fn full_name(&self) -> String {
        self.descriptor().full_name()
    }

    /// Creates the variable with a placeholder value if it does not exist.
    /// An existing value is left untouched.
    async fn ensure_with(&self, options: &ConnectionOptions) -> Result<()>;

    async fn get_with(&self, options: &ConnectionOptions) -> Result<String>;

    /// Creates or updates the value, ending with the full tag set attached.
    async fn set_with(&self, value: &str, options: &ConnectionOptions) -> Result<()>;

    /// Deletes the variable. `permanent` only matters for secrets, which
    /// are otherwise kept recoverable for a week.
    async fn delete_with(&self, options: &ConnectionOptions, permanent: bool) -> Result<()>;

    async fn ensure(&self) -> Result<()> {
        self.ensure_with(&ConnectionOptions::default()).await
    }

    async fn get(&self) -> Result<String> {
        self.get_with(&ConnectionOptions::default()).await
    }

    async fn set(&self, value: &str) -> Result<()> {
        self.set_with(value, &ConnectionOptions::default()).await
    }

    async fn delete(&self, permanent: bool) -> Result<()> {
        self.delete_with(&ConnectionOptions::default(), permanent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_full_name_round_trip() {
        for (app, stage, name) in [
            ("shop", "prod", "dbPassword"),
            ("a", "b", "c"),
            ("my-app", "pr-42", "api.key_v2"),
        ] {
            let address = Address::new(app, stage, name).unwrap();
            assert_eq!(Address::parse(&address.full_name()).unwrap(), address);
        }
    }

    #[test]
    fn test_long_name_round_trip() {
        let name = "a".repeat(256);
        let address = Address::new("shop", "prod", &name).unwrap();

        assert_eq!(address.full_name().len(), 273);
        assert_eq!(Address::parse(&address.full_name()).unwrap(), address);
    }

    #[test]
    fn test_legacy_name_keeps_hyphens() {
        let address = Address::parse("app-stage-a-b-c").unwrap();
        assert_eq!(address.app, "app");
        assert_eq!(address.stage, "stage");
        assert_eq!(address.name, "a-b-c");
    }

    #[test]
    fn test_malformed_names() {
        for identifier in [
            "/senvar/shop/prod",
            "/senvar/shop/prod/a/b",
            "/senvar//prod/a",
            "/senvar/shop/prod/",
            "shop-prod",
            "shop--name",
            "-prod-name",
            "shop-prod-",
            "plain",
        ] {
            let err = Address::parse(identifier).unwrap_err();
            assert!(
                matches!(err, SenvarError::Configuration(_)),
                "expected configuration error for {}",
                identifier
            );
        }
    }

    #[test]
    fn test_descriptor_tags() {
        let options = VariableOptions::new()
            .with_app("shop")
            .with_stage("prod")
            .with_tag("team", "payments");
        let descriptor = Descriptor::with_env("dbPassword", &options, &no_env).unwrap();

        assert_eq!(descriptor.full_name(), "/senvar/shop/prod/dbPassword");
        assert_eq!(descriptor.tags().len(), 3);
        assert_eq!(descriptor.tags()["app"], "shop");
        assert_eq!(descriptor.tags()["stage"], "prod");
        assert_eq!(descriptor.tags()["team"], "payments");
    }

    #[test]
    fn test_descriptor_requires_app_and_stage() {
        let err = Descriptor::with_env("x", &VariableOptions::new(), &no_env).unwrap_err();
        assert!(matches!(err, SenvarError::Configuration(_)));

        let err = Descriptor::with_env(
            "",
            &VariableOptions::new().with_app("a").with_stage("b"),
            &no_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("name is required"));
    }

    #[test]
    fn test_connection_resolution() {
        let env = |key: &str| (key == "AWS_PROFILE").then(|| "env-profile".to_string());
        let options = VariableOptions::new()
            .with_app("a")
            .with_stage("b")
            .with_region("eu-west-1");
        let descriptor = Descriptor::with_env("c", &options, &env).unwrap();

        assert_eq!(descriptor.connection().region.as_deref(), Some("eu-west-1"));
        assert_eq!(descriptor.connection().profile.as_deref(), Some("env-profile"));

        let call = descriptor.connection_for(&ConnectionOptions::new().with_region("us-east-1"));
        assert_eq!(call.region.as_deref(), Some("us-east-1"));
        assert_eq!(call.profile.as_deref(), Some("env-profile"));
    }
}
