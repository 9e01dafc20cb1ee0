//! Listing variables of an app/stage together with their values.

use crate::backend::Tags;
use crate::client::ClientCache;
use crate::config::process_env;
use crate::variable::{Address, VariableKind};
use crate::{ConnectionOptions, Result, VariableOptions};
use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

/// What to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Restrict to one kind; `None` lists both.
    pub kind: Option<VariableKind>,
    /// Name prefix; defaults to `/senvar/{app}/{stage}/`.
    pub prefix: Option<String>,
    /// Show secret values instead of hiding them.
    pub reveal_secrets: bool,
}

impl ListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: VariableKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn reveal_secrets(mut self, reveal: bool) -> Self {
        self.reveal_secrets = reveal;
        self
    }

    fn wants(&self, kind: VariableKind) -> bool {
        self.kind.map_or(true, |k| k == kind)
    }
}

/// Prefix, tag filter and connection a listing runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListScope {
    pub prefix: String,
    /// Exact-match tags applied to secret listings.
    pub secret_tags: Tags,
    pub connection: ConnectionOptions,
}

impl ListScope {
    /// Resolves the scope against the given environment lookup.
    ///
    /// App and stage are only required when no explicit prefix is given;
    /// when they resolve, secrets are additionally filtered by their
    /// `app` and `stage` tags.
    pub fn resolve_with(
        options: &VariableOptions,
        prefix: Option<&str>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let resolved = match (options.resolve_with(env), prefix) {
            (Ok(resolved), _) => resolved,
            (Err(_), Some(prefix)) => {
                return Ok(Self {
                    prefix: prefix.to_string(),
                    secret_tags: Tags::new(),
                    connection: options.connection(),
                })
            }
            (Err(e), None) => return Err(e),
        };

        let prefix = prefix
            .map(str::to_string)
            .unwrap_or_else(|| Address::stage_prefix(&resolved.app, &resolved.stage));
        let mut secret_tags = Tags::new();
        secret_tags.insert("app".to_string(), resolved.app);
        secret_tags.insert("stage".to_string(), resolved.stage);

        Ok(Self {
            prefix,
            secret_tags,
            connection: resolved.connection,
        })
    }
}

/// A listed variable's value as presented to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum ListedValue {
    Shown(String),
    Hidden,
    Unavailable,
}

impl std::fmt::Display for ListedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shown(value) => f.write_str(value),
            Self::Hidden => f.write_str("****"),
            Self::Unavailable => f.write_str("(error fetching value)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedVariable {
    pub full_name: String,
    pub kind: VariableKind,
    pub value: ListedValue,
}

/// Result of [`list_variables`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub prefix: String,
    pub parameters: Vec<ListedVariable>,
    pub secrets: Vec<ListedVariable>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.secrets.is_empty()
    }
}

/// Lists variables for the app/stage in `options`, resolved against the
/// process environment.
pub async fn list_variables(
    clients: &ClientCache,
    options: &VariableOptions,
    request: &ListRequest,
) -> Result<Listing> {
    let scope = ListScope::resolve_with(options, request.prefix.as_deref(), &process_env)?;
    list_in_scope(clients, &scope, request).await
}

/// Lists variables in `scope`.
///
/// Both name listings run concurrently, then every value is fetched
/// concurrently. A value that cannot be fetched is reported as
/// [`ListedValue::Unavailable`] and does not fail the listing.
pub async fn list_in_scope(
    clients: &ClientCache,
    scope: &ListScope,
    request: &ListRequest,
) -> Result<Listing> {
    let (parameter_names, secret_names) = tokio::try_join!(
        async {
            if request.wants(VariableKind::Parameter) {
                parameter_names(clients, scope).await
            } else {
                Ok(Vec::new())
            }
        },
        async {
            if request.wants(VariableKind::Secret) {
                secret_names(clients, scope).await
            } else {
                Ok(Vec::new())
            }
        },
    )?;

    let parameters = if parameter_names.is_empty() {
        Vec::new()
    } else {
        let adapter = clients.parameters(&scope.connection).await?;
        join_all(parameter_names.into_iter().map(|name| {
            let adapter = adapter.clone();
            async move {
                let value = match adapter.get_parameter(&name).await {
                    Ok(value) => ListedValue::Shown(value),
                    Err(e) => {
                        debug!(name = %name, error = %e, "Could not fetch parameter value");
                        ListedValue::Unavailable
                    }
                };
                ListedVariable {
                    full_name: name,
                    kind: VariableKind::Parameter,
                    value,
                }
            }
        }))
        .await
    };

    let secrets = if secret_names.is_empty() {
        Vec::new()
    } else {
        let adapter = clients.secrets(&scope.connection).await?;
        let reveal = request.reveal_secrets;
        join_all(secret_names.into_iter().map(|name| {
            let adapter = adapter.clone();
            async move {
                let value = match adapter.get_secret_value(&name).await {
                    Ok(value) if reveal => ListedValue::Shown(value),
                    Ok(_) => ListedValue::Hidden,
                    Err(e) => {
                        debug!(name = %name, error = %e, "Could not fetch secret value");
                        ListedValue::Unavailable
                    }
                };
                ListedVariable {
                    full_name: name,
                    kind: VariableKind::Secret,
                    value,
                }
            }
        }))
        .await
    };

    Ok(Listing {
        prefix: scope.prefix.clone(),
        parameters,
        secrets,
    })
}

async fn parameter_names(clients: &ClientCache, scope: &ListScope) -> Result<Vec<String>> {
    let prefix = (!scope.prefix.is_empty()).then_some(scope.prefix.as_str());
    let mut names = clients
        .parameters(&scope.connection)
        .await?
        .list_parameters(prefix, &Tags::new())
        .await?;
    names.sort();
    Ok(names)
}

async fn secret_names(clients: &ClientCache, scope: &ListScope) -> Result<Vec<String>> {
    let prefix = (!scope.prefix.is_empty()).then_some(scope.prefix.as_str());
    let mut names = clients
        .secrets(&scope.connection)
        .await?
        .list_secrets(prefix, &scope.secret_tags)
        .await?;
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SenvarError;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_scope_defaults_to_stage_prefix() {
        let options = VariableOptions::new().with_app("shop").with_stage("prod");
        let scope = ListScope::resolve_with(&options, None, &no_env).unwrap();

        assert_eq!(scope.prefix, "/senvar/shop/prod/");
        assert_eq!(scope.secret_tags.len(), 2);
        assert_eq!(scope.secret_tags["app"], "shop");
    }

    #[test]
    fn test_scope_with_prefix_only() {
        let scope = ListScope::resolve_with(&VariableOptions::new(), Some("/senvar/"), &no_env)
            .unwrap();
        assert_eq!(scope.prefix, "/senvar/");
        assert!(scope.secret_tags.is_empty());

        let err = ListScope::resolve_with(&VariableOptions::new(), None, &no_env).unwrap_err();
        assert!(matches!(err, SenvarError::Configuration(_)));
    }

    #[test]
    fn test_listed_value_display() {
        assert_eq!(ListedValue::Shown("v".into()).to_string(), "v");
        assert_eq!(ListedValue::Hidden.to_string(), "****");
        assert_eq!(ListedValue::Unavailable.to_string(), "(error fetching value)");
    }

    #[test]
    fn test_listed_value_json() {
        let json = serde_json::to_value(ListedVariable {
            full_name: "/senvar/a/b/c".to_string(),
            kind: VariableKind::Secret,
            value: ListedValue::Hidden,
        })
        .unwrap();
        assert_eq!(json["kind"], "secret");
        assert_eq!(json["value"]["state"], "hidden");
    }
}

#[cfg(all(test, feature = "mock"))]
mod mock_tests {
    use super::*;
    use crate::backend::ParameterType;
    use crate::backends::mock::{MockCall, MockFactory};
    use crate::retry::RetryPolicy;
    use std::sync::Arc;

    fn tags(app: &str, stage: &str) -> Tags {
        [("app", app), ("stage", stage)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn seeded() -> (Arc<MockFactory>, ClientCache) {
        let factory = Arc::new(MockFactory::new());
        let secrets = factory.secrets();
        secrets.insert("/senvar/shop/prod/dbPassword", "hunter2", tags("shop", "prod")).await;
        secrets.insert("/senvar/shop/dev/dbPassword", "dev", tags("shop", "dev")).await;
        secrets.insert_without_value("/senvar/shop/prod/broken").await;

        let parameters = factory.parameters();
        parameters
            .insert("/senvar/shop/prod/apiUrl", "https://a", ParameterType::String, Tags::new())
            .await;
        parameters
            .insert("/senvar/shop/dev/apiUrl", "https://dev", ParameterType::String, Tags::new())
            .await;

        let clients = ClientCache::new(factory.clone())
            .with_defaults(ConnectionOptions::default())
            .with_retry_policy(RetryPolicy::none());
        (factory, clients)
    }

    fn options() -> VariableOptions {
        VariableOptions::new().with_app("shop").with_stage("prod")
    }

    #[tokio::test]
    async fn test_lists_both_kinds() {
        let (_factory, clients) = seeded().await;
        let listing = list_variables(&clients, &options(), &ListRequest::new())
            .await
            .unwrap();

        assert_eq!(listing.prefix, "/senvar/shop/prod/");
        assert_eq!(
            listing.parameters,
            vec![ListedVariable {
                full_name: "/senvar/shop/prod/apiUrl".to_string(),
                kind: VariableKind::Parameter,
                value: ListedValue::Shown("https://a".to_string()),
            }]
        );
        assert_eq!(
            listing.secrets,
            vec![ListedVariable {
                full_name: "/senvar/shop/prod/dbPassword".to_string(),
                kind: VariableKind::Secret,
                value: ListedValue::Hidden,
            }]
        );
    }

    #[tokio::test]
    async fn test_reveal_and_unavailable() {
        let (_factory, clients) = seeded().await;

        // No tag filter, so the untagged secret without a value is listed.
        let scope = ListScope {
            prefix: "/senvar/shop/prod/".to_string(),
            secret_tags: Tags::new(),
            connection: ConnectionOptions::default(),
        };
        let request = ListRequest::new()
            .with_kind(VariableKind::Secret)
            .reveal_secrets(true);
        let listing = list_in_scope(&clients, &scope, &request).await.unwrap();

        assert!(listing.parameters.is_empty());
        let values: Vec<(&str, &ListedValue)> = listing
            .secrets
            .iter()
            .map(|v| (v.full_name.as_str(), &v.value))
            .collect();
        assert_eq!(
            values,
            vec![
                ("/senvar/shop/prod/broken", &ListedValue::Unavailable),
                ("/senvar/shop/prod/dbPassword", &ListedValue::Shown("hunter2".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_parameters_only() {
        let (factory, clients) = seeded().await;
        let request = ListRequest::new().with_kind(VariableKind::Parameter);
        let listing = list_variables(&clients, &options(), &request).await.unwrap();

        assert_eq!(listing.parameters.len(), 1);
        assert!(listing.secrets.is_empty());
        assert!(factory.secrets().calls().await.is_empty());
        assert!(factory.parameters().calls().await.contains(&MockCall::DescribeParameters {
            filters: vec![crate::backend::ParameterFilter::NameBeginsWith(
                "/senvar/shop/prod/".to_string()
            )],
        }));
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let (factory, clients) = seeded().await;
        factory.parameters().fail_next(1).await;

        let err = list_variables(&clients, &options(), &ListRequest::new())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
