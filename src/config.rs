//! Addressing and connection options.
//!
//! Options are resolved in a fixed order: an explicit value wins, then the
//! process environment, otherwise the value stays unset (region/profile) or
//! resolution fails (app/stage).

use crate::backend::Tags;
use crate::{Result, SenvarError};

/// Environment variables consulted for the application name, in order.
pub const APP_ENV_VARS: &[&str] = &["SENVAR_APP", "SST_APP"];

/// Environment variables consulted for the stage, in order.
pub const STAGE_ENV_VARS: &[&str] = &["SENVAR_STAGE", "SST_STAGE"];

/// Environment variable consulted for the default AWS region.
pub const REGION_ENV_VAR: &str = "AWS_REGION";

/// Environment variable consulted for the default AWS credential profile.
pub const PROFILE_ENV_VAR: &str = "AWS_PROFILE";

/// Reads a non-empty variable from the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn first_of(keys: &[&str], env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    keys.iter().find_map(|key| env(key))
}

/// Region/profile pair used to pick a backend client.
///
/// ```
/// use senvar::ConnectionOptions;
///
/// let own = ConnectionOptions::new().with_region("eu-west-1").with_profile("ops");
/// let call = ConnectionOptions::new().with_region("us-east-1");
///
/// let resolved = call.or(&own);
/// assert_eq!(resolved.region.as_deref(), Some("us-east-1"));
/// assert_eq!(resolved.profile.as_deref(), Some("ops"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConnectionOptions {
    /// AWS region (e.g., "us-west-2")
    pub region: Option<String>,
    /// Named credential profile
    pub profile: Option<String>,
}

impl ConnectionOptions {
    /// Creates options with neither region nor profile set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the named credential profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Fills each unset field from `fallback`.
    pub fn or(&self, fallback: &ConnectionOptions) -> ConnectionOptions {
        ConnectionOptions {
            region: self.region.clone().or_else(|| fallback.region.clone()),
            profile: self.profile.clone().or_else(|| fallback.profile.clone()),
        }
    }
}

/// Options accepted when defining a variable.
///
/// # Example
///
/// ```
/// use senvar::VariableOptions;
///
/// let options = VariableOptions::new()
///     .with_app("shop")
///     .with_stage("prod")
///     .with_region("us-west-2")
///     .with_tag("team", "payments");
///
/// assert_eq!(options.app.as_deref(), Some("shop"));
/// assert_eq!(options.tags.get("team").map(String::as_str), Some("payments"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableOptions {
    /// Application name (falls back to `SENVAR_APP`, then `SST_APP`)
    pub app: Option<String>,
    /// Stage name (falls back to `SENVAR_STAGE`, then `SST_STAGE`)
    pub stage: Option<String>,
    /// Default region for this variable (falls back to `AWS_REGION`)
    pub region: Option<String>,
    /// Default credential profile (falls back to `AWS_PROFILE`)
    pub profile: Option<String>,
    /// Extra tags attached next to `app` and `stage`
    pub tags: Tags,
}

impl VariableOptions {
    /// Creates empty options; everything falls back to the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application name.
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Sets the stage (e.g., "prod", "pr-42").
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the default region for this variable.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the default credential profile for this variable.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Adds a tag attached next to the `app` and `stage` tags.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Connection options as given, without environment fallback.
    pub fn connection(&self) -> ConnectionOptions {
        ConnectionOptions {
            region: self.region.clone(),
            profile: self.profile.clone(),
        }
    }

    /// Resolves every field against the process environment.
    pub fn resolve(&self) -> Result<ResolvedOptions> {
        self.resolve_with(&process_env)
    }

    /// Resolves every field against the given environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SenvarError::Configuration`] when app or stage is neither
    /// given explicitly nor present in the environment.
    pub fn resolve_with(&self, env: &dyn Fn(&str) -> Option<String>) -> Result<ResolvedOptions> {
        let app = self
            .app
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| first_of(APP_ENV_VARS, env));
        let stage = self
            .stage
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| first_of(STAGE_ENV_VARS, env));

        let mut missing = Vec::new();
        if app.is_none() {
            missing.push("app (set --app, SENVAR_APP or SST_APP)");
        }
        if stage.is_none() {
            missing.push("stage (set --stage, SENVAR_STAGE or SST_STAGE)");
        }
        let (Some(app), Some(stage)) = (app, stage) else {
            return Err(SenvarError::Configuration(format!(
                "missing {}",
                missing.join(" and ")
            )));
        };

        Ok(ResolvedOptions {
            app,
            stage,
            connection: ConnectionOptions {
                region: self.region.clone().or_else(|| env(REGION_ENV_VAR)),
                profile: self.profile.clone().or_else(|| env(PROFILE_ENV_VAR)),
            },
            tags: self.tags.clone(),
        })
    }
}

/// [`VariableOptions`] after environment fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub app: String,
    pub stage: String,
    pub connection: ConnectionOptions,
    pub tags: Tags,
}
