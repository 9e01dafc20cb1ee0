//! Senvar CLI - manage secrets and parameters for an app/stage.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use senvar::backends::aws::AwsClientFactory;
use senvar::listing::{list_variables, ListRequest, ListedVariable, Listing};
use senvar::rotation::{HandlerRegistry, RotationHandler, ScriptRegistry, DEFAULT_ROTATION_DIR};
use senvar::{
    Address, ClientCache, ConnectionOptions, Descriptor, Parameter, Secret, SenvarError, Variable,
    VariableKind, VariableOptions,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "senvar")]
#[command(about = "Manage secrets and parameters in AWS for an app and stage")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Globals {
    /// Application name (defaults to SENVAR_APP, then SST_APP)
    #[arg(long, global = true)]
    app: Option<String>,

    /// Stage name (defaults to SENVAR_STAGE, then SST_STAGE)
    #[arg(long, global = true)]
    stage: Option<String>,

    /// AWS region (defaults to AWS_REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    /// AWS credential profile (defaults to AWS_PROFILE)
    #[arg(long, global = true)]
    profile: Option<String>,
}

impl Globals {
    fn options(&self) -> VariableOptions {
        VariableOptions {
            app: self.app.clone(),
            stage: self.stage.clone(),
            region: self.region.clone(),
            profile: self.profile.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage Secrets Manager secrets
    #[command(subcommand)]
    Secret(SecretCommand),

    /// Manage SSM parameters
    #[command(subcommand)]
    Parameter(ParameterCommand),

    /// List parameters and secrets for the app/stage
    List {
        /// Name prefix (defaults to /senvar/{app}/{stage}/)
        prefix: Option<String>,

        /// Show secret values
        #[arg(long)]
        force_show: bool,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SecretCommand {
    /// Create the secret with a placeholder value if it does not exist
    Define { name: String },

    /// Print the secret value
    Get { name: String },

    /// Set the secret value (read from stdin when omitted)
    Set { name: String, value: Option<String> },

    /// Replace the value through a rotation handler
    Rotate {
        name: String,

        /// Run the rotation script for this secret instead of reading stdin
        #[arg(long)]
        auto: bool,

        /// Directory holding rotation scripts
        #[arg(long, default_value = DEFAULT_ROTATION_DIR)]
        dir: PathBuf,
    },

    /// Delete the secret (recoverable for 7 days unless --permanent)
    Delete {
        name: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,

        /// Delete immediately without a recovery window
        #[arg(long)]
        permanent: bool,
    },

    /// List secrets
    List {
        prefix: Option<String>,

        /// Show secret values
        #[arg(long)]
        force_show: bool,
    },
}

#[derive(Subcommand)]
enum ParameterCommand {
    /// Create the parameter with a placeholder value if it does not exist
    Define {
        name: String,

        /// Store as a plaintext String instead of a SecureString
        #[arg(long)]
        plaintext: bool,
    },

    /// Print the parameter value
    Get { name: String },

    /// Set the parameter value (read from stdin when omitted)
    Set {
        name: String,
        value: Option<String>,

        /// Store as a plaintext String instead of a SecureString
        #[arg(long)]
        plaintext: bool,
    },

    /// Delete the parameter
    Delete {
        name: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// List parameters
    List { prefix: Option<String> },
}

/// Resolves a command-line identifier to a variable descriptor.
///
/// `/senvar/app/stage/name` is fully qualified. Anything else is a plain
/// name under the resolved app/stage; when app/stage cannot be resolved the
/// legacy `app-stage-name` form is tried.
fn descriptor(identifier: &str, globals: &Globals) -> senvar::Result<Descriptor> {
    let options = globals.options();
    if Address::is_fully_qualified(identifier) {
        return Descriptor::from_name(identifier, &options);
    }

    match options.resolve() {
        Ok(_) => Descriptor::new(identifier, &options),
        Err(unresolved) => match Address::parse(identifier) {
            Ok(_) => Descriptor::from_name(identifier, &options),
            Err(_) => Err(unresolved),
        },
    }
}

/// Reads one line from stdin, prompting on stderr when interactive.
///
/// An empty line selects `default` when there is one.
async fn read_value(prompt: &str, default: Option<&str>) -> senvar::Result<String> {
    if std::io::stdin().is_terminal() {
        let prompt = match default {
            Some(default) => format!("{} [{}]: ", prompt, default),
            None => format!("{}: ", prompt),
        };
        let mut stderr = tokio::io::stderr();
        stderr.write_all(prompt.as_bytes()).await?;
        stderr.flush().await?;
    }

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    value_from_line(&line, default)
}

fn value_from_line(line: &str, default: Option<&str>) -> senvar::Result<String> {
    match (line.trim_end_matches(['\r', '\n']), default) {
        ("", Some(default)) => Ok(default.to_string()),
        ("", None) => Err(SenvarError::EmptyValue("input".to_string())),
        (value, _) => Ok(value.to_string()),
    }
}

async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let mut stderr = tokio::io::stderr();
    stderr
        .write_all(format!("{} [y/N] ", prompt).as_bytes())
        .await?;
    stderr.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn value_or_prompt(value: Option<String>, full_name: &str) -> anyhow::Result<String> {
    match value {
        Some(value) => Ok(value),
        None => Ok(read_value(&format!("Enter value for {}", full_name), None).await?),
    }
}

async fn delete_variable(
    variable: &dyn Variable,
    force: bool,
    permanent: bool,
) -> anyhow::Result<()> {
    let full_name = variable.full_name();
    if !force && !confirm(&format!("Really delete {}?", full_name)).await? {
        println!("Cancelled.");
        return Ok(());
    }
    variable.delete(permanent).await?;
    println!("Deleted {}", full_name);
    Ok(())
}

async fn rotate_secret(secret: &Secret, auto: bool, dir: PathBuf) -> anyhow::Result<()> {
    let full_name = secret.full_name();
    let handler: Arc<dyn RotationHandler> = if auto {
        let registry = ScriptRegistry::new(dir);
        match registry.load_handler(secret.descriptor().address()).await? {
            Some(handler) => handler,
            None => bail!(
                "No rotation handler found for {}. Create an executable at {} or {}",
                full_name,
                registry.dir().join(full_name.trim_start_matches('/')).display(),
                registry.dir().join(secret.descriptor().name()).display()
            ),
        }
    } else {
        let prompt = format!("Enter new value for {}", full_name);
        Arc::new(move |current: Option<String>| {
            let prompt = prompt.clone();
            async move { read_value(&prompt, current.as_deref()).await }
        })
    };

    secret
        .rotate(handler.as_ref(), &ConnectionOptions::default())
        .await?;
    println!("Rotated {}", full_name);
    Ok(())
}

fn print_section(title: &str, variables: &[ListedVariable]) {
    println!("{}", title);
    for variable in variables {
        println!(" - {}: {}", variable.full_name, variable.value);
    }
}

fn print_listing(listing: &Listing, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(listing)?);
        return Ok(());
    }

    if listing.is_empty() {
        println!("Nothing found.");
        println!("Filtered by prefix: {}", listing.prefix);
        return Ok(());
    }
    if !listing.parameters.is_empty() {
        print_section("Parameters", &listing.parameters);
    }
    if !listing.secrets.is_empty() {
        if !listing.parameters.is_empty() {
            println!();
        }
        print_section("Secrets", &listing.secrets);
    }
    Ok(())
}

async fn run_secret(
    command: SecretCommand,
    globals: &Globals,
    clients: &Arc<ClientCache>,
) -> anyhow::Result<()> {
    let secret = |name: &str| -> senvar::Result<Secret> {
        Ok(Secret::with_descriptor(descriptor(name, globals)?, Arc::clone(clients)))
    };

    match command {
        SecretCommand::Define { name } => {
            let secret = secret(&name)?;
            secret.ensure().await?;
            println!("Ensured secret {}", secret.full_name());
        }
        SecretCommand::Get { name } => {
            println!("{}", secret(&name)?.get().await?);
        }
        SecretCommand::Set { name, value } => {
            let secret = secret(&name)?;
            let value = value_or_prompt(value, &secret.full_name()).await?;
            secret.set(&value).await?;
            println!("Updated {}", secret.full_name());
        }
        SecretCommand::Rotate { name, auto, dir } => {
            rotate_secret(&secret(&name)?, auto, dir).await?;
        }
        SecretCommand::Delete {
            name,
            force,
            permanent,
        } => {
            delete_variable(&secret(&name)?, force, permanent).await?;
        }
        SecretCommand::List { prefix, force_show } => {
            let request = ListRequest {
                kind: Some(VariableKind::Secret),
                prefix,
                reveal_secrets: force_show,
            };
            let listing = list_variables(clients, &globals.options(), &request).await?;
            print_listing(&listing, false)?;
        }
    }
    Ok(())
}

async fn run_parameter(
    command: ParameterCommand,
    globals: &Globals,
    clients: &Arc<ClientCache>,
) -> anyhow::Result<()> {
    let parameter = |name: &str| -> senvar::Result<Parameter> {
        Ok(Parameter::with_descriptor(descriptor(name, globals)?, Arc::clone(clients)))
    };
    let defaults = ConnectionOptions::default();

    match command {
        ParameterCommand::Define { name, plaintext } => {
            let parameter = parameter(&name)?;
            parameter.ensure_secure(!plaintext, &defaults).await?;
            println!("Ensured parameter {}", parameter.full_name());
        }
        ParameterCommand::Get { name } => {
            println!("{}", parameter(&name)?.get().await?);
        }
        ParameterCommand::Set {
            name,
            value,
            plaintext,
        } => {
            let parameter = parameter(&name)?;
            let value = value_or_prompt(value, &parameter.full_name()).await?;
            parameter.set_secure(&value, !plaintext, &defaults).await?;
            println!("Updated {}", parameter.full_name());
        }
        ParameterCommand::Delete { name, force } => {
            delete_variable(&parameter(&name)?, force, false).await?;
        }
        ParameterCommand::List { prefix } => {
            let request = ListRequest {
                kind: Some(VariableKind::Parameter),
                prefix,
                reveal_secrets: false,
            };
            let listing = list_variables(clients, &globals.options(), &request).await?;
            print_listing(&listing, false)?;
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let clients = Arc::new(ClientCache::new(Arc::new(AwsClientFactory::new())));

    match cli.command {
        Commands::Secret(command) => run_secret(command, &cli.globals, &clients).await,
        Commands::Parameter(command) => run_parameter(command, &cli.globals, &clients).await,
        Commands::List {
            prefix,
            force_show,
            json,
        } => {
            let request = ListRequest {
                kind: None,
                prefix,
                reveal_secrets: force_show,
            };
            let listing = list_variables(&clients, &cli.globals.options(), &request)
                .await
                .context("listing variables")?;
            print_listing(&listing, json)
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
