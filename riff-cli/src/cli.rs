use clap::{Args as ClapArgs, Parser, Subcommand};
use riff::resources::RiffKind;
use std::{path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[command(name = "riff", about = "Manage riff functions, applications and streams")]
pub(crate) struct Args {
    /// Namespace to operate in. Defaults to the kubeconfig namespace.
    #[arg(long, short = 'n', global = true, env = "RIFF_NAMESPACE")]
    pub(crate) namespace: Option<String>,
    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub(crate) no_color: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Check the installation and your access to riff resources
    Doctor(Doctor),
    /// Applications built from source
    Application {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Functions built from source
    Function {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Request handlers
    Handler {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Message streams
    Stream {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Stream processors
    Processor {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Stream providers
    Provider {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Deployers
    Deployer {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Configurers
    Configurer {
        #[command(subcommand)]
        action: ResourceAction,
    },
}

impl Command {
    /// Kind addressed by a resource command; `None` for doctor
    pub(crate) fn resource(&self) -> Option<(RiffKind, &ResourceAction)> {
        let res = match self {
            Command::Doctor(_) => return None,
            Command::Application { action } => (RiffKind::Application, action),
            Command::Function { action } => (RiffKind::Function, action),
            Command::Handler { action } => (RiffKind::Handler, action),
            Command::Stream { action } => (RiffKind::Stream, action),
            Command::Processor { action } => (RiffKind::Processor, action),
            Command::Provider { action } => (RiffKind::Provider, action),
            Command::Deployer { action } => (RiffKind::Deployer, action),
            Command::Configurer { action } => (RiffKind::Configurer, action),
        };
        Some(res)
    }
}

#[derive(ClapArgs, Debug)]
pub(crate) struct Doctor {
    /// Only check that the custom resource definitions are deployed
    #[arg(long)]
    pub(crate) crds: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ResourceAction {
    /// List resources
    List {
        /// List resources in all namespaces
        #[arg(long)]
        all_namespaces: bool,
    },
    /// Create a resource from a manifest
    Create(Create),
    /// Show readiness of a resource
    Status(Named),
    /// Follow logs of a resource until interrupted
    Tail(Named),
    /// Delete a resource and wait until it is gone
    Delete(Named),
}

#[derive(ClapArgs, Debug)]
pub(crate) struct Create {
    /// YAML manifest describing the resource
    #[arg(long, short = 'f')]
    pub(crate) file: PathBuf,
    /// Watch logs until the resource becomes ready
    #[arg(long)]
    pub(crate) tail: bool,
    /// Duration to wait for the resource to become ready when tailing, e.g. `5m`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) wait_timeout: Option<Duration>,
    /// Print the resource instead of creating it
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Server-side apply the manifest with this field manager instead of creating it
    #[arg(long)]
    pub(crate) field_manager: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub(crate) struct Named {
    /// Name of the resource
    pub(crate) name: String,
}

/// Checks that can be made before talking to the cluster
pub(crate) trait Validate {
    fn validate(&self) -> anyhow::Result<()>;
}

impl Validate for Create {
    fn validate(&self) -> anyhow::Result<()> {
        if self.wait_timeout.is_some() && !self.tail {
            anyhow::bail!("--wait-timeout requires --tail");
        }
        if self.dry_run && self.tail {
            anyhow::bail!("--dry-run and --tail cannot be used together");
        }
        if let Some(manager) = &self.field_manager {
            if manager.is_empty() {
                anyhow::bail!("--field-manager must not be empty");
            }
        }
        Ok(())
    }
}

impl Validate for Named {
    fn validate(&self) -> anyhow::Result<()> {
        validate_name(&self.name)
    }
}

impl Validate for ResourceAction {
    fn validate(&self) -> anyhow::Result<()> {
        match self {
            ResourceAction::List { .. } => Ok(()),
            ResourceAction::Create(create) => create.validate(),
            ResourceAction::Status(named)
            | ResourceAction::Tail(named)
            | ResourceAction::Delete(named) => named.validate(),
        }
    }
}

impl Validate for Args {
    fn validate(&self) -> anyhow::Result<()> {
        if let Some(ns) = &self.namespace {
            validate_name(ns).map_err(|err| anyhow::anyhow!("invalid namespace: {}", err))?;
        }
        match self.command.resource() {
            Some((_, action)) => action.validate(),
            None => Ok(()),
        }
    }
}

/// Names must be DNS-1123 labels
fn validate_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() || name.len() > 63 {
        anyhow::bail!("name '{}' must be 1 to 63 characters long", name);
    }
    let valid_chars = name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
    if !valid_chars || name.starts_with('-') || name.ends_with('-') {
        anyhow::bail!(
            "name '{}' must consist of lower case alphanumeric characters or '-', and start and end with an alphanumeric character",
            name
        );
    }
    Ok(())
}
