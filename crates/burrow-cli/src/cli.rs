//! Command-line definitions and their translation into a [`Plan`].

use anyhow::{bail, Context, Result};
use burrow_core::models::{FLAG_DETACH, FLAG_INSECURE, FLAG_VERBOSE};
use burrow_core::{Alias, AliasStore, Configuration, JsonAliasStore};
use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "burrow")]
#[command(about = "Start, inspect and stop tunnel instances", version)]
pub struct Cli {
    /// Registry home directory (defaults to ~/.burrow)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new instance
    Start {
        #[command(subcommand)]
        target: StartTarget,
    },
    /// Save a tunnel configuration under a name
    Add {
        #[command(subcommand)]
        target: AddTarget,
    },
    /// Delete a saved alias
    Delete {
        #[command(subcommand)]
        target: DeleteTarget,
    },
    /// Show aliases or running instances
    Show {
        #[command(subcommand)]
        target: ShowTarget,
    },
    /// Stop a detached instance by id
    Stop { id: String },
}

#[derive(Subcommand, Debug)]
pub enum StartTarget {
    /// Forward local ports to destinations
    Local(TunnelArgs),
    /// Expose destinations through remote ports
    Remote(TunnelArgs),
    /// Start from a saved alias
    Alias(AliasStartArgs),
}

#[derive(Subcommand, Debug)]
pub enum AddTarget {
    /// Save an alias
    Alias {
        name: String,
        #[arg(value_enum)]
        tunnel_type: TunnelType,
        #[command(flatten)]
        tunnel: TunnelArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeleteTarget {
    /// Delete an alias
    Alias { name: String },
}

#[derive(Subcommand, Debug)]
pub enum ShowTarget {
    /// Show one alias, or every alias
    Alias { name: Option<String> },
    /// Show one running instance, or every reachable one
    Instances { id: Option<String> },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TunnelType {
    Local,
    Remote,
}

impl TunnelType {
    fn as_str(self) -> &'static str {
        match self {
            TunnelType::Local => "local",
            TunnelType::Remote => "remote",
        }
    }
}

#[derive(Args, Debug)]
pub struct TunnelArgs {
    /// Instance id (generated when detaching without one)
    #[arg(long, default_value = "")]
    pub id: String,

    /// Source address, repeatable ([user@]host[:port])
    #[arg(short = 'S', long = "source")]
    pub source: Vec<String>,

    /// Destination address, repeatable ([user@]host:port)
    #[arg(short = 'd', long = "destination")]
    pub destination: Vec<String>,

    /// Server address ([user@]host[:port])
    #[arg(short = 's', long, default_value = "")]
    pub server: String,

    /// Private key path
    #[arg(short = 'i', long, default_value = "")]
    pub key: String,

    /// Increase log verbosity
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Skip host key validation
    #[arg(long)]
    pub insecure: bool,

    /// Run the instance in the background
    #[arg(short = 'x', long)]
    pub detach: bool,

    /// Serve the control RPC endpoint
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub rpc: bool,

    /// Listen address of the control RPC endpoint
    #[arg(long, default_value = "127.0.0.1:0")]
    pub rpc_address: String,

    /// Keep-alive interval
    #[arg(short = 'k', long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub keep_alive_interval: Duration,

    /// Connection attempts before giving up
    #[arg(short = 'R', long, default_value_t = 3)]
    pub connection_retries: u32,

    /// Wait between connection attempts
    #[arg(short = 'w', long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub wait_and_retry: Duration,

    /// Connection timeout
    #[arg(short = 't', long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// SSH agent socket path
    #[arg(short = 'A', long, default_value = "")]
    pub ssh_agent: String,

    /// SSH config file path
    #[arg(short = 'c', long, default_value = "")]
    pub ssh_config: String,
}

#[derive(Args, Debug)]
pub struct AliasStartArgs {
    pub name: String,

    /// Increase log verbosity
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Skip host key validation
    #[arg(long)]
    pub insecure: bool,

    /// Run the instance in the background
    #[arg(short = 'x', long)]
    pub detach: bool,
}

impl TunnelArgs {
    pub fn into_configuration(self, tunnel_type: TunnelType) -> Result<Configuration> {
        let mut config = Configuration {
            id: self.id,
            tunnel_type: tunnel_type.as_str().to_string(),
            verbose: self.verbose,
            insecure: self.insecure,
            detach: self.detach,
            server: self
                .server
                .parse()
                .with_context(|| format!("invalid --server {:?}", self.server))?,
            key: self.key,
            keep_alive_interval: self.keep_alive_interval,
            connection_retries: self.connection_retries,
            wait_and_retry: self.wait_and_retry,
            ssh_agent: self.ssh_agent,
            timeout: self.timeout,
            ssh_config: self.ssh_config,
            rpc: self.rpc,
            rpc_address: self.rpc_address,
            ..Configuration::default()
        };
        for source in &self.source {
            config
                .source
                .push_str(source)
                .with_context(|| format!("invalid --source {:?}", source))?;
        }
        for destination in &self.destination {
            config
                .destination
                .push_str(destination)
                .with_context(|| format!("invalid --destination {:?}", destination))?;
        }
        Ok(config)
    }
}

/// A fully resolved command, ready to run.
#[derive(Debug)]
pub enum Plan {
    Start(Configuration),
    AddAlias(Alias),
    DeleteAlias(String),
    ShowAlias(Option<String>),
    ShowInstances(Option<String>),
    Stop(String),
}

impl Plan {
    /// Whether debug logging was requested, directly or through an alias.
    pub fn verbose(&self) -> bool {
        matches!(self, Plan::Start(config) if config.verbose)
    }
}

/// Resolve the parsed command line. `matches` is consulted to tell flags the
/// user typed apart from defaults.
pub fn resolve(command: Command, matches: &ArgMatches, aliases: &JsonAliasStore) -> Result<Plan> {
    let plan = match command {
        Command::Start { target } => match target {
            StartTarget::Local(args) => Plan::Start(args.into_configuration(TunnelType::Local)?),
            StartTarget::Remote(args) => Plan::Start(args.into_configuration(TunnelType::Remote)?),
            StartTarget::Alias(args) => {
                let alias = aliases.require(&args.name)?;
                let mut config = Configuration {
                    verbose: args.verbose,
                    insecure: args.insecure,
                    detach: args.detach,
                    ..Configuration::default()
                };
                let given = given_flags(matches, &["start", "alias"]);
                config
                    .merge(&alias, &given)
                    .with_context(|| format!("alias {} could not be applied", alias.name))?;
                Plan::Start(config)
            }
        },
        Command::Add {
            target: AddTarget::Alias {
                name,
                tunnel_type,
                tunnel,
            },
        } => {
            if name.trim().is_empty() {
                bail!("alias name must not be empty");
            }
            Plan::AddAlias(tunnel.into_configuration(tunnel_type)?.to_alias(name))
        }
        Command::Delete {
            target: DeleteTarget::Alias { name },
        } => Plan::DeleteAlias(name),
        Command::Show { target } => match target {
            ShowTarget::Alias { name } => Plan::ShowAlias(name),
            ShowTarget::Instances { id } => Plan::ShowInstances(id),
        },
        Command::Stop { id } => Plan::Stop(id),
    };
    Ok(plan)
}

/// Override flags the user typed on the subcommand at `path`.
fn given_flags(matches: &ArgMatches, path: &[&str]) -> Vec<&'static str> {
    let mut current = matches;
    for name in path {
        match current.subcommand_matches(name) {
            Some(sub) => current = sub,
            None => return Vec::new(),
        }
    }

    [FLAG_VERBOSE, FLAG_INSECURE, FLAG_DETACH]
        .into_iter()
        .filter(|flag| current.value_source(flag) == Some(ValueSource::CommandLine))
        .collect()
}
