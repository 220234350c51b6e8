use std::path::PathBuf;

use clap::{Parser, Subcommand};
use guidance_authz::authz::audit::forbidden_reasons;
use guidance_authz::authz::builder::AbilityFactory;
use guidance_authz::authz::{loader, Principal};
use guidance_authz::errors::ServiceError;
use guidance_authz::{settings, web};
use miette::Result;
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "guidance-authz",
    version,
    about = "Authorization service for the guidance tracker"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the decision API (default)
    Serve,
    /// Compile the policy files and report problems
    Validate {
        /// Policy directory, overriding the configured one
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the rules a principal ends up with, as JSON
    Rules {
        #[arg(long)]
        role: String,
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let templates = loader::load_or_builtin(settings.policies.dir.as_deref())
                .map_err(ServiceError::from)?;
            web::serve(settings, templates).await?;
        }
        Command::Validate { dir } => {
            let dir = dir.or(settings.policies.dir);
            let templates = loader::load_or_builtin(dir.as_deref()).map_err(ServiceError::from)?;
            let mut roles: Vec<&str> = templates.roles().map(|r| r.as_str()).collect();
            roles.sort_unstable();
            println!("ok: {} role(s): {}", roles.len(), roles.join(", "));
        }
        Command::Rules { role, id } => {
            let templates = loader::load_or_builtin(settings.policies.dir.as_deref())
                .map_err(ServiceError::from)?;
            let ability = templates
                .define_ability(&Principal::new(id, role))
                .map_err(ServiceError::from)?;
            let out = serde_json::to_string_pretty(&json!({
                "principal": ability.principal(),
                "rules": ability.rules(),
                "forbidden_reasons": forbidden_reasons(&ability),
            }))
            .map_err(ServiceError::from)?;
            println!("{out}");
        }
    }
    Ok(())
}
