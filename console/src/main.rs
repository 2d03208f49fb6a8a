use crate::cfg::Config;
use crate::commands::Context;
use admin_session::gateway::transport::ReqwestTransport;
use admin_session::store::cookie::JarCookies;
use admin_session::store::file::FileSlot;
use admin_session::{RequestGateway, SessionStore};
use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::cookie::Jar;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, Level};

//--------------------------------------------------------------------------------------------------

mod cfg;
mod commands;

//--------------------------------------------------------------------------------------------------
// Command line
//--------------------------------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "admin-console", about = "Operator console for the administration API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and keep the session for later commands
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ADMIN_CONSOLE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the session
    Logout,
    /// Show the signed-in operator
    Whoami {
        /// Fail unless the session has one of these roles
        #[arg(long = "role")]
        roles: Vec<String>,
    },
    /// Per-institution feature toggles
    Features {
        #[command(subcommand)]
        command: FeaturesCommand,
    },
}

#[derive(Subcommand)]
enum FeaturesCommand {
    List {
        institution: String,
    },
    /// Apply key=on|off toggles in one bulk save
    Set {
        institution: String,
        #[arg(required = true)]
        toggles: Vec<String>,
    },
}

//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let cfg = Config::load()?;

    // Initialize tracing
    let mut fmt_sub = tracing_subscriber::fmt().with_writer(std::io::stderr);
    if cfg.debug {
        fmt_sub = fmt_sub.with_max_level(Level::DEBUG);
    } else {
        fmt_sub = fmt_sub.with_max_level(Level::INFO);
    }
    fmt_sub.init();

    // Session storage shared by the store and the HTTP client
    let state_dir = cfg.state_dir()?;
    debug!("Using state directory {}", state_dir.display());
    let origin = Url::parse(&cfg.base_url)?;
    let jar = Arc::new(Jar::default());
    let store = SessionStore::new(
        Arc::new(FileSlot::new(state_dir.join("session.json"))),
        Arc::new(JarCookies::new(jar.clone(), origin)),
    );

    // Restore the cookie from the persisted credential
    if let Some(token) = store.get() {
        store.set(&token);
    }

    let transport = ReqwestTransport::new(jar)?;
    let gateway = RequestGateway::new(cfg.gateway_config(), Arc::new(transport), store);
    let ctx = Context::new(gateway, cfg.login_path());

    match cli.command {
        Command::Login { email, password } => commands::sign_in(&ctx, email, password).await,
        Command::Logout => commands::sign_out(&ctx).await,
        Command::Whoami { roles } => commands::whoami(&ctx, roles),
        Command::Features { command } => match command {
            FeaturesCommand::List { institution } => {
                commands::list_features(&ctx, institution).await
            }
            FeaturesCommand::Set {
                institution,
                toggles,
            } => commands::set_features(&ctx, institution, toggles).await,
        },
    }
}

//--------------------------------------------------------------------------------------------------
