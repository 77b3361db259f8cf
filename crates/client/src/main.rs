//! `policlinico` command-line front end.

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use policlinico_auth::{Requirement, explain};
use policlinico_client::{
    ApiClient, AuthClient, ClientConfig, FileStore, MenuDefinition, NavigationLog, RouteGuard,
    SessionStore, SessionVerification, compose,
};
use policlinico_core::Resource;

#[derive(Parser, Debug)]
#[command(author, version, about = "Clinic management client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the session.
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "POLICLINICO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and clear the persisted session.
    Logout,

    /// Verify the persisted session with the server and show who is signed in.
    Whoami,

    /// Reload the user record and permissions from the server.
    Profile,

    /// Exchange the current token for a fresh one.
    Refresh,

    /// Print the navigation menu for the current session.
    Menu {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the page guard for a requirement (any of the given permissions).
    Check {
        permissions: Vec<String>,

        /// Where to send the user when the check fails.
        #[arg(long)]
        redirect: Option<String>,
    },

    /// List a resource collection.
    List { resource: Resource },
}

struct App {
    cfg: ClientConfig,
    store: SessionStore,
    navigator: Arc<NavigationLog>,
    api: ApiClient,
    auth: AuthClient,
}

impl App {
    fn build(cfg: ClientConfig) -> Result<Self> {
        let store = SessionStore::new(Arc::new(FileStore::new(&cfg.state_dir)));
        let navigator = Arc::new(NavigationLog::new());
        let api = ApiClient::from_config(&cfg, store.clone()).context("build API client")?;
        let auth = AuthClient::new(
            Arc::new(api.clone()),
            store.clone(),
            navigator.clone(),
            cfg.locations.clone(),
        );
        Ok(Self {
            cfg,
            store,
            navigator,
            api,
            auth,
        })
    }

    fn menu(&self) -> Result<MenuDefinition> {
        match &self.cfg.menu_path {
            Some(path) => MenuDefinition::load(path)
                .with_context(|| format!("load menu from {}", path.display())),
            None => Ok(MenuDefinition::clinic().clone()),
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let cfg = ClientConfig::from_env().context("load configuration")?;
    policlinico_observability::init(cfg.log_format);
    let app = App::build(cfg)?;

    match args.command {
        Command::Login { email, password } => {
            let session = app.auth.login(&email, &password).await?;
            println!("Signed in as {} ({})", session.user.name, session.role());
            if let Some(dashboard) = app.cfg.locations.dashboard_for(session.role()) {
                println!("Dashboard: {dashboard}");
            }
        }
        Command::Logout => {
            app.auth.logout().await;
            println!("Signed out");
        }
        Command::Whoami => match app.auth.verify_session().await {
            SessionVerification::Verified(session) => {
                println!("{} <{}>", session.user.name, session.user.email);
                println!("role: {}", session.role());
                match &session.permissions {
                    Some(set) if !set.is_empty() => {
                        for permission in set.iter() {
                            println!("  {permission}");
                        }
                    }
                    _ => println!("  (no permissions loaded)"),
                }
            }
            SessionVerification::Unverified(user) => {
                println!("{} <{}> (cached, not verified; sign in again)", user.name, user.email);
            }
            SessionVerification::Rejected => bail!("session rejected by server; signed out"),
            SessionVerification::Anonymous => println!("Not signed in"),
        },
        Command::Profile => {
            let session = app.auth.refresh_profile().await?;
            let count = session.permissions.as_ref().map_or(0, |set| set.len());
            println!("{} ({}), {count} permission(s)", session.user.name, session.role());
        }
        Command::Refresh => match app.auth.refresh_token().await? {
            Some(lifetime) => println!("Token refreshed, expires at {}", lifetime.expires_at),
            None if app.store.get_session().is_some() => println!("Token refreshed"),
            None => bail!("not signed in"),
        },
        Command::Menu { json } => {
            let definition = app.menu()?;
            let session = app.store.get_session();
            let menu = compose(&definition, session.as_ref());
            if json {
                println!("{}", serde_json::to_string_pretty(&menu)?);
            } else {
                for item in &menu.items {
                    print_item(item, 0);
                }
            }
        }
        Command::Check {
            permissions,
            redirect,
        } => {
            let requirement = match permissions.len() {
                0 => Requirement::None,
                1 => Requirement::single(permissions[0].clone()),
                _ => Requirement::any_of(permissions),
            };
            let guard = RouteGuard::new(
                app.store.clone(),
                app.navigator.clone(),
                app.cfg.locations.clone(),
            );
            if guard.guard(&requirement, redirect.as_deref()) {
                let decision = explain(&requirement, app.store.get_session().as_ref());
                println!("allowed: {}", decision.message());
            } else {
                let target = app.navigator.last().unwrap_or_default();
                println!("denied: redirected to {target}");
                process::exit(2);
            }
        }
        Command::List { resource } => {
            let rows: Vec<serde_json::Value> = app.auth.intercept(app.api.list(resource).await).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

fn print_item(item: &policlinico_client::menu::RenderedItem, depth: usize) {
    let indent = "  ".repeat(depth);
    match (&item.route, item.is_locked()) {
        (_, true) => println!("{indent}{} [locked]", item.label),
        (Some(route), false) => println!("{indent}{} -> {route}", item.label),
        (None, false) => println!("{indent}{}", item.label),
    }
    for child in &item.children {
        print_item(child, depth + 1);
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
