use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;

use lualens::bridge::{DebugClient, DebugMessage};
use lualens::config::CONFIG_FILE_NAME;
use lualens::{CancelToken, Settings, Workspace};

#[derive(Parser)]
#[command(name = "lualens")]
#[command(version)]
#[command(about = "Type intelligence for annotated Lua workspaces")]
struct Cli {
    /// Path to the configuration file (defaults to ./lualens.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Index a directory of Lua sources and print statistics
    Index {
        /// Directory to index (defaults to the workspace root)
        path: Option<PathBuf>,
    },

    /// List the flattened members of a class
    Members {
        /// Class name as declared with ---@class
        class: String,

        /// Directory to index first
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Infer the type of a file-level global
    Infer {
        /// Global name to resolve
        name: String,

        /// Directory to index first
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Show the effective configuration
    Config,

    /// Attach to a running debuggee and ship the bootstrap script
    Attach {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    lualens::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { force } => init_config(force),
        Commands::Index { path } => {
            let root = resolve_root(path, &settings)?;
            let ws = build_workspace(settings)?;
            let stats = ws.index_directory(&root, &CancelToken::new())?;
            println!(
                "Indexed {} files ({} unchanged, {} failed), {} classes",
                stats.indexed,
                stats.skipped,
                stats.failed,
                ws.stubs().class_count()
            );
            Ok(())
        }
        Commands::Members { class, path } => {
            let ws = build_workspace(settings)?;
            ws.index_directory(&path, &CancelToken::new())?;
            let ctx = ws.search_context(CancelToken::new());
            match ws.members_of(&ctx, &class)? {
                Some(info) => {
                    println!("{class} (inherits: {})", format_supers(&info.superclasses));
                    for member in info.members() {
                        let ty = member
                            .ty
                            .as_ref()
                            .map_or_else(|| "?".to_string(), |t| format!("{t:?}"));
                        println!("  {} [{}] {ty}", member.name, member.owner);
                    }
                    Ok(())
                }
                None => bail!("class '{class}' not found"),
            }
        }
        Commands::Infer { name, path } => {
            let ws = build_workspace(settings)?;
            ws.index_directory(&path, &CancelToken::new())?;
            let mut ctx = ws.search_context(CancelToken::new());
            let ty = ws.infer_global(&mut ctx, &name)?;
            if ty.is_unknown() {
                println!("{name}: unknown");
            } else {
                println!("{name}: {ty}");
            }
            Ok(())
        }
        Commands::Config => {
            let rendered = toml::to_string_pretty(&settings)?;
            println!("{rendered}");
            Ok(())
        }
        Commands::Attach { host, port } => {
            let mut debugger = settings.debugger.clone();
            if let Some(host) = host {
                debugger.host = host;
            }
            if let Some(port) = port {
                debugger.port = port;
            }
            let mut client = DebugClient::connect(&debugger)?;
            client.send_bootstrap(&debugger)?;
            client.request(DebugMessage::new("readyReq", json!({})))?;
            while let Some(message) = client.recv()? {
                println!("{} {}", message.cmd, message.info);
            }
            Ok(())
        }
    }
}

fn build_workspace(settings: Settings) -> Result<Workspace> {
    Workspace::new(Arc::new(settings)).context("initializing workspace")
}

fn resolve_root(path: Option<PathBuf>, settings: &Settings) -> Result<PathBuf> {
    if let Some(path) = path {
        return Ok(path);
    }
    settings
        .workspace_root
        .clone()
        .context("no path given and no workspace root configured")
}

fn init_config(force: bool) -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);
    if path.exists() && !force {
        bail!("{CONFIG_FILE_NAME} already exists (use --force to overwrite)");
    }
    Settings::default().save(path)?;
    println!("Wrote {CONFIG_FILE_NAME}");
    Ok(())
}

fn format_supers(supers: &[Box<str>]) -> String {
    if supers.is_empty() {
        "none".to_string()
    } else {
        supers.join(", ")
    }
}
