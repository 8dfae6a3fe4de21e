mod manifest;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tether_engine::{BindingConfig, DEFAULT_DATA_KEY, ViewKind, set_default_page_size};
use tether_util::{TetherConfig, expand_tilde, init_tracing};
use tracing::debug;

use crate::{
    manifest::{Manifest, Workspace},
    render::{RenderOptions, render_view},
};

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Render query-bound views against a fixture manifest")]
struct Cli {
    /// Manifest with shapes, entities and view declarations.
    #[arg(long, global = true, value_name = "PATH")]
    manifest: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List declared views grouped by shape.
    Views,
    /// Mount a view and print each frame it renders.
    Render(RenderArgs),
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Name of the view to mount.
    view: String,
    /// Entity id(s) passed as the view's input.
    #[arg(long = "of", value_name = "ID")]
    of: Vec<String>,
    /// Page size applied after mounting (collection views).
    #[arg(long)]
    limit: Option<usize>,
    /// Zero-based page to jump to (collection views).
    #[arg(long, default_value_t = 0)]
    page: usize,
    /// Number of pages to print, walking forward (collection views).
    #[arg(long, default_value_t = 1)]
    pages: usize,
    /// Pass stored records as input and run without a backend.
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = TetherConfig::load()?;
    init_tracing(config.log_filter.as_deref());

    if let Some(page_size) = config.default_page_size {
        set_default_page_size(page_size);
    }

    let manifest_path = manifest_path(cli.manifest.as_deref(), &config)?;
    debug!(path = %manifest_path.display(), "loading manifest");
    let workspace = Manifest::load(&manifest_path)?.declare(BindingConfig::default())?;

    match cli.command {
        Command::Views => {
            print_views(&workspace);
            Ok(())
        }
        Command::Render(args) => {
            let options = RenderOptions {
                of: args.of,
                limit: args.limit,
                page: args.page,
                pages: args.pages,
                offline: args.offline,
            };
            for frame in render_view(&workspace, &args.view, &options).await? {
                println!("{frame}\n");
            }
            Ok(())
        }
    }
}

fn manifest_path(flag: Option<&str>, config: &TetherConfig) -> Result<PathBuf> {
    flag.map(expand_tilde)
        .or_else(|| config.manifest_path())
        .context("no manifest given; pass --manifest <PATH> or set `manifest` in the config file")
}

fn print_views(workspace: &Workspace) {
    for shape in workspace.registry.shapes() {
        println!("{shape}");
        for metadata in workspace.registry.views_for(shape) {
            let detail = match metadata.kind() {
                ViewKind::Entity => String::new(),
                ViewKind::Collection if metadata.data_key() != DEFAULT_DATA_KEY => {
                    format!(" -> {} (limit {})", metadata.data_key(), metadata.initial_limit())
                }
                ViewKind::Collection => format!(" (limit {})", metadata.initial_limit()),
            };
            println!("  {} [{}]{detail}", metadata.name(), metadata.kind());
        }
    }
}
