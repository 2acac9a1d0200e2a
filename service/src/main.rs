use std::path::PathBuf;

use boxr::Resolver;
use boxr::boxes::ResourceBox;
use boxr_service::config_io::{PATHS_ENV_VAR, load_layers};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "boxr-service")]
struct Args {
    /// Directory served as a box; repeat to stack boxes, highest priority first.
    #[arg(long = "box", required = true)]
    boxes: Vec<PathBuf>,

    /// Config file (.toml or .json); repeat to layer, later files win.
    #[arg(long)]
    config: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration against the boxes and report every problem.
    Check,
    /// Show how a request path resolves.
    Resolve {
        path: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let env_paths = std::env::var(PATHS_ENV_VAR).ok();
    let config = load_layers(args.config.as_slice(), env_paths.as_deref())?;
    let overlay = boxr_service::overlay_from_dirs(&args.boxes)?;

    match args.command {
        Command::Check => {
            let mut paths = config.paths;
            let errors = paths.validate(&overlay);
            overlay.close()?;
            if !errors.is_empty() {
                for err in &errors {
                    eprintln!("{err}");
                }
                anyhow::bail!("{} configuration problem(s)", errors.len());
            }
            println!("ok (index: {:?})", paths.index());
        }
        Command::Resolve { path } => {
            let resolver = Resolver::new(overlay, config.paths)?;
            let resolved = resolver.resolve(&path);
            resolver.close()?;
            let resolved = resolved?;
            let out = serde_json::json!({
                "status": resolved.status,
                "path": resolved.path,
                "info": resolved.file.info(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
