use std::env;

use anyhow::{anyhow, Context, Result};
use storybuilder::logging::init_tracing;
use storybuilder::workspace::{config_file_path, ensure_workspace_structure, load_or_default, save};
use tracing::info;

fn main() -> Result<()> {
    init_tracing()?;
    let args = CliArgs::parse()?;
    let paths = ensure_workspace_structure()?;
    let config_path = config_file_path()?;
    let mut config = load_or_default()?;
    let mut changed = !config_path.exists();

    changed |= apply_override(&mut config.provider.provider, args.provider.as_deref());
    changed |= apply_override(&mut config.provider.model, args.model.as_deref());

    if changed {
        save(&config)?;
        info!(path = %config_path.display(), "configuration written");
        println!("Configuration recorded at {}", config_path.display());
    } else {
        println!("Configuration already up to date.");
    }

    println!("Workspace root: {}", paths.root.display());
    println!("Projects:       {}", paths.user_dir.display());
    println!("Engine data:    {}", paths.ai_dir.display());
    if config.provider.is_configured() {
        println!(
            "Provider:       {} ({})",
            config.provider.provider,
            if config.provider.model.is_empty() {
                "default model"
            } else {
                config.provider.model.as_str()
            }
        );
    } else {
        println!("Provider:       not configured (pass --provider <id>)");
    }

    Ok(())
}

struct CliArgs {
    provider: Option<String>,
    model: Option<String>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut provider = None;
        let mut model = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--provider" => {
                    let value = args
                        .next()
                        .context("Expected a provider id after --provider")?;
                    provider = Some(value);
                }
                "--model" => {
                    let value = args.next().context("Expected a model name after --model")?;
                    model = Some(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument '{other}'. Run with --help for usage instructions."
                    ));
                }
            }
        }
        Ok(Self { provider, model })
    }
}

fn print_usage() {
    println!("StoryBuilder setup");
    println!("Creates the workspace folders and records provider settings in config.toml.");
    println!("Usage: storybuilder-setup [options]");
    println!("Options:");
    println!("  --provider <id>   Generation provider id (e.g. openai, ollama)");
    println!("  --model <name>    Model name passed to the provider");
}

fn apply_override(slot: &mut String, value: Option<&str>) -> bool {
    match value {
        Some(value) if slot != value => {
            *slot = value.to_string();
            true
        }
        _ => false,
    }
}
