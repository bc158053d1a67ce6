//! Tutorly command line
//!
//! Loads, validates and renders A2UI screens outside the app, and fires
//! actions against them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio::runtime::Handle;
use tutorly_kit::prelude::*;

#[derive(Parser)]
#[command(name = "tutorly")]
#[command(about = "Inspect and exercise Tutorly server-driven screens", long_about = None)]
struct Cli {
    /// Config file (overrides TUTORLY_CONFIG and the platform default)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a screen payload and print its metrics
    Validate {
        /// Path to a component tree JSON file
        file: PathBuf,
    },
    /// Load a screen and print the rendered element tree
    Render {
        #[command(flatten)]
        screen: ScreenArgs,
    },
    /// Load a screen, tap a component and print the screen that results
    Tap {
        #[command(flatten)]
        screen: ScreenArgs,
        /// Id of the component to tap
        #[arg(short, long)]
        component: String,
    },
}

#[derive(Args)]
struct ScreenArgs {
    /// Directory holding <screen id>.json files
    #[arg(long, required_unless_present = "base_url", conflicts_with = "base_url")]
    screens_dir: Option<PathBuf>,

    /// Content backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for the content backend
    #[arg(long, env = "TUTORLY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Screen to load
    #[arg(short, long)]
    screen: String,

    /// Grant a device permission (camera, microphone, speechRecognition, stylus)
    #[arg(short, long = "grant")]
    grants: Vec<String>,

    /// Print JSON instead of an outline
    #[arg(long)]
    json: bool,
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("app", "Tutorly", "tutorly")
        .map(|dirs| dirs.config_dir().join("config.json"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = RuntimeConfig::resolve(cli.config.as_deref(), default_config_path().as_deref())
        .context("Failed to load configuration")?;
    ::log::debug!("Runtime config: {:?}", config);

    match cli.command {
        Commands::Validate { file } => validate_file(&file, &config),
        Commands::Render { screen } => {
            let host = build_host(&screen, &config)?;
            host.load(&screen.screen).await;
            print_screen(&host, screen.json)
        }
        Commands::Tap { screen, component } => {
            let mut host = build_host(&screen, &config)?;
            host.load(&screen.screen).await;

            host.tap(&component)
                .with_context(|| format!("Cannot tap {}", component))?;
            host.pipeline().wait_idle().await;

            for event in host.poll_all() {
                eprintln!("{:?}", event);
            }
            print_screen(&host, screen.json)
        }
    }
}

fn validate_file(path: &Path, config: &RuntimeConfig) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let root = ComponentNode::from_json(&json)
        .with_context(|| format!("{} is not a component tree", path.display()))?;
    let metrics = validate(&root, config.limits)
        .with_context(|| format!("{} failed validation", path.display()))?;

    println!(
        "{}: valid, {} components, depth {}",
        path.display(),
        metrics.total_components,
        metrics.max_depth
    );
    Ok(())
}

fn build_host(args: &ScreenArgs, config: &RuntimeConfig) -> Result<ScreenHost> {
    let mut granted = config.granted_permissions.clone();
    for name in &args.grants {
        match Permission::from_name(name) {
            Some(permission) => granted.push(permission),
            None => bail!("Unknown permission {:?}", name),
        }
    }

    let source: Arc<dyn ScreenSource> = match (&args.screens_dir, &args.base_url) {
        (Some(dir), _) => Arc::new(FileScreenSource::new(dir)),
        (None, Some(base_url)) => {
            let mut source = HttpScreenSource::new(base_url)
                .with_context(|| format!("Invalid base URL {}", base_url))?;
            if let Some(token) = &args.token {
                source = source.with_auth(token);
            }
            Arc::new(source)
        }
        (None, None) => bail!("Either --screens-dir or --base-url is required"),
    };

    Ok(ScreenHost::from_config(
        Handle::current(),
        source,
        Arc::new(GrantedPermissions::new(granted)),
        config,
    ))
}

fn print_screen(host: &ScreenHost, json: bool) -> Result<()> {
    let Some(screen) = host.current_screen() else {
        bail!("No screen loaded");
    };
    if let Some(error) = &screen.error {
        eprintln!("Showing {:?} content for {}: {}", screen.origin, screen.screen_id, error);
    }

    let Some(rendered) = host.render() else {
        bail!("No screen loaded");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        print!("{}", rendered.outline());
    }
    Ok(())
}
