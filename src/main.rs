//! Gesture Home CLI
//!
//! Control smart-home devices with static hand gestures.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use gesture_home_agent::{
    activity::{create_shared_log_with_persistence, ActivityLog},
    agent::{Agent, StopReason},
    backend::{create_backend, Backend, BackendKind},
    config::Config,
    dispatch::{ActionExecutor, Delivery, Dispatcher},
    gesture::{GestureClassifier, GestureLabel, GESTURE_RULES},
    provider::{LandmarkProvider, ProviderConfig, ProviderSource},
    VERSION,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gesture-home")]
#[command(version = VERSION)]
#[command(about = "Control smart-home devices with hand gestures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start recognizing gestures and dispatching actions
    Run(RunArgs),

    /// Validate the configuration and backend credentials
    Check {
        /// Alternate configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// List supported gestures and their configured actions
    Gestures {
        /// Alternate configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Show accumulated activity statistics
    Status,

    /// Show the effective configuration
    Config {
        /// Alternate configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Alternate configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Camera device index passed to the landmark extractor
    #[arg(long)]
    camera: Option<u32>,

    /// Recognize and log gestures without calling the backend
    #[arg(long)]
    dry_run: bool,

    /// Print every gesture change with its finger pattern
    #[arg(long)]
    debug: bool,

    /// Backend to use (ifttt, home_assistant, google_sdm)
    #[arg(long)]
    backend: Option<String>,

    /// Replay recorded landmark frames from a JSON-lines file ("-" for stdin)
    #[arg(long, value_name = "FILE")]
    replay: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let debug = matches!(&cli.command, Commands::Run(args) if args.debug);
    init_tracing(debug);

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Check { config } => cmd_check(config.as_deref()),
        Commands::Gestures { config } => {
            cmd_gestures(config.as_deref());
            Ok(())
        }
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Config { config } => cmd_config(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "gesture_home_agent=debug,gesture_home=debug"
    } else {
        "gesture_home_agent=info,gesture_home=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .init();
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    println!("Gesture Home v{VERSION}");
    println!();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    let kind = BackendKind::from_sources(args.backend.as_deref(), config.backend.kind.as_deref());
    let backend = create_backend(kind, config.backend.timeout())
        .with_context(|| format!("Failed to initialise {kind} backend"))?;
    let executor = ActionExecutor::new(backend, config.backend.timeout());
    let dispatcher = Dispatcher::configure(config.gestures.clone(), Delivery::Offloaded(executor))
        .with_dry_run(args.dry_run);

    let mut provider_config = ProviderConfig::from_settings(&config.provider, args.camera);
    if let Some(replay) = &args.replay {
        provider_config = provider_config.with_source(ProviderSource::replay(replay));
    }

    println!("Config: {}", config.path.display());
    println!("  Gestures configured: {}", config.gestures.len());
    println!("  Backend: {}", dispatcher.backend_name());
    println!("  Source: {}", provider_config.source.describe());
    if dispatcher.is_dry_run() {
        println!("  Mode: DRY RUN (no commands will be sent)");
    }
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let activity = create_shared_log_with_persistence(Config::activity_path());
    let mut provider = LandmarkProvider::new(provider_config);
    provider
        .start()
        .context("Failed to start landmark provider (is the camera available?)")?;

    println!("Show a gesture to the camera. Press Ctrl+C to stop.");
    println!();

    let classifier = GestureClassifier::new(config.classifier);
    let mut agent = Agent::new(classifier, dispatcher, activity).with_debug(args.debug);
    let summary = agent.run(provider.receiver(), &running);

    provider.stop();
    if let Err(e) = agent.shutdown() {
        eprintln!("Warning: Could not save activity log: {e}");
    }

    println!();
    match summary.stop_reason {
        StopReason::Interrupted => println!("Stopped."),
        StopReason::EndOfStream => println!("Landmark stream ended."),
    }
    println!(
        "Frames this session: {}, actions fired: {}",
        summary.frames, summary.fired
    );
    println!();
    println!("{}", agent.activity().summary());

    Ok(())
}

fn cmd_check(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("Configuration is invalid")?;
    println!("Config OK: {}", config.path.display());
    println!("  Gestures configured: {}", config.gestures.len());

    let kind = BackendKind::from_sources(None, config.backend.kind.as_deref());
    let backend = create_backend(kind, config.backend.timeout())
        .with_context(|| format!("Failed to initialise {kind} backend"))?;
    if let Err(e) = backend.ensure_configured() {
        bail!("Backend {kind} is not ready: {e}");
    }
    println!("Backend OK: {kind}");

    let unknown: Vec<&str> = config
        .gestures
        .iter()
        .map(|(_, entry)| entry.action.as_str())
        .filter(|action| !gesture_home_agent::KNOWN_ACTIONS.contains(action))
        .collect();
    if !unknown.is_empty() {
        println!(
            "Note: custom actions {unknown:?} are only understood by IFTTT (as event names)"
        );
    }
    Ok(())
}

fn cmd_gestures(config_path: Option<&Path>) {
    let config = match Config::load(config_path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Warning: {e}");
            None
        }
    };

    println!("Supported gestures (in match priority order)");
    println!("============================================");
    println!();

    for rule in GESTURE_RULES {
        let label: GestureLabel = rule.label;
        let binding = config
            .as_ref()
            .and_then(|config| config.gestures.get(label))
            .map(|entry| {
                format!(
                    "{} ({:.1}s cooldown) - {}",
                    entry.action,
                    entry.cooldown.as_secs_f64(),
                    entry.description
                )
            })
            .unwrap_or_else(|| "(not configured)".to_string());
        println!(
            "  {} {:<12} {:<12} {}",
            label.emoji(),
            label.display_name(),
            label.as_str(),
            binding
        );
    }
}

fn cmd_status() {
    println!("Gesture Home Status");
    println!("===================");
    println!();

    let config_path = Config::resolve_path(None);
    println!(
        "Config file: {} ({})",
        config_path.display(),
        if config_path.exists() { "found" } else { "missing" }
    );

    let activity_path = Config::activity_path();
    println!("Activity log: {}", activity_path.display());
    println!();

    if activity_path.exists() {
        let log = ActivityLog::with_persistence(activity_path);
        println!("{}", log.summary());
    } else {
        println!("No activity recorded yet.");
    }
}

#[derive(Serialize)]
struct EffectiveSettings<'a> {
    classifier: &'a gesture_home_agent::gesture::ClassifierThresholds,
    provider: &'a gesture_home_agent::provider::ProviderSettings,
    backend: &'a gesture_home_agent::backend::BackendSettings,
}

fn cmd_config(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", config.path.display());
    println!("Data directory: {}", Config::data_dir().display());
    println!(
        "Backend in use: {}",
        BackendKind::from_sources(None, config.backend.kind.as_deref())
    );
    println!();

    println!("gestures:");
    for (label, entry) in config.gestures.iter() {
        println!(
            "  {label}: {} -> {} ({}s)",
            entry.display_name,
            entry.action,
            entry.cooldown.as_secs_f64()
        );
    }

    let settings = EffectiveSettings {
        classifier: &config.classifier,
        provider: &config.provider,
        backend: &config.backend,
    };
    let yaml = serde_yml::to_string(&settings).context("Failed to render settings")?;
    println!("{yaml}");
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
