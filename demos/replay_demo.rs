//! Replay a recorded landmark stream through the gesture pipeline.
//!
//! Each fired action is printed by a stand-in backend instead of being sent
//! to a real home automation service.
//!
//! Run with: cargo run --example replay_demo -- recording.jsonl [config.yaml]
//!
//! A recording is one JSON object per line, as written by the landmark
//! extractor: `{"timestamp": "...", "hands": [{"score": 0.9, "landmarks": [...]}]}`.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use gesture_home_agent::{
    activity::create_shared_log,
    agent::Agent,
    backend::{Backend, BackendError},
    config::Config,
    dispatch::{Delivery, Dispatcher},
    gesture::GestureClassifier,
    provider::{LandmarkProvider, ProviderConfig, ProviderSource},
};

struct PrintBackend;

impl Backend for PrintBackend {
    fn name(&self) -> &str {
        "print"
    }

    fn execute(&self, action: &str) -> Result<(), BackendError> {
        println!("  -> would execute '{action}'");
        Ok(())
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(recording) = args.next() else {
        eprintln!("Usage: replay_demo <recording.jsonl | -> [config.yaml]");
        std::process::exit(2);
    };
    let config_path = args.next().map(PathBuf::from);

    println!("Gesture Home - Replay Demo");
    println!("==========================");
    println!();

    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    println!("Using {}", config.path.display());
    for (label, entry) in config.gestures.iter() {
        println!(
            "  {} {:<12} -> {}",
            label.emoji(),
            label.display_name(),
            entry.action
        );
    }
    println!();

    let provider_config = ProviderConfig::from_settings(&config.provider, None)
        .with_source(ProviderSource::replay(&recording));
    let mut provider = LandmarkProvider::new(provider_config);
    if let Err(e) = provider.start() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let delivery = Delivery::Inline(Arc::new(PrintBackend));
    let dispatcher = Dispatcher::configure(config.gestures.clone(), delivery);
    let activity = create_shared_log();
    let classifier = GestureClassifier::new(config.classifier);
    let mut agent = Agent::new(classifier, dispatcher, activity.clone()).with_debug(true);

    let summary = agent.run(provider.receiver(), &AtomicBool::new(true));
    provider.stop();

    println!();
    println!("Replayed {} frames, fired {} actions", summary.frames, summary.fired);
    println!();
    println!("{}", activity.summary());
}
