//! Landmark provider backed by an external extractor process or a recorded
//! JSON-lines stream.
//!
//! The extractor owns the camera. It is expected to print `READY` once the
//! camera is open and then one JSON object per processed frame. Killing the
//! child process is what releases the camera, so the provider kills and reaps
//! it on `stop()` and on drop.

use crate::provider::types::{HandObservation, LandmarkSample, ProviderEvent, WireFrame};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Line printed by the extractor once the camera is open.
pub const READY_SIGNAL: &str = "READY";

const CHANNEL_CAPACITY: usize = 256;
const SEND_POLL: Duration = Duration::from_millis(100);

/// Provider section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Extractor executable
    pub command: String,
    /// Extra arguments for the extractor
    pub args: Vec<String>,
    /// Hands reported below this score are ignored
    pub min_confidence: f32,
    /// How long to wait for the extractor's READY line
    pub ready_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            command: "hand-landmarks".to_string(),
            args: Vec::new(),
            min_confidence: 0.7,
            ready_timeout_secs: 15,
        }
    }
}

/// Where landmark frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderSource {
    /// Spawn an extractor process and read its stdout
    Command { program: String, args: Vec<String> },
    /// Replay a recorded JSON-lines file
    File(PathBuf),
    /// Read JSON lines from our own stdin
    Stdin,
}

impl ProviderSource {
    /// `-` selects stdin, anything else is treated as a file path.
    pub fn replay(path: &str) -> Self {
        if path == "-" {
            ProviderSource::Stdin
        } else {
            ProviderSource::File(PathBuf::from(path))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ProviderSource::Command { program, args } if args.is_empty() => program.clone(),
            ProviderSource::Command { program, args } => format!("{} {}", program, args.join(" ")),
            ProviderSource::File(path) => format!("replay {}", path.display()),
            ProviderSource::Stdin => "stdin".to_string(),
        }
    }
}

/// Runtime configuration of a provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub source: ProviderSource,
    /// Camera device forwarded to the extractor as `--camera <N>`
    pub camera: Option<u32>,
    pub min_confidence: f32,
    pub ready_timeout: Duration,
}

impl ProviderConfig {
    /// Build a command-backed configuration from the config file section.
    pub fn from_settings(settings: &ProviderSettings, camera: Option<u32>) -> Self {
        Self {
            source: ProviderSource::Command {
                program: settings.command.clone(),
                args: settings.args.clone(),
            },
            camera,
            min_confidence: settings.min_confidence,
            ready_timeout: Duration::from_secs(settings.ready_timeout_secs),
        }
    }

    /// Replace the source while keeping the thresholds.
    pub fn with_source(mut self, source: ProviderSource) -> Self {
        self.source = source;
        self
    }
}

/// Errors that can occur while acquiring the landmark source.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider has already been started")]
    AlreadyRunning,
    #[error("Failed to start extractor '{program}': {message}")]
    Spawn { program: String, message: String },
    #[error("Failed to open landmark stream: {0}")]
    Io(String),
    #[error("Extractor did not become ready: {0}")]
    Handshake(String),
    #[error("Extractor did not report READY within {0:?}")]
    ReadyTimeout(Duration),
}

/// Streams landmark samples from the configured source on a bounded channel.
pub struct LandmarkProvider {
    config: ProviderConfig,
    sender: Option<Sender<ProviderEvent>>,
    receiver: Receiver<ProviderEvent>,
    running: Arc<AtomicBool>,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
}

impl LandmarkProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            config,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            child: None,
            reader: None,
        }
    }

    /// Acquire the source and start the reader thread.
    ///
    /// For command sources this blocks until the extractor prints `READY`
    /// or the ready timeout expires.
    pub fn start(&mut self) -> Result<(), ProviderError> {
        let sender = self.sender.take().ok_or(ProviderError::AlreadyRunning)?;
        self.running.store(true, Ordering::SeqCst);

        let result = match self.config.source.clone() {
            ProviderSource::Command { program, args } => {
                self.start_command(&program, &args, sender)
            }
            ProviderSource::File(path) => match std::fs::File::open(&path) {
                Ok(file) => {
                    self.spawn_reader(Box::new(file), sender, None);
                    Ok(())
                }
                Err(e) => Err(ProviderError::Io(format!("{}: {e}", path.display()))),
            },
            ProviderSource::Stdin => {
                self.spawn_reader(Box::new(std::io::stdin()), sender, None);
                Ok(())
            }
        };

        if result.is_err() {
            self.stop();
        }
        result
    }

    fn start_command(
        &mut self,
        program: &str,
        args: &[String],
        sender: Sender<ProviderEvent>,
    ) -> Result<(), ProviderError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(camera) = self.config.camera {
            command.arg("--camera").arg(camera.to_string());
        }

        tracing::info!(source = %self.config.source.describe(), "Starting landmark extractor");

        let mut child = command.spawn().map_err(|e| ProviderError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ProviderError::Spawn {
            program: program.to_string(),
            message: "stdout was not captured".to_string(),
        })?;
        self.child = Some(child);

        let (ready_tx, ready_rx) = bounded(1);
        self.spawn_reader(Box::new(stdout), sender, Some(ready_tx));

        match ready_rx.recv_timeout(self.config.ready_timeout) {
            Ok(Ok(())) => {
                tracing::info!("Landmark extractor ready");
                Ok(())
            }
            Ok(Err(line)) => Err(ProviderError::Handshake(line)),
            Err(_) => Err(ProviderError::ReadyTimeout(self.config.ready_timeout)),
        }
    }

    fn spawn_reader(
        &mut self,
        input: Box<dyn Read + Send>,
        sender: Sender<ProviderEvent>,
        ready: Option<Sender<Result<(), String>>>,
    ) {
        let running = self.running.clone();
        let min_confidence = self.config.min_confidence;

        let handle = thread::spawn(move || {
            let mut lines = BufReader::new(input).lines();

            if let Some(ready) = ready {
                let handshake = match lines.next() {
                    Some(Ok(line)) if line.trim() == READY_SIGNAL => Ok(()),
                    Some(Ok(line)) => Err(line.trim().to_string()),
                    Some(Err(e)) => Err(e.to_string()),
                    None => Err("extractor exited before signalling READY".to_string()),
                };
                let failed = handshake.is_err();
                let _ = ready.send(handshake);
                if failed {
                    return;
                }
            }

            for line in lines {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        forward(&sender, &running, ProviderEvent::Error(e.to_string()));
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let event = parse_line(&line, min_confidence, Utc::now());
                if !forward(&sender, &running, event) {
                    break;
                }
            }
            tracing::debug!("Landmark stream ended");
        });

        self.reader = Some(handle);
    }

    /// Stop reading and release the extractor (and with it the camera).
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::debug!("Extractor already exited: {e}");
            }
            match child.wait() {
                Ok(status) => tracing::info!(%status, "Landmark extractor released"),
                Err(e) => tracing::warn!("Failed to reap landmark extractor: {e}"),
            }
            // The pipe is closed now, so the reader thread is about to finish.
            if let Some(reader) = self.reader.take() {
                let _ = reader.join();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for provider events.
    pub fn receiver(&self) -> &Receiver<ProviderEvent> {
        &self.receiver
    }
}

/// Send with periodic checks of `running`, so `stop()` never waits on a full
/// channel. Returns false once the event can no longer be delivered.
fn forward(sender: &Sender<ProviderEvent>, running: &AtomicBool, mut event: ProviderEvent) -> bool {
    loop {
        match sender.send_timeout(event, SEND_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(pending)) => {
                if !running.load(Ordering::SeqCst) {
                    return false;
                }
                event = pending;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

impl Drop for LandmarkProvider {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode one extractor line into a provider event.
///
/// Of the hands at or above `min_confidence` the highest-scoring one is kept.
pub fn parse_line(line: &str, min_confidence: f32, received_at: DateTime<Utc>) -> ProviderEvent {
    let frame: WireFrame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(e) => return ProviderEvent::Error(format!("unparseable frame: {e}")),
    };

    if let Some(error) = frame.error {
        return ProviderEvent::Error(error);
    }

    let hand = frame
        .hands
        .into_iter()
        .filter(|hand| hand.score >= min_confidence)
        .max_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(HandObservation::from);

    ProviderEvent::Sample(LandmarkSample::new(
        frame.timestamp.unwrap_or(received_at),
        hand,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn hand_json(score: f32, count: usize) -> String {
        let landmarks: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"x":{},"y":0.5,"z":0.0}}"#, i as f32 / 40.0))
            .collect();
        format!(
            r#"{{"handedness":"Right","score":{score},"landmarks":[{}]}}"#,
            landmarks.join(",")
        )
    }

    #[test]
    fn test_parse_line_picks_best_confident_hand() {
        let line = format!(
            r#"{{"hands":[{},{},{}]}}"#,
            hand_json(0.75, 21),
            hand_json(0.95, 20),
            hand_json(0.4, 21)
        );
        match parse_line(&line, 0.7, Utc::now()) {
            ProviderEvent::Sample(sample) => {
                let hand = sample.hand.expect("hand expected");
                assert!((hand.score - 0.95).abs() < 1e-6);
                // Arity is passed through for the classifier to judge.
                assert_eq!(hand.landmarks.len(), 20);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_line_low_confidence_is_absent_hand() {
        let line = format!(r#"{{"hands":[{}]}}"#, hand_json(0.2, 21));
        match parse_line(&line, 0.7, Utc::now()) {
            ProviderEvent::Sample(sample) => assert!(!sample.has_hand()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_line_uses_embedded_timestamp() {
        let line = r#"{"timestamp":"2024-05-01T10:00:00Z","hands":[]}"#;
        match parse_line(line, 0.7, Utc::now()) {
            ProviderEvent::Sample(sample) => {
                assert_eq!(sample.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(matches!(
            parse_line("not json", 0.7, Utc::now()),
            ProviderEvent::Error(_)
        ));
        match parse_line(r#"{"error":"camera lost"}"#, 0.7, Utc::now()) {
            ProviderEvent::Error(message) => assert_eq!(message, "camera lost"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_replay_source_parsing() {
        assert_eq!(ProviderSource::replay("-"), ProviderSource::Stdin);
        assert_eq!(
            ProviderSource::replay("frames.jsonl"),
            ProviderSource::File(PathBuf::from("frames.jsonl"))
        );
    }

    #[test]
    fn test_file_replay_ends_with_disconnect() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"hands":[]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "garbage").unwrap();
        file.flush().unwrap();

        let config = ProviderConfig::from_settings(&ProviderSettings::default(), None)
            .with_source(ProviderSource::File(file.path().to_path_buf()));
        let mut provider = LandmarkProvider::new(config);
        provider.start().unwrap();

        let receiver = provider.receiver().clone();
        let events: Vec<ProviderEvent> = receiver.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ProviderEvent::Sample(_)));
        assert!(matches!(events[1], ProviderEvent::Error(_)));

        assert!(matches!(provider.start(), Err(ProviderError::AlreadyRunning)));
    }

    #[test]
    fn test_missing_extractor_fails_to_start() {
        let settings = ProviderSettings {
            command: "/nonexistent/hand-landmarks".to_string(),
            ..ProviderSettings::default()
        };
        let mut provider = LandmarkProvider::new(ProviderConfig::from_settings(&settings, Some(0)));
        assert!(matches!(provider.start(), Err(ProviderError::Spawn { .. })));
    }
}
