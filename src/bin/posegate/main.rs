//! Capture driver entrypoint: runs the gesture-gated pipeline over a replay
//! script and emits session events as JSONL on stdout.
//!
//! With `--replay <file>` the script drives frames and user commands; without
//! it a built-in demo holds the selected gesture long enough for the
//! auto-capture countdown to fire.

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{unbounded, Sender};
use posegate::config::load_user_config;
use posegate::replay::{ReplayScript, TimedCommand};
use posegate::sink::JsonlSink;
use posegate::{init_tracing, AppConfig, CaptureOptions, CapturePipeline, PipelineCommand};
use std::io;
use std::thread;
use std::time::Instant;
use tracing::debug;

fn main() -> Result<()> {
    let cli = AppConfig::parse();
    init_tracing(&cli);
    let persisted = load_user_config();
    let options = CaptureOptions::resolve(&cli, &persisted);
    debug!(
        gesture = ?options.gesture,
        delay_ms = options.auto_capture_delay.as_millis() as u64,
        width = options.width,
        height = options.height,
        capture_label = %options.capture_label,
        "session configured"
    );

    let script = match &cli.replay {
        Some(path) => ReplayScript::load(path)?,
        None => ReplayScript::demo(options.gesture, options.auto_capture_delay),
    };
    let (mut source, detector, timed) = script.split();

    let (tx, rx) = unbounded();
    let sender = thread::spawn(move || send_timed(&timed, &tx));

    let sink = JsonlSink::new(io::stdout().lock());
    let mut pipeline = CapturePipeline::new(options, detector, sink);
    pipeline.run(&mut source, &rx)?;

    if sender.join().is_err() {
        debug!("command sender thread panicked");
    }
    Ok(())
}

/// Deliver scripted commands at their offsets from session start.
fn send_timed(commands: &[TimedCommand], tx: &Sender<PipelineCommand>) {
    let start = Instant::now();
    for timed in commands {
        let elapsed = start.elapsed();
        if timed.at > elapsed {
            thread::sleep(timed.at - elapsed);
        }
        if tx.send(timed.command).is_err() {
            return;
        }
    }
}
