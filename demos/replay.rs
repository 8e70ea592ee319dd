//! Replays a burst of events through the throttle processor.
//!
//! Run with `RUST_LOG=debug` to see each sleep.

use otap_df_throttle::{LogEvent, Message, ThrottleProcessor};
use serde_json::json;
use std::time::Instant;

fn main() {
    env_logger::init();

    println!("Throttle Replay Example");
    println!("=======================");

    // Sleep 50ms on every 5th event, or once a second of real time has passed.
    let config = json!({
        "sleeptime": "%{delay}",
        "every": 5,
        "timelimit": 1
    });

    let processor = match ThrottleProcessor::from_config(&config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to create throttle processor: {}", e);
            return;
        }
    };

    // Event timestamps advance ten seconds apart, far faster than real time.
    let mut forwarded: Vec<LogEvent> = Vec::new();
    let start = Instant::now();
    for i in 0..20 {
        let event = LogEvent::new(i as f64 * 10.0)
            .with_field("delay", 0.05)
            .with_field("seq", i);
        if let Err(e) = processor.process(Message::PData(event), &mut forwarded) {
            eprintln!("Failed to forward event {}: {}", i, e);
            return;
        }
    }

    let snapshot = processor.gate.snapshot();
    println!("Forwarded {} events in {:?}", forwarded.len(), start.elapsed());
    println!(
        "Slept {} times for {:?} in total",
        snapshot.sleeps, snapshot.total_slept
    );
}
