//! Replay a recorded CSV command log through the engine and report
//! outcome counts plus the final state hash.

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Parser;
use rustc_hash::FxHashMap;

use qflow::{Command, CommandRow, Engine, QueueConfig, QueueId};

#[derive(Parser, Debug)]
#[command(name = "replay", about = "Replay a CSV command log through the queue engine")]
struct Args {
    /// Path to the CSV command log.
    log: PathBuf,

    /// Capacity for queues created on first sight.
    #[arg(long, default_value_t = 1000)]
    queue_size: u32,

    /// Print every rejected command.
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let engine = Engine::new();

    // Queue ids in the log are remapped to engine-issued ids, creating
    // each queue on first sight.
    let mut queue_map: FxHashMap<u64, QueueId> = FxHashMap::default();

    // Rows without a timestamp advance a synthetic clock one second per
    // row so replays stay reproducible.
    let mut clock: DateTime<Utc> = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();

    let mut rows = 0u64;
    let mut skipped = 0u64;
    let mut applied = 0u64;
    let mut rejected = 0u64;

    let mut reader = csv::Reader::from_path(&args.log)?;
    for record in reader.deserialize::<CommandRow>() {
        let row = record?;
        rows += 1;

        let Some(cmd) = row.to_command() else {
            skipped += 1;
            continue;
        };

        let queue_id = *queue_map
            .entry(cmd.queue_id())
            .or_insert_with(|| engine.create_queue(QueueConfig::with_size(args.queue_size)));
        let cmd = retarget(cmd, queue_id);

        let now = match row.timestamp {
            Some(ts) => ts,
            None => {
                clock += Duration::seconds(1);
                clock
            }
        };

        match engine.process(cmd, now) {
            Ok(_) => applied += 1,
            Err(err) => {
                rejected += 1;
                if args.verbose {
                    eprintln!("row {rows}: rejected: {err}");
                }
            }
        }
    }

    println!("rows:      {rows}");
    println!("skipped:   {skipped}");
    println!("applied:   {applied}");
    println!("rejected:  {rejected}");
    println!("state:     {:#018x}", engine.state_hash());
    Ok(())
}

/// Rewrite a command's queue id to the engine-issued one.
fn retarget(cmd: Command, queue_id: QueueId) -> Command {
    match cmd {
        Command::Book(mut c) => {
            c.queue_id = queue_id;
            Command::Book(c)
        }
        Command::Position(mut c) => {
            c.queue_id = queue_id;
            Command::Position(c)
        }
        Command::RequestSwap(mut c) => {
            c.queue_id = queue_id;
            Command::RequestSwap(c)
        }
        Command::AcceptSwap(mut c) => {
            c.queue_id = queue_id;
            Command::AcceptSwap(c)
        }
        Command::DeclineSwap(mut c) => {
            c.queue_id = queue_id;
            Command::DeclineSwap(c)
        }
        Command::CallNext(mut c) => {
            c.queue_id = queue_id;
            Command::CallNext(c)
        }
        Command::Confirm(mut c) => {
            c.queue_id = queue_id;
            Command::Confirm(c)
        }
        Command::Snooze(mut c) => {
            c.queue_id = queue_id;
            Command::Snooze(c)
        }
    }
}
