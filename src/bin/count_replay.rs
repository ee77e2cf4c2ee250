//! Feeds JSON-lines frame batches (one `FrameBatch` per line) through a camera pipeline
//! and emits the resulting counts to the ingestion API.
//!
//! ```text
//! count-replay --config config.yaml --input frames.jsonl
//! tracker-bridge | count-replay --config config.yaml --dry-run
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use people_counter_rs::config::CounterConfig;
use people_counter_rs::counter::{spawn_gc_timer, CameraPipeline, FrameBatch};
use people_counter_rs::sink::{EventEmitter, EventSink, HttpEventSink, StdoutSink};

#[derive(Parser, Debug)]
#[command(name = "count-replay", about = "Counts people from tracker output")]
struct Args {
    /// YAML configuration of the camera
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
    /// JSON-lines file with frame batches. Reads stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Print counts as JSON lines instead of posting them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("people_counter_rs=info,count_replay=info")),
        )
        .init();

    let args = Args::parse();
    let config = CounterConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let pipeline = CameraPipeline::from_config(&config)?;
    info!("{}", pipeline);
    let pipeline = pipeline.into_shared();

    let gc_period = Duration::from_secs_f64(config.unique.gc_interval_seconds);
    let gc_handle = spawn_gc_timer(pipeline.clone(), gc_period);

    let sink: Arc<dyn EventSink> = if args.dry_run {
        Arc::new(StdoutSink)
    } else {
        let timeout = Duration::from_millis(config.emitter.timeout_ms);
        Arc::new(HttpEventSink::from_config(&config.backend, timeout)?)
    };
    let (emitter, emitter_handle) = EventEmitter::spawn(sink, config.emitter.clone());

    let reader: Box<dyn AsyncRead + Unpin + Send> = match args.input {
        Some(ref path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(reader).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let batch: FrameBatch = match serde_json::from_str(&line) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(line_no, %err, "skipping malformed frame batch");
                continue;
            }
        };
        let events = pipeline.lock().process_frame(&batch);
        for event in events {
            emitter.emit(event);
        }
    }

    gc_handle.abort();
    drop(emitter);
    emitter_handle.await?;
    let totals = pipeline.lock().totals();
    info!(%totals, "input exhausted");
    Ok(())
}
