//! # Example: background_queue
//!
//! A fast producer feeds a small [`BoundedWorkQueue`] drained by a
//! [`WorkerPool`]; when the buffer is full, `try_enqueue` reports it and the
//! producer sheds the item instead of blocking.
//!
//! Shows how to:
//! - Implement [`Consume`] for a handler with its own state.
//! - Apply backpressure with `try_enqueue`.
//! - Drain the queue on shutdown within a grace period.
//!
//! ## Flow
//! ```text
//! producer ── try_enqueue ──► [queue: 4] ──► consumer 0 ──► Thumbnailer::consume()
//!     └─ false ──► dropped              └──► consumer 1 ──► Thumbnailer::consume()
//! shutdown() ──► close ──► drain ──► WorkerStopped{reason=closed}
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example background_queue --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use taskline::{
    ActionError, BoundedWorkQueue, Consume, LogWriter, PoolConfig, QueueConfig, Subscribe,
    WorkerPool,
};

/// Pretends to render thumbnails.
struct Thumbnailer {
    rendered: AtomicUsize,
}

#[async_trait]
impl Consume<String> for Thumbnailer {
    fn name(&self) -> &str {
        "thumbnailer"
    }

    async fn consume(&self, path: String, ctx: CancellationToken) -> Result<(), ActionError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(30)) => {}
            _ = ctx.cancelled() => return Err(ActionError::failed("cancelled".to_string())),
        }
        if path.ends_with(".txt") {
            return Err(ActionError::failed(format!("{path}: not an image")));
        }
        self.rendered.fetch_add(1, Ordering::Relaxed);
        println!("[thumbnailer] rendered {path}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let queue = Arc::new(BoundedWorkQueue::<String>::with_config(&QueueConfig { capacity: 4 }));
    let thumbnailer = Arc::new(Thumbnailer {
        rendered: AtomicUsize::new(0),
    });
    let pool = WorkerPool::spawn_with_subscribers(
        PoolConfig {
            workers: 2,
            grace: Duration::from_secs(2),
            ..PoolConfig::named("thumbnails")
        },
        Arc::clone(&queue),
        thumbnailer.clone(),
        vec![Arc::new(LogWriter::default()) as Arc<dyn Subscribe>],
    );

    let mut dropped = 0;
    for n in 0..20 {
        let path = if n % 7 == 0 {
            format!("notes-{n}.txt")
        } else {
            format!("photo-{n}.jpg")
        };
        if !queue.try_enqueue(path) {
            dropped += 1;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    println!("queued with {dropped} dropped; {} still buffered", queue.len());

    pool.shutdown().await?;
    println!(
        "rendered {} thumbnails; queue {:?}",
        thumbnailer.rendered.load(Ordering::Relaxed),
        queue.state()
    );
    Ok(())
}
