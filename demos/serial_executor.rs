//! # Example: serial_executor
//!
//! Several producers submit actions to one [`SerialExecutor`]; the actions
//! run one at a time in submission order, then the executor is drained.
//!
//! Shows how to:
//! - Submit async and sync actions and await their [`Handle`]s.
//! - Observe that failures and panics stay inside their own handle.
//! - Shut down gracefully and see late submissions rejected.
//!
//! ## Flow
//! ```text
//! producer-{0,1,2} ──► submit() ──► worker (one at a time)
//!                                      ├─► publish(ItemStarting / ItemCompleted / ItemFailed)
//!                                      └─► LogWriter.on_event()
//! shutdown() ──► Draining ──► remaining items run ──► Stopped
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example serial_executor --features logging
//! ```

use std::{sync::Arc, time::Duration};

use taskline::{ExecutorConfig, LogWriter, SerialExecutor, Subscribe};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let exec = SerialExecutor::builder(ExecutorConfig {
        grace: Duration::from_secs(5),
        ..ExecutorConfig::named("ledger")
    })
    .with_subscribers(vec![Arc::new(LogWriter::default()) as Arc<dyn Subscribe>])
    .build();

    let mut producers = Vec::new();
    for p in 0..3u32 {
        let exec = exec.clone();
        producers.push(tokio::spawn(async move {
            let mut handles = Vec::new();
            for i in 0..3u32 {
                let handle = exec.submit(move || async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    println!("[producer-{p}] entry {i} applied");
                    Ok::<_, std::io::Error>(p * 10 + i)
                })?;
                handles.push(handle);
            }
            anyhow::Ok(handles)
        }));
    }

    let mut handles = Vec::new();
    for producer in producers {
        handles.extend(producer.await??);
    }

    let failing = exec.submit_sync(|| Err::<(), _>("insufficient funds"))?;
    let panicking = exec.submit_sync(|| -> Result<(), &'static str> { panic!("corrupt entry") })?;
    let after = exec.submit_sync(|| Ok::<_, &'static str>("still running"))?;

    for handle in handles {
        let id = handle.id();
        println!("item #{id} -> {}", handle.await?);
    }
    println!("failing  -> {:?}", failing.await);
    println!("panicked -> {:?}", panicking.await);
    println!("after    -> {:?}", after.await);

    exec.shutdown_and_wait().await?;
    println!("state after shutdown: {}", exec.state());

    if let Err(e) = exec.submit_sync(|| Ok::<_, &'static str>(())) {
        println!("late submission: {e}");
    }
    Ok(())
}
