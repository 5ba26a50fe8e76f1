//! Framework bridge example
//!
//! Routes the `log` facade and `tracing` events into the same dispatcher.
//!
//! Run with: cargo run --example framework_bridges

use neurallog::adapters::{LogBridge, NeuralLogLayer};
use neurallog::prelude::*;
use neurallog::transports::ConsoleTransport;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;

fn main() -> Result<()> {
    println!("=== NeuralLog - Framework Bridges Example ===\n");

    let transport: Arc<dyn Transport> = Arc::new(ConsoleTransport::new());
    let registry = LoggerRegistry::with_config(
        SharedTransport(transport),
        EffectiveConfig::builder()
            .log_level("bridges", LogLevel::Debug)
            .build(),
    );
    let dispatcher = registry.get_or_create("bridges")?;

    println!("1. log facade:");
    LogBridge::init(Arc::clone(&dispatcher))?;
    log::info!(target: "app::db", "connection pool ready");
    log::debug!("cache warmed with {} entries", 128);
    log::trace!("below the threshold (hidden)");
    dispatcher.flush(DEFAULT_SHUTDOWN_TIMEOUT);

    println!("\n2. tracing layer:");
    let subscriber = tracing_subscriber::registry().with(NeuralLogLayer::new(Arc::clone(&dispatcher)));
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(user = "alice", "signed in");
        tracing::warn!(attempts = 3, "rate limit close");
    });
    dispatcher.flush(DEFAULT_SHUTDOWN_TIMEOUT);

    println!("\n3. Native records through the shared adapter:");
    let record = NativeRecord::new("legacy.Service", SourceLevel::Jul(900), "disk almost full")
        .with_field("free_mb", 512);
    RecordAdapter.forward(&dispatcher, &record);
    dispatcher.flush(DEFAULT_SHUTDOWN_TIMEOUT);

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
