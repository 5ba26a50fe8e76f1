//! Basic dispatcher usage example
//!
//! Demonstrates per-log levels, structured data, context and error chains,
//! printed by the console transport instead of a remote server.
//!
//! Run with: cargo run --example basic_usage

use neurallog::prelude::*;
use neurallog::transports::ConsoleTransport;
use neurallog::{info, warn};
use std::sync::Arc;

#[derive(Debug, serde::Serialize)]
struct Order {
    id: u64,
    total: f64,
}

fn main() -> Result<()> {
    println!("=== NeuralLog - Basic Usage Example ===\n");

    let config = EffectiveConfig::builder()
        .namespace("demo")
        .log_level("checkout", LogLevel::Debug)
        .build();
    let transport: Arc<dyn Transport> = Arc::new(ConsoleTransport::new());
    let registry = LoggerRegistry::with_config(SharedTransport(transport), config);
    registry.set_global_context("service", "shop");

    let checkout = registry.get_or_create("checkout")?;
    let audit = registry.get_or_create("audit")?;

    println!("1. Level gate per log name (audit stays at INFO):");
    checkout.debug("checkout debug message (visible)");
    audit.debug("audit debug message (hidden)");
    audit.info("audit info message (visible)");
    registry.flush_all(DEFAULT_SHUTDOWN_TIMEOUT);

    println!("\n2. Structured data, MDC and persistent context:");
    checkout.context().set("region", "eu-west-1");
    {
        let _request = Mdc::scoped("request_id", "req-42");
        checkout.log_data(
            LogLevel::Info,
            "payment accepted",
            LogContext::new().with_field("amount", 99.5),
        );
    }
    checkout.log_object(LogLevel::Info, "order placed", &Order { id: 7, total: 99.5 });
    info!(checkout, "{} items shipped", 3);
    registry.flush_all(DEFAULT_SHUTDOWN_TIMEOUT);

    println!("\n3. Error chains:");
    let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "gateway unreachable");
    checkout.log_error(LogLevel::Error, "payment failed", &err);
    warn!(checkout, "retrying in {}s", 5);
    registry.flush_all(DEFAULT_SHUTDOWN_TIMEOUT);

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
