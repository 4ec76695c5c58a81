//! Cachefront demo
//!
//! Runs a short read-through walkthrough against the configured default
//! driver.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cachefront::{Cache, Config, Driver};

const KEY: &str = "hello-world";

/// Main entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Store, read and forget a value
/// 4. Fill the key through `remember`, then show a second `remember` is a hit
/// 5. Clean up
fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cachefront=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: driver={}, prefix={:?}, path={}",
        config.default_driver,
        config.prefix,
        config.path.display()
    );

    let cache = Cache::new(config);
    let driver = cache
        .default_driver()
        .context("failed to load the default cache driver")?;
    info!("Using the {} driver", driver.kind());

    driver.set_default(KEY, "Hello World!")?;
    println!("{}", driver.get(KEY, String::new)?);

    driver.forget(KEY)?;

    let greeting: String =
        driver.remember_default(KEY, || "Well, hello to you world!".to_string())?;
    println!("{}", greeting);

    // Already cached, so this closure never runs
    let greeting: String = driver.remember_default(KEY, || {
        "This should not show up, because the cache exists".to_string()
    })?;
    println!("{}", greeting);

    driver.forget(KEY)?;
    info!("Demo complete");

    Ok(())
}
