//! audio-detect command line harness
//!
//! Starts monitoring on the default cpal host, prints the initial `find()`
//! result, then prints every `add` / `remove` event with a timestamp until
//! interrupted with Ctrl-C.
//!
//! - [`settings`]: monitor configuration loading

pub mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use audio_detect_cpal::CpalEnumerator;
use audio_detect_monitor::{AudioDevice, DeviceMonitor, Topic};
use chrono::Local;

/// Application entry point
///
/// Initializes logging via `tracing_subscriber` (enhanced in debug builds),
/// builds a multi-threaded tokio runtime and runs the monitor until Ctrl-C.
pub fn run() -> Result<()> {
    init_logging();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = settings::load(config_path.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let monitor = DeviceMonitor::new(CpalEnumerator::default_host(), config)?;

        monitor.on(Topic::Add, |device| print_event("add", &device));
        monitor.on(Topic::Remove, |device| print_event("remove", &device));
        monitor.on_error(|e| tracing::warn!("Monitor error: {}", e));

        monitor.start();

        match monitor.find().await {
            Ok(devices) => print_devices(&devices),
            Err(e) => tracing::error!("Failed to list devices: {}", e),
        }

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;

        monitor.shutdown().await;
        let stats = monitor.stats();
        tracing::info!(
            ticks = stats.ticks,
            failed = stats.failed_ticks,
            added = stats.devices_added,
            removed = stats.devices_removed,
            "Exiting"
        );
        Ok::<(), anyhow::Error>(())
    })
}

fn init_logging() {
    #[cfg(debug_assertions)]
    {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
        tracing::info!("Debug mode logging enabled");
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .compact()
            .init();
    }
}

fn print_devices(devices: &[AudioDevice]) {
    println!("{} find {} device(s)", timestamp(), devices.len());
    match serde_json::to_string_pretty(devices) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!("Failed to serialize device list: {}", e),
    }
}

fn print_event(event: &str, device: &AudioDevice) {
    println!("{} {} {}", timestamp(), event, device);
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}
