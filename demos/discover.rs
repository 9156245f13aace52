//! Discover intercom devices and list the actions available for them
//!
//! Usage: `cargo run --example discover [SCHEMA_DIR] [WINDOW_MS]`

use std::time::Duration;
use studio_intercom::{Discovery, SchemaRegistry, TransportConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let schema_dir = args.next();
    let window = match args.next() {
        Some(ms) => Duration::from_millis(ms.parse()?),
        None => studio_intercom::DEFAULT_DISCOVERY_WINDOW,
    };

    let registry = match &schema_dir {
        Some(dir) => SchemaRegistry::load_dir(dir)?,
        None => SchemaRegistry::new(),
    };

    let config = TransportConfig::default().with_discovery_window(window);
    let devices = Discovery::with_config(config).discover().await;

    if devices.is_empty() {
        println!("No devices found");
        return Ok(());
    }

    for device in &devices {
        println!(
            "{:<12} {:<16} firmware {:<10} mac {}",
            device.model,
            device.ip,
            device.firmware.as_deref().unwrap_or("-"),
            device.mac.as_deref().unwrap_or("-"),
        );

        if let Some(schema) = registry.get(&device.model) {
            for setting in &schema.settings {
                println!(
                    "    {}:{}:{}  {} ({})",
                    schema.model, setting.command_id, setting.setting_id, setting.label, setting.value_type
                );
            }
        }
    }

    Ok(())
}
