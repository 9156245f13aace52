//! Rust library for controlling Studio Technologies networked intercom devices
//!
//! The devices speak a small binary protocol over UDP port 8700: a 24-byte
//! header, a command body, and a CRC-8/DVB-S2 trailer. Each command is
//! answered by a single ACK datagram. This library provides:
//!
//! - Broadcast discovery of devices on the local network
//! - Packet framing and checksums
//! - Loading per-model device schemas from JSON files
//! - Generic action and feedback tables built from those schemas
//! - Send-and-await-ACK transactions with a timeout
//!
//! # Quick Start
//!
//! ```no_run
//! use studio_intercom::{IntercomClient, SettingValue, TransportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = IntercomClient::load("schemas", TransportConfig::default())?;
//!
//!     let devices = client.discover().await;
//!     if let Some(device) = devices.iter().find(|d| d.model == "Model209") {
//!         for action in client.actions().for_model("Model209") {
//!             println!("{} -> {}", action.id(), action.label());
//!         }
//!         client
//!             .invoke("Model209:13:10", device.ip, SettingValue::Bool(true))
//!             .await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Sending raw commands
//!
//! ```no_run
//! use studio_intercom::{CommandRequest, SettingValue, Transactor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transactor = Transactor::new();
//!     let request = CommandRequest::new("Model209", 13, "192.168.1.20".parse()?)
//!         .with_setting(0x0A)
//!         .with_value(SettingValue::Bool(true));
//!     transactor.send_await_ack(request).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Concurrency
//!
//! Every transaction owns its socket and timer, so calls may run
//! concurrently. The protocol carries no transaction id, however: a reply
//! is simply the first datagram to reach the socket. Serialize commands to
//! any one device, or a late ACK may be credited to the wrong command.
//!
//! # Architecture
//!
//! - **Protocol**: packet header, payload and checksum
//! - **Value**: typed and raw value encoding
//! - **Schema**: per-model schema loading and normalization
//! - **Actions / Feedbacks**: generic tables built from schemas
//! - **Transactor**: one UDP send/receive exchange per command
//! - **Discovery**: UDP broadcast probe and reply parsing
//! - **Client**: ties the above together

mod actions;
mod client;
mod config;
mod discovery;
mod error;
mod feedbacks;
pub mod protocol;
mod schema;
mod state;
mod transactor;
mod types;
mod value;

// Public exports
pub use actions::{build_action_table, entry_id, ActionEntry, ActionTable};
pub use client::IntercomClient;
pub use config::{TransportConfig, DEFAULT_ACK_TIMEOUT, DEFAULT_DISCOVERY_WINDOW, DEFAULT_PORT};
pub use discovery::{parse_reply, Discovery, UNKNOWN_MODEL};
pub use error::{IntercomError, Result};
pub use feedbacks::{build_feedback_table, FeedbackEntry, FeedbackTable};
pub use schema::{is_companion_file, SchemaRegistry};
pub use state::DeviceState;
pub use transactor::{CommandRequest, CommandSender, Transactor};
pub use types::{
    Choice, CommandSpec, DeviceInfo, DeviceSchema, ModelName, NumericRange, ParameterDescriptor,
    UiType,
};
pub use value::{encode_value, pack_rgb, split_rgb, ParameterValueType, SettingValue};
