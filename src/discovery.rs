//! UDP broadcast discovery
//!
//! A probe is broadcast once, then every datagram arriving within the
//! window is parsed into a [`DeviceInfo`]. Reply payloads have no fixed
//! layout, so model, firmware and MAC are pulled out heuristically.

use crate::config::TransportConfig;
use crate::protocol::{self, SYNC};
use crate::types::DeviceInfo;
use regex::Regex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

const MAX_DATAGRAM: usize = 2048;
const PREAMBLE_LEN: usize = 8;
const MIN_TEXT_RUN: usize = 3;
const MAC_LEN: usize = 6;

/// Model name reported when a reply carries none
pub const UNKNOWN_MODEL: &str = "Unknown";

/// Discovery of intercom devices on the local network
///
/// # Example
///
/// ```no_run
/// use studio_intercom::Discovery;
///
/// #[tokio::main]
/// async fn main() {
///     let discovery = Discovery::new();
///     for device in discovery.discover().await {
///         println!("{} at {}", device.model, device.ip);
///     }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    config: TransportConfig,
}

impl Discovery {
    /// Create a discovery with the default port, window and broadcast address
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Discover for the configured window
    pub async fn discover(&self) -> Vec<DeviceInfo> {
        self.discover_for(self.config.discovery_window).await
    }

    /// Broadcast a probe and collect replies for `window`
    ///
    /// Never fails: socket errors end collection early and whatever was
    /// gathered so far is returned. Order is unspecified.
    pub async fn discover_for(&self, window: Duration) -> Vec<DeviceInfo> {
        let target = SocketAddr::new(self.config.broadcast_addr, self.config.port);
        tracing::info!("Discovering devices via {} for {:?}", target, window);

        let mut collector = DeviceCollector::default();
        if let Err(e) = self.collect(target, window, &mut collector).await {
            tracing::warn!("Discovery stopped early: {}", e);
        }

        let devices = collector.into_devices();
        tracing::info!("Discovery found {} device(s)", devices.len());
        devices
    }

    async fn collect(
        &self,
        target: SocketAddr,
        window: Duration,
        collector: &mut DeviceCollector,
    ) -> std::io::Result<()> {
        let socket = UdpSocket::bind((self.config.bind_addr, 0)).await?;
        socket.set_broadcast(true)?;
        socket.send_to(&protocol::discovery_probe(), target).await?;

        let deadline = Instant::now() + window;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => {
                    tracing::debug!("Discovery reply from {}: {}", from, hex::encode(&buf[..len]));
                    collector.ingest(from.ip(), &buf[..len]);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(()),
            }
        }
    }
}

/// Replies gathered so far, one per source address
#[derive(Debug, Default)]
pub(crate) struct DeviceCollector {
    devices: HashMap<IpAddr, DeviceInfo>,
}

impl DeviceCollector {
    /// Parse a reply; a later reply from the same address replaces the earlier one
    pub(crate) fn ingest(&mut self, ip: IpAddr, payload: &[u8]) {
        let info = parse_reply(ip, payload);
        if let Some(previous) = self.devices.insert(ip, info) {
            tracing::trace!("Replaced earlier reply from {} ({})", ip, previous.model);
        }
    }

    pub(crate) fn into_devices(self) -> Vec<DeviceInfo> {
        self.devices.into_values().collect()
    }
}

/// Extract what can be found in a discovery reply
pub fn parse_reply(ip: IpAddr, payload: &[u8]) -> DeviceInfo {
    let text = String::from_utf8_lossy(payload);

    let model = model_regex()
        .captures(&text)
        .map(|c| format!("Model{}", &c[1]))
        .unwrap_or_else(|| UNKNOWN_MODEL.to_string());

    DeviceInfo {
        model,
        ip,
        firmware: parse_firmware(&text),
        mac: parse_mac(&text, payload),
    }
}

fn model_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)model\s*-?\s*(\d+)").expect("valid model regex"))
}

fn firmware_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(v)?(\d+)\.(\d+)\.(\d+)").expect("valid firmware regex"))
}

fn mac_text_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([0-9A-Fa-f]{2})[:-]([0-9A-Fa-f]{2})[:-]([0-9A-Fa-f]{2})[:-]([0-9A-Fa-f]{2})[:-]([0-9A-Fa-f]{2})[:-]([0-9A-Fa-f]{2})\b")
            .expect("valid MAC regex")
    })
}

/// `v`-prefixed versions win over bare dotted triples
fn parse_firmware(text: &str) -> Option<String> {
    let mut bare = None;
    for caps in firmware_regex().captures_iter(text) {
        let version = format!("{}.{}.{}", &caps[2], &caps[3], &caps[4]);
        if caps.get(1).is_some() {
            return Some(version);
        }
        bare.get_or_insert(version);
    }
    bare
}

/// A MAC written out as text, else the first 6-byte binary run
fn parse_mac(text: &str, payload: &[u8]) -> Option<String> {
    if let Some(caps) = mac_text_regex().captures(text) {
        let octets: Vec<String> = (1..=MAC_LEN).map(|i| caps[i].to_ascii_uppercase()).collect();
        return Some(octets.join(":"));
    }
    binary_mac(payload).map(|mac| format_mac(&mac))
}

/// Scan for six consecutive bytes outside any text field
///
/// Printable runs of three or more characters (and the NUL ending them)
/// count as text. Windows of all 0x00 or all 0xFF are padding.
fn binary_mac(payload: &[u8]) -> Option<[u8; MAC_LEN]> {
    let body = if payload.starts_with(&SYNC) && payload.len() > PREAMBLE_LEN {
        &payload[PREAMBLE_LEN..]
    } else {
        payload
    };

    let mut is_text = vec![false; body.len()];
    let mut i = 0;
    while i < body.len() {
        let start = i;
        while i < body.len() && (0x20..=0x7E).contains(&body[i]) {
            i += 1;
        }
        if i - start >= MIN_TEXT_RUN {
            is_text[start..i].iter_mut().for_each(|t| *t = true);
            if i < body.len() && body[i] == 0x00 {
                is_text[i] = true;
                i += 1;
            }
        }
        if i == start {
            i += 1;
        }
    }

    let mut start = 0;
    while start < body.len() {
        if is_text[start] {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < body.len() && !is_text[end] {
            end += 1;
        }
        for candidate in body[start..end].windows(MAC_LEN) {
            let all_same = |b: u8| candidate.iter().all(|&c| c == b);
            if !all_same(0x00) && !all_same(0xFF) {
                let mut mac = [0u8; MAC_LEN];
                mac.copy_from_slice(candidate);
                return Some(mac);
            }
        }
        start = end;
    }
    None
}

fn format_mac(mac: &[u8]) -> String {
    mac.iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(":")
}
