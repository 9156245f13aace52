//! One command, one socket, one reply
//!
//! The protocol has no transaction id. A reply is matched to a command only
//! by arriving on that command's socket before the timer fires, so a late
//! reply to an earlier, timed-out command can be taken as the ACK for a
//! newer one. Callers must serialize commands per device address.

use crate::config::TransportConfig;
use crate::error::{IntercomError, Result};
use crate::protocol::{self, Command};
use crate::types::ModelName;
use crate::value::{encode_value, SettingValue};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const MAX_DATAGRAM: usize = 2048;

/// Everything needed to send one command to one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub model: ModelName,
    pub command_id: u8,
    pub setting_id: Option<u8>,
    pub value: Option<SettingValue>,
    pub dest: IpAddr,
    pub include_length: bool,
}

impl CommandRequest {
    /// Create a request carrying a body-length byte and no data
    pub fn new(model: impl Into<ModelName>, command_id: u8, dest: IpAddr) -> Self {
        Self {
            model: model.into(),
            command_id,
            setting_id: None,
            value: None,
            dest,
            include_length: true,
        }
    }

    /// Address a setting
    pub fn with_setting(mut self, setting_id: u8) -> Self {
        self.setting_id = Some(setting_id);
        self
    }

    /// Attach a value
    pub fn with_value(mut self, value: SettingValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Omit the body-length byte
    pub fn without_length(mut self) -> Self {
        self.include_length = false;
        self
    }

    /// Frame the request into wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut command = Command::new(self.command_id);
        if let Some(id) = self.setting_id {
            command = command.with_setting(id);
        }
        if let Some(value) = &self.value {
            command = command.with_value(encode_value(value));
        }
        if !self.include_length {
            command = command.without_length();
        }
        command.encode()
    }
}

/// Something that can deliver a command and hand back the raw reply
pub trait CommandSender: Send + Sync {
    fn send_await_ack(&self, request: CommandRequest) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Sends commands over UDP and waits for a single reply
#[derive(Debug, Clone, Default)]
pub struct Transactor {
    config: TransportConfig,
}

impl Transactor {
    /// Create a transactor with default port and timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transactor with explicit settings
    pub fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Send a command and return the first datagram that comes back
    ///
    /// # Example
    ///
    /// ```no_run
    /// use studio_intercom::{CommandRequest, SettingValue, Transactor};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let transactor = Transactor::new();
    ///     let request = CommandRequest::new("Model209", 13, "192.168.1.20".parse()?)
    ///         .with_setting(0x0A)
    ///         .with_value(SettingValue::Bool(true));
    ///     let ack = transactor.send_await_ack(request).await?;
    ///     println!("ACK: {} byte(s)", ack.len());
    ///     Ok(())
    /// }
    /// ```
    pub async fn send_await_ack(&self, request: CommandRequest) -> Result<Vec<u8>> {
        self.exchange(request).await
    }

    async fn exchange(&self, request: CommandRequest) -> Result<Vec<u8>> {
        let packet = request.encode();
        let addr = SocketAddr::new(request.dest, self.config.port);
        self.transact(&request.model, addr, &packet).await
    }

    /// Ask a device for all of its settings
    pub async fn request_all_settings(&self, model: &str, dest: IpAddr) -> Result<Vec<u8>> {
        let packet = Command::get_all_settings().encode();
        self.transact(model, SocketAddr::new(dest, self.config.port), &packet)
            .await
    }

    /// Reset a device to factory settings
    pub async fn reset_device(&self, model: &str, dest: IpAddr) -> Result<Vec<u8>> {
        let packet = Command::reset().encode();
        self.transact(model, SocketAddr::new(dest, self.config.port), &packet)
            .await
    }

    /// Send pre-framed bytes and wait for one reply
    ///
    /// The socket is owned by this call and dropped on every return path.
    pub async fn transact(&self, model: &str, addr: SocketAddr, packet: &[u8]) -> Result<Vec<u8>> {
        let socket = UdpSocket::bind((self.config.bind_addr, 0)).await?;

        tracing::debug!("Sending to {} at {}: {}", model, addr, hex::encode(packet));
        socket.send_to(packet, addr).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        match timeout(self.config.ack_timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                buf.truncate(len);
                tracing::debug!("Reply from {}: {}", from, hex::encode(&buf));
                if let Err(e) = protocol::verify_frame(&buf) {
                    tracing::trace!("Reply from {} is not a checked frame: {}", from, e);
                }
                Ok(buf)
            }
            Ok(Err(e)) => {
                tracing::warn!("Socket error waiting for {} at {}: {}", model, addr, e);
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(
                    "No ACK from {} at {} within {:?}",
                    model,
                    addr,
                    self.config.ack_timeout
                );
                Err(IntercomError::Timeout {
                    model: model.to_string(),
                    addr,
                })
            }
        }
    }
}

impl CommandSender for Transactor {
    fn send_await_ack(&self, request: CommandRequest) -> impl Future<Output = Result<Vec<u8>>> + Send {
        self.exchange(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HEADER_LEN;

    #[test]
    fn request_encoding_matches_codec() {
        let dest: IpAddr = "10.0.0.9".parse().unwrap();
        let request = CommandRequest::new("Model209", 13, dest)
            .with_setting(0x0A)
            .with_value(SettingValue::Bool(true));
        let packet = request.encode();
        assert_eq!(packet, protocol::build_packet(13, Some(0x0A), &[0x01], true));
        assert_eq!(&packet[HEADER_LEN + 2..HEADER_LEN + 5], &[0x03, 0x0A, 0x01]);
    }

    #[test]
    fn request_without_length_or_setting() {
        let dest: IpAddr = "10.0.0.9".parse().unwrap();
        let packet = CommandRequest::new("Model209", protocol::GET_ALL_SETTINGS_COMMAND, dest)
            .without_length()
            .encode();
        assert_eq!(packet, Command::get_all_settings().encode());
    }

    #[test]
    fn packed_color_value_becomes_three_bytes() {
        let dest: IpAddr = "10.0.0.9".parse().unwrap();
        let packet = CommandRequest::new("Model5205", 0x21, dest)
            .with_setting(0x01)
            .with_value(SettingValue::Int(0xFF8000))
            .encode();
        assert_eq!(
            &packet[HEADER_LEN..packet.len() - 1],
            &[0x5A, 0x21, 0x05, 0x01, 0xFF, 0x80, 0x00]
        );
    }
}
