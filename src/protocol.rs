//! Wire format for command packets and discovery probes
//!
//! Every command packet is laid out as:
//!
//! ```text
//! FF FF 00 <len_lo> 07 E1 00 00 <16-byte identity block>   header (24 bytes)
//! 5A <cmdId> [00] [bodyLen] [settingId] <value bytes...>    body
//! <crc8>                                                   trailer
//! ```
//!
//! `len_lo` is the low byte of the whole packet length. The `00` after the
//! command id is present only for the mic-pre-bus command. The checksum is
//! CRC-8/DVB-S2 computed over the body.

use crate::error::{IntercomError, Result};

/// Packet sync bytes
pub const SYNC: [u8; 2] = [0xFF, 0xFF];

/// Protocol/version tag following the length byte
pub const PROTOCOL_TAG: [u8; 4] = [0x07, 0xE1, 0x00, 0x00];

/// Identity block closing the header
pub const IDENTITY_BLOCK: [u8; 16] = *b"StudioTechnology";

/// Fixed header size
pub const HEADER_LEN: usize = 24;

/// First byte of every payload body
pub const PAYLOAD_MARKER: u8 = 0x5A;

/// Command whose data always starts with a bus/channel selector byte
pub const MIC_PRE_BUS_COMMAND: u8 = 0x0B;

/// Parameterless request for the full settings dump
pub const GET_ALL_SETTINGS_COMMAND: u8 = 0x01;

/// Parameterless factory reset
pub const RESET_COMMAND: u8 = 0x02;

/// Service name carried by the discovery probe
pub const DISCOVERY_SERVICE: &str = "Studio-Technologies-Discovery";

const CRC8_POLY: u8 = 0xD5;
const DISCOVERY_LENGTH_BYTE: u8 = 0x20;

/// CRC-8/DVB-S2 (poly 0xD5, init 0x00, no reflection, no final XOR)
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Build the 24-byte header for a packet of `total_length` bytes
///
/// Only the low byte of the length is transmitted; longer packets wrap.
pub fn build_header(total_length: usize) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..2].copy_from_slice(&SYNC);
    header[2] = 0x00;
    header[3] = (total_length & 0xFF) as u8;
    header[4..8].copy_from_slice(&PROTOCOL_TAG);
    header[8..].copy_from_slice(&IDENTITY_BLOCK);
    header
}

/// Build the payload body (without checksum)
pub fn build_payload(
    command_id: u8,
    setting_id: Option<u8>,
    value: &[u8],
    include_length: bool,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(1 + value.len());
    if let Some(id) = setting_id {
        data.push(id);
    }
    data.extend_from_slice(value);

    let mut body = Vec::with_capacity(4 + data.len());
    body.push(PAYLOAD_MARKER);
    body.push(command_id);
    if command_id == MIC_PRE_BUS_COMMAND {
        body.push(0x00);
    }
    if include_length {
        // Counts the data block plus the trailing checksum
        body.push(((data.len() + 1) & 0xFF) as u8);
    }
    body.extend_from_slice(&data);
    body
}

/// Assemble a complete packet: header, body and checksum trailer
pub fn build_packet(
    command_id: u8,
    setting_id: Option<u8>,
    value: &[u8],
    include_length: bool,
) -> Vec<u8> {
    let body = build_payload(command_id, setting_id, value, include_length);
    let total = HEADER_LEN + body.len() + 1;

    let mut packet = Vec::with_capacity(total);
    packet.extend_from_slice(&build_header(total));
    packet.extend_from_slice(&body);
    packet.push(crc8(&body));
    packet
}

/// The fixed discovery probe datagram
pub fn discovery_probe() -> Vec<u8> {
    let mut probe = Vec::with_capacity(8 + DISCOVERY_SERVICE.len() + 1);
    probe.extend_from_slice(&SYNC);
    probe.push(0x00);
    probe.push(DISCOVERY_LENGTH_BYTE);
    probe.extend_from_slice(&PROTOCOL_TAG);
    probe.extend_from_slice(DISCOVERY_SERVICE.as_bytes());
    probe.push(0x00);
    probe
}

/// Check a received frame's sync bytes, length byte and checksum
///
/// Returns the body without its checksum trailer.
pub fn verify_frame(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < HEADER_LEN + 2 {
        return Err(IntercomError::InvalidPacket(format!(
            "frame too short ({} bytes)",
            frame.len()
        )));
    }
    if frame[..2] != SYNC {
        return Err(IntercomError::InvalidPacket("missing sync bytes".to_string()));
    }
    if frame[3] != (frame.len() & 0xFF) as u8 {
        return Err(IntercomError::InvalidPacket(format!(
            "length byte {:#04x} does not match frame length {}",
            frame[3],
            frame.len()
        )));
    }

    let (body, trailer) = frame[HEADER_LEN..].split_at(frame.len() - HEADER_LEN - 1);
    let expected = crc8(body);
    if trailer[0] != expected {
        return Err(IntercomError::InvalidPacket(format!(
            "checksum {:#04x}, expected {:#04x}",
            trailer[0], expected
        )));
    }
    Ok(body)
}

/// A single command ready to be framed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    command_id: u8,
    setting_id: Option<u8>,
    value: Vec<u8>,
    include_length: bool,
}

impl Command {
    /// Create a command for the given command id
    pub fn new(command_id: u8) -> Self {
        Self {
            command_id,
            setting_id: None,
            value: Vec::new(),
            include_length: true,
        }
    }

    /// Request every setting from the device
    pub fn get_all_settings() -> Self {
        Self::new(GET_ALL_SETTINGS_COMMAND).without_length()
    }

    /// Reset the device to factory settings
    pub fn reset() -> Self {
        Self::new(RESET_COMMAND).without_length()
    }

    /// Address a setting within the command
    pub fn with_setting(mut self, setting_id: u8) -> Self {
        self.setting_id = Some(setting_id);
        self
    }

    /// Attach encoded value bytes
    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = value.into();
        self
    }

    /// Omit the body-length byte
    pub fn without_length(mut self) -> Self {
        self.include_length = false;
        self
    }

    /// Get the command id
    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    /// Get the setting id, if any
    pub fn setting_id(&self) -> Option<u8> {
        self.setting_id
    }

    /// Frame the command into wire bytes
    pub fn encode(&self) -> Vec<u8> {
        build_packet(
            self.command_id,
            self.setting_id,
            &self.value,
            self.include_length,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc8_known_values() {
        assert_eq!(crc8(&[]), 0x00);
        assert_eq!(crc8(&[0x00]), 0x00);
        assert_eq!(crc8(&[0x01]), 0xD5);
        assert_eq!(crc8(&[0xFF]), 0xF9);
        assert_eq!(crc8(b"123456789"), 0xBC);
        assert_eq!(crc8(&[0x5A, 0x07, 0x01, 0x10]), 0xCE);
    }

    #[test]
    fn header_layout() {
        let header = build_header(30);
        assert_eq!(&header[..8], &[0xFF, 0xFF, 0x00, 30, 0x07, 0xE1, 0x00, 0x00]);
        assert_eq!(&header[8..], b"StudioTechnology");
    }

    #[test]
    fn header_length_wraps_to_low_byte() {
        assert_eq!(build_header(255)[3], 0xFF);
        assert_eq!(build_header(256)[3], 0x00);
        assert_eq!(build_header(300)[3], 0x2C);
    }

    #[test]
    fn talkback_toggle_payload() {
        let body = build_payload(13, Some(0x0A), &[0x01], true);
        assert_eq!(body, vec![0x5A, 0x0D, 0x03, 0x0A, 0x01]);

        let packet = build_packet(13, Some(0x0A), &[0x01], true);
        assert_eq!(packet.len(), 30);
        assert_eq!(packet[3], 30);
        assert_eq!(&packet[HEADER_LEN..], &[0x5A, 0x0D, 0x03, 0x0A, 0x01, 0xFF]);
    }

    #[test]
    fn mic_pre_bus_inserts_channel_byte() {
        for setting in [0x00u8, 0x01, 0x07] {
            let body = build_payload(MIC_PRE_BUS_COMMAND, Some(setting), &[0x20], true);
            assert_eq!(body, vec![0x5A, MIC_PRE_BUS_COMMAND, 0x00, 0x03, setting, 0x20]);
        }

        let plain = build_payload(0x0C, Some(0x01), &[0x20], true);
        assert_eq!(plain, vec![0x5A, 0x0C, 0x03, 0x01, 0x20]);
    }

    #[test]
    fn parameterless_commands_have_no_length_or_data() {
        let packet = Command::get_all_settings().encode();
        assert_eq!(&packet[HEADER_LEN..], &[0x5A, 0x01, crc8(&[0x5A, 0x01])]);
        assert_eq!(packet[3] as usize, HEADER_LEN + 3);

        let reset = Command::reset().encode();
        assert_eq!(&reset[HEADER_LEN..HEADER_LEN + 2], &[0x5A, RESET_COMMAND]);
        assert_eq!(reset.len(), HEADER_LEN + 3);
    }

    #[test]
    fn length_byte_tracks_total_length() {
        for value_len in [0usize, 1, 3, 100, 240] {
            let value = vec![0xAB; value_len];
            let packet = build_packet(0x20, Some(0x01), &value, true);
            assert_eq!(packet[3], (packet.len() & 0xFF) as u8);
        }
    }

    #[test]
    fn discovery_probe_bytes() {
        let probe = discovery_probe();
        assert_eq!(&probe[..8], &[0xFF, 0xFF, 0x00, 0x20, 0x07, 0xE1, 0x00, 0x00]);
        assert_eq!(&probe[8..probe.len() - 1], b"Studio-Technologies-Discovery");
        assert_eq!(probe.last(), Some(&0x00));
    }

    #[test]
    fn verify_frame_accepts_built_packets() {
        let packet = Command::new(13).with_setting(0x0A).with_value([0x01]).encode();
        let body = verify_frame(&packet).unwrap();
        assert_eq!(body, &[0x5A, 0x0D, 0x03, 0x0A, 0x01]);
    }

    #[test]
    fn verify_frame_rejects_corruption() {
        let mut packet = Command::new(13).with_setting(0x0A).with_value([0x01]).encode();
        let last = packet.len() - 1;
        packet[last] ^= 0x01;
        assert!(matches!(
            verify_frame(&packet),
            Err(IntercomError::InvalidPacket(_))
        ));

        assert!(verify_frame(&[0xFF, 0xFF, 0x00]).is_err());

        let mut unsynced = Command::reset().encode();
        unsynced[0] = 0x00;
        assert!(verify_frame(&unsynced).is_err());
    }
}
