//! Setting values and their wire encoding
//!
//! Values travel through the crate as a [`SettingValue`], which records the
//! shape the caller supplied. Two encoders exist:
//!
//! - [`encode_value`] turns any `SettingValue` into bytes by shape and
//!   magnitude alone. Integers above 255 are treated as packed RGB.
//! - [`ParameterValueType::encode`] checks a value against a declared
//!   parameter type first and always emits that type's wire width.

use crate::error::{IntercomError, Result};
use crate::types::ParameterDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A value destined for (or observed on) a device setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// On/off
    Bool(bool),

    /// Integer; values above 255 are packed 24-bit RGB
    Int(u32),

    /// Raw bytes, sent as-is
    Bytes(Vec<u8>),

    /// A level addressed to one bus/channel
    Bus {
        /// Bus or channel selector
        bus: u8,
        /// Level for that bus
        value: u8,
    },
}

impl SettingValue {
    /// Convert an untyped JSON value
    ///
    /// Booleans, non-negative integers and arrays of non-negative integers
    /// are accepted (array elements are truncated to their low byte), as is
    /// a `{ "bus": n, "value": n }` object. Anything else is rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(SettingValue::Bool(*b)),
            Value::Number(n) => n
                .as_u64()
                .map(|v| SettingValue::Int((v & 0xFFFF_FFFF) as u32))
                .ok_or_else(|| IntercomError::UnsupportedValueType(format!("number {}", n))),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64().map(|v| (v & 0xFF) as u8).ok_or_else(|| {
                        IntercomError::UnsupportedValueType(format!("array element {}", item))
                    })
                })
                .collect::<Result<Vec<u8>>>()
                .map(SettingValue::Bytes),
            Value::Object(map) => {
                let bus = map.get("bus").and_then(Value::as_u64);
                let level = map.get("value").and_then(Value::as_u64);
                match (bus, level) {
                    (Some(bus), Some(level)) if map.len() == 2 => Ok(SettingValue::Bus {
                        bus: (bus & 0xFF) as u8,
                        value: (level & 0xFF) as u8,
                    }),
                    _ => Err(IntercomError::UnsupportedValueType("object".to_string())),
                }
            }
            Value::String(_) => Err(IntercomError::UnsupportedValueType("string".to_string())),
            Value::Null => Err(IntercomError::UnsupportedValueType("null".to_string())),
        }
    }

    /// Short name of the value's shape, for messages
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "boolean",
            SettingValue::Int(_) => "integer",
            SettingValue::Bytes(_) => "bytes",
            SettingValue::Bus { .. } => "bus value",
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<u8> for SettingValue {
    fn from(value: u8) -> Self {
        SettingValue::Int(value as u32)
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        SettingValue::Int(value)
    }
}

impl From<Vec<u8>> for SettingValue {
    fn from(value: Vec<u8>) -> Self {
        SettingValue::Bytes(value)
    }
}

/// Split a packed 0xRRGGBB value into its bytes, red first
pub fn split_rgb(packed: u32) -> [u8; 3] {
    [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]
}

/// Pack red, green and blue into 0xRRGGBB
pub fn pack_rgb(red: u8, green: u8, blue: u8) -> u32 {
    ((red as u32) << 16) | ((green as u32) << 8) | blue as u32
}

/// Encode a value by its shape alone
pub fn encode_value(value: &SettingValue) -> Vec<u8> {
    match value {
        SettingValue::Bool(b) => vec![*b as u8],
        SettingValue::Int(v) if *v <= 0xFF => vec![*v as u8],
        SettingValue::Int(v) => split_rgb(*v).to_vec(),
        SettingValue::Bytes(bytes) => bytes.clone(),
        SettingValue::Bus { bus, value } => vec![*bus, *value],
    }
}

/// Declared type of a device parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterValueType {
    Boolean,
    Uint8,
    Enum,
    Rgb,
    BusIndexed,
}

impl ParameterValueType {
    /// Parse a type name as it appears in schema files
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Some(ParameterValueType::Boolean),
            "uint8" | "u8" | "int" | "integer" | "number" => Some(ParameterValueType::Uint8),
            "enum" | "enumerated" => Some(ParameterValueType::Enum),
            "rgb" | "color" | "colour" => Some(ParameterValueType::Rgb),
            "busindexed" | "bus" => Some(ParameterValueType::BusIndexed),
            _ => None,
        }
    }

    /// Number of value bytes this type occupies on the wire
    pub fn wire_len(self) -> usize {
        match self {
            ParameterValueType::Boolean | ParameterValueType::Uint8 | ParameterValueType::Enum => 1,
            ParameterValueType::Rgb => 3,
            ParameterValueType::BusIndexed => 2,
        }
    }

    /// Validate `value` against `descriptor` and encode it
    pub fn encode(self, descriptor: &ParameterDescriptor, value: &SettingValue) -> Result<Vec<u8>> {
        let mismatch = || {
            IntercomError::invalid_value(
                &descriptor.name,
                format!("expected {}, got {}", self, value.kind()),
            )
        };

        match (self, value) {
            (ParameterValueType::Boolean, SettingValue::Bool(b)) => Ok(vec![*b as u8]),
            (ParameterValueType::Uint8, SettingValue::Int(v)) => {
                let v = descriptor.check_range(*v)?;
                Ok(vec![v])
            }
            (ParameterValueType::Enum, SettingValue::Int(v)) => {
                if descriptor.choices.iter().any(|c| c.id as u32 == *v) {
                    Ok(vec![*v as u8])
                } else {
                    Err(IntercomError::invalid_value(
                        &descriptor.name,
                        format!("{} is not one of the declared choices", v),
                    ))
                }
            }
            (ParameterValueType::Rgb, SettingValue::Int(v)) => {
                if *v > 0xFF_FFFF {
                    return Err(IntercomError::invalid_value(
                        &descriptor.name,
                        format!("{:#x} does not fit in 24-bit RGB", v),
                    ));
                }
                Ok(split_rgb(*v).to_vec())
            }
            (ParameterValueType::Rgb, SettingValue::Bytes(bytes)) => {
                if bytes.len() != 3 {
                    return Err(IntercomError::invalid_value(
                        &descriptor.name,
                        format!("RGB needs 3 bytes, got {}", bytes.len()),
                    ));
                }
                Ok(bytes.clone())
            }
            (ParameterValueType::BusIndexed, SettingValue::Bus { bus, value }) => {
                let level = descriptor.check_range(*value as u32)?;
                Ok(vec![*bus, level])
            }
            _ => Err(mismatch()),
        }
    }
}

impl fmt::Display for ParameterValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterValueType::Boolean => "boolean",
            ParameterValueType::Uint8 => "uint8",
            ParameterValueType::Enum => "enum",
            ParameterValueType::Rgb => "rgb",
            ParameterValueType::BusIndexed => "busIndexed",
        };
        f.write_str(name)
    }
}
