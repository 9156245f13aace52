use crate::error::{IntercomError, Result};
use crate::value::{ParameterValueType, SettingValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Device model name (e.g. "Model209")
pub type ModelName = String;

/// Presentation hint for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiType {
    #[serde(rename = "static")]
    StaticText,
    #[serde(rename = "text")]
    TextInput,
    Dropdown,
    ColorPicker,
    Number,
    Checkbox,
}

impl UiType {
    /// The natural widget for a value type
    pub fn default_for(value_type: ParameterValueType) -> Self {
        match value_type {
            ParameterValueType::Boolean => UiType::Checkbox,
            ParameterValueType::Uint8 | ParameterValueType::BusIndexed => UiType::Number,
            ParameterValueType::Enum => UiType::Dropdown,
            ParameterValueType::Rgb => UiType::ColorPicker,
        }
    }

    /// Parse a UI type name as it appears in schema files
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "static" | "static-text" | "statictext" => Some(UiType::StaticText),
            "text" | "textinput" | "textinput-field" => Some(UiType::TextInput),
            "dropdown" | "select" => Some(UiType::Dropdown),
            "colorpicker" | "color" => Some(UiType::ColorPicker),
            "number" | "range" | "slider" => Some(UiType::Number),
            "checkbox" => Some(UiType::Checkbox),
            _ => None,
        }
    }
}

/// One entry of an enumerated parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Wire code
    pub id: u8,
    pub label: String,
}

/// Bounds for numeric parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: u8,
    pub max: u8,
    pub step: u8,
}

impl NumericRange {
    /// Full single-byte range
    pub const FULL: NumericRange = NumericRange {
        min: 0,
        max: 255,
        step: 1,
    };

    /// Whether `value` lies within the bounds
    pub fn contains(&self, value: u32) -> bool {
        value >= self.min as u32 && value <= self.max as u32
    }
}

/// A controllable or observable device value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    /// Setting name within the model
    pub name: String,

    /// Human-readable label
    pub label: String,

    /// Protocol command grouping this setting
    pub command_id: u8,

    /// Protocol setting identifier
    pub setting_id: u8,

    pub value_type: ParameterValueType,

    pub ui_type: UiType,

    /// Valid codes for enumerated parameters, in display order
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// Declared bounds for numeric parameters
    #[serde(default)]
    pub range: Option<NumericRange>,

    #[serde(default)]
    pub default: Option<SettingValue>,

    #[serde(default)]
    pub current: Option<SettingValue>,
}

impl ParameterDescriptor {
    /// Bounds used for numeric presentation and validation
    ///
    /// Returns `None` for types that are not numeric.
    pub fn numeric_range(&self) -> Option<NumericRange> {
        match self.value_type {
            ParameterValueType::Uint8 | ParameterValueType::BusIndexed => {
                Some(self.range.unwrap_or(NumericRange::FULL))
            }
            _ => None,
        }
    }

    /// Check a numeric value against the byte width and declared range
    pub fn check_range(&self, value: u32) -> Result<u8> {
        let range = self.range.unwrap_or(NumericRange::FULL);
        if value > 0xFF || !range.contains(value) {
            return Err(IntercomError::invalid_value(
                &self.name,
                format!("{} is outside {}..={}", value, range.min, range.max),
            ));
        }
        Ok(value as u8)
    }

    /// Validate and encode a value for this parameter
    pub fn encode(&self, value: &SettingValue) -> Result<Vec<u8>> {
        self.value_type.encode(self, value)
    }
}

/// Raw-command description of one setting, from a companion protocol file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    pub command_id: u8,
    pub parameter_id: Option<u8>,
    pub byte_length: Option<usize>,

    /// Valid wire codes with their meaning
    #[serde(default)]
    pub values: Vec<Choice>,

    /// Documented encodings, keyed by what they demonstrate
    #[serde(default)]
    pub examples: BTreeMap<String, String>,
}

/// Everything known about one hardware model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSchema {
    pub model: ModelName,

    /// Settable parameters, in file order
    pub settings: Vec<ParameterDescriptor>,

    /// Observable parameters, in file order
    pub feedbacks: Vec<ParameterDescriptor>,

    /// Raw-command descriptions merged from the companion file
    #[serde(default)]
    pub commands: BTreeMap<String, CommandSpec>,
}

impl DeviceSchema {
    /// Look up a setting by name
    pub fn setting(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.settings.iter().find(|p| p.name == name)
    }

    /// Look up a feedback by name
    pub fn feedback(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.feedbacks.iter().find(|p| p.name == name)
    }
}

/// A device found by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: ModelName,
    pub ip: IpAddr,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,

    /// Colon-separated, upper-case hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}
