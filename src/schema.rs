//! Loading per-model device schemas from a directory
//!
//! A directory holds one UI schema per model (`Model209.json`) and,
//! optionally, a raw-command companion for it (`Model209_protocol.json` or
//! `Model209.protocol.json`). Companions never register a model of their
//! own; their command descriptions are merged into the matching UI schema.
//!
//! Loading is all-or-nothing: any malformed file aborts the whole load.

use crate::error::{IntercomError, Result};
use crate::types::{Choice, CommandSpec, DeviceSchema, ModelName, NumericRange, ParameterDescriptor, UiType};
use crate::value::{ParameterValueType, SettingValue};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const COMPANION_SUFFIXES: [&str; 2] = ["_protocol.json", ".protocol.json"];

/// Loaded device schemas, keyed by model name
///
/// Built once, then only read.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<ModelName, DeviceSchema>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from already-normalized schemas
    ///
    /// A later schema with the same model replaces an earlier one.
    pub fn from_schemas(schemas: impl IntoIterator<Item = DeviceSchema>) -> Self {
        let schemas = schemas
            .into_iter()
            .map(|schema| (schema.model.clone(), schema))
            .collect();
        Self { schemas }
    }

    /// Load every schema file in `dir`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use studio_intercom::SchemaRegistry;
    ///
    /// let registry = SchemaRegistry::load_dir("schemas")?;
    /// for model in registry.models() {
    ///     println!("{}", model);
    /// }
    /// # Ok::<(), studio_intercom::IntercomError>(())
    /// ```
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tracing::info!("Loading device schemas from {}", dir.display());

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_json_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let (companions, ui_files): (Vec<PathBuf>, Vec<PathBuf>) =
            paths.into_iter().partition(|p| is_companion_file(p));

        let mut commands: BTreeMap<ModelName, BTreeMap<String, CommandSpec>> = BTreeMap::new();
        for path in &companions {
            let (model, specs) = load_companion(path)?;
            tracing::debug!("Loaded {} raw command(s) for {} from {}", specs.len(), model, path.display());
            commands.entry(model).or_default().extend(specs);
        }

        let mut schemas = BTreeMap::new();
        for path in &ui_files {
            let root = read_json(path)?;
            let model = model_name(path, &root)?;
            if schemas.contains_key(&model) {
                return Err(IntercomError::schema(
                    path,
                    format!("model {} is already defined by another file", model),
                ));
            }
            let schema = parse_schema(path, model.clone(), &root, commands.remove(&model))?;
            tracing::debug!(
                "Loaded {}: {} setting(s), {} feedback(s)",
                schema.model,
                schema.settings.len(),
                schema.feedbacks.len()
            );
            schemas.insert(model, schema);
        }

        for model in commands.keys() {
            tracing::warn!("Ignoring raw command file for {}: no matching UI schema", model);
        }

        tracing::info!("Loaded {} device schema(s)", schemas.len());
        Ok(Self { schemas })
    }

    /// Look up a model's schema
    pub fn get(&self, model: &str) -> Option<&DeviceSchema> {
        self.schemas.get(model)
    }

    /// Model names, sorted
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// All schemas, sorted by model
    pub fn iter(&self) -> impl Iterator<Item = &DeviceSchema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Whether a file name marks a raw-command companion file
pub fn is_companion_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| {
            let n = n.to_ascii_lowercase();
            COMPANION_SUFFIXES.iter().any(|suffix| n.ends_with(suffix))
        })
        .unwrap_or(false)
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn read_json(path: &Path) -> Result<Value> {
    let bytes = std::fs::read(path)?;
    let root: Value = serde_json::from_slice(&bytes)
        .map_err(|e| IntercomError::schema(path, format!("not valid JSON: {}", e)))?;
    if !root.is_object() {
        return Err(IntercomError::schema(path, "top level is not an object"));
    }
    Ok(root)
}

fn model_name(path: &Path, root: &Value) -> Result<ModelName> {
    root.get("model")
        .and_then(|v| v.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IntercomError::schema(path, "missing \"model\" field"))
}

fn load_companion(path: &Path) -> Result<(ModelName, BTreeMap<String, CommandSpec>)> {
    let root = read_json(path)?;
    let model = model_name(path, &root)?;

    let mut specs = BTreeMap::new();
    if let Some(commands) = root.get("commands") {
        let commands = commands
            .as_object()
            .ok_or_else(|| IntercomError::schema(path, "\"commands\" is not an object"))?;
        for (name, entry) in commands {
            let spec = parse_command_spec(entry)
                .map_err(|reason| IntercomError::schema(path, format!("command {}: {}", name, reason)))?;
            specs.insert(name.clone(), spec);
        }
    }
    Ok((model, specs))
}

fn parse_schema(
    path: &Path,
    model: ModelName,
    root: &Value,
    commands: Option<BTreeMap<String, CommandSpec>>,
) -> Result<DeviceSchema> {
    let commands = commands.unwrap_or_default();

    let settings = match root.get("settings").or_else(|| root.get("actions")) {
        Some(section) => parse_section(path, "settings", section, &commands)?,
        None => Vec::new(),
    };

    // Without an explicit feedback list every setting is observable
    let feedbacks = match root.get("feedbacks") {
        Some(section) => parse_section(path, "feedbacks", section, &commands)?,
        None => settings.clone(),
    };

    Ok(DeviceSchema {
        model,
        settings,
        feedbacks,
        commands,
    })
}

fn parse_section(
    path: &Path,
    section_name: &str,
    section: &Value,
    commands: &BTreeMap<String, CommandSpec>,
) -> Result<Vec<ParameterDescriptor>> {
    let section = section
        .as_object()
        .ok_or_else(|| IntercomError::schema(path, format!("\"{}\" is not an object", section_name)))?;

    section
        .iter()
        .map(|(name, entry)| {
            parse_descriptor(name, entry, commands.get(name)).map_err(|reason| {
                IntercomError::schema(path, format!("{} {}: {}", section_name, name, reason))
            })
        })
        .collect()
}

/// Normalize one parameter entry, filling gaps from its raw-command spec
pub(crate) fn parse_descriptor(
    name: &str,
    entry: &Value,
    command: Option<&CommandSpec>,
) -> std::result::Result<ParameterDescriptor, String> {
    let obj = entry.as_object().ok_or("entry is not an object")?;

    let type_name = str_field(obj, &["type", "valueType"]).ok_or("missing \"type\"")?;
    let value_type = ParameterValueType::parse(type_name)
        .ok_or_else(|| format!("unknown value type \"{}\"", type_name))?;

    let command_id = match obj.get("commandId") {
        Some(v) => byte_id(v).ok_or("invalid \"commandId\"")?,
        None => command.map(|c| c.command_id).ok_or("no command id")?,
    };

    let setting_id = match obj.get("settingId").or_else(|| obj.get("parameterId")) {
        Some(v) => byte_id(v).ok_or("invalid \"settingId\"")?,
        None => command.and_then(|c| c.parameter_id).ok_or("no setting id")?,
    };

    if let Some(expected) = command.and_then(|c| c.byte_length) {
        if expected != value_type.wire_len() {
            return Err(format!(
                "byte length {} does not match {} ({} byte(s))",
                expected,
                value_type,
                value_type.wire_len()
            ));
        }
    }

    let ui_type = match str_field(obj, &["uiType"]) {
        Some(name) => UiType::parse(name).ok_or_else(|| format!("unknown UI type \"{}\"", name))?,
        None => UiType::default_for(value_type),
    };

    let mut choices = match obj.get("choices") {
        Some(v) => parse_choices(v)?,
        None => Vec::new(),
    };
    if choices.is_empty() {
        if let Some(command) = command {
            choices = command.values.clone();
        }
    }
    if value_type == ParameterValueType::Enum && choices.is_empty() {
        return Err("enumerated parameter has no choices".to_string());
    }

    let range = parse_range(obj)?;

    let mut descriptor = ParameterDescriptor {
        name: name.to_string(),
        label: str_field(obj, &["label"]).unwrap_or(name).to_string(),
        command_id,
        setting_id,
        value_type,
        ui_type,
        choices,
        range,
        default: None,
        current: None,
    };
    descriptor.default = initial_value(&descriptor, "default", obj.get("default"))?;
    descriptor.current = initial_value(&descriptor, "current", obj.get("current"))?;
    Ok(descriptor)
}

/// Check a `default` or `current` value against the declared type
///
/// Text fields may carry string defaults, which are not wire values and are
/// left unset.
fn initial_value(
    descriptor: &ParameterDescriptor,
    field: &str,
    raw: Option<&Value>,
) -> std::result::Result<Option<SettingValue>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.is_string() && matches!(descriptor.ui_type, UiType::StaticText | UiType::TextInput) {
        return Ok(None);
    }
    let value = SettingValue::from_json(raw).map_err(|e| format!("invalid \"{}\": {}", field, e))?;
    descriptor
        .encode(&value)
        .map_err(|e| format!("invalid \"{}\": {}", field, e))?;
    Ok(Some(value))
}

fn parse_command_spec(entry: &Value) -> std::result::Result<CommandSpec, String> {
    let obj = entry.as_object().ok_or("entry is not an object")?;

    let command_id = obj
        .get("commandId")
        .and_then(byte_id)
        .ok_or("missing or invalid \"commandId\"")?;

    let parameter_id = match obj.get("parameterId").or_else(|| obj.get("settingId")) {
        Some(v) => Some(byte_id(v).ok_or("invalid \"parameterId\"")?),
        None => None,
    };

    let byte_length = match obj.get("byteLength") {
        Some(v) => Some(v.as_u64().ok_or("invalid \"byteLength\"")? as usize),
        None => None,
    };

    let values = match obj.get("values") {
        Some(v) => parse_choices(v)?,
        None => Vec::new(),
    };

    let examples = obj
        .get("examples")
        .and_then(|v| v.as_object())
        .map(|examples| {
            examples
                .iter()
                .map(|(k, v)| {
                    let text = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    (k.clone(), text)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(CommandSpec {
        command_id,
        parameter_id,
        byte_length,
        values,
        examples,
    })
}

/// Accepts `[{ "id": 0, "label": "Off" }, ...]` or `{ "0x00": "Off", ... }`
fn parse_choices(value: &Value) -> std::result::Result<Vec<Choice>, String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| -> std::result::Result<Choice, String> {
                let id = item
                    .get("id")
                    .and_then(byte_id)
                    .ok_or_else(|| format!("choice {} has no valid id", item))?;
                let label = item
                    .get("label")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| id.to_string());
                Ok(Choice { id, label })
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(code, label)| -> std::result::Result<Choice, String> {
                let id = parse_byte(code).ok_or_else(|| format!("choice code \"{}\" is not a byte", code))?;
                let label = label.as_str().map(str::to_string).unwrap_or_else(|| label.to_string());
                Ok(Choice { id, label })
            })
            .collect(),
        _ => Err("choices must be an array or object".to_string()),
    }
}

fn parse_range(obj: &Map<String, Value>) -> std::result::Result<Option<NumericRange>, String> {
    if !["min", "max", "step"].iter().any(|k| obj.contains_key(*k)) {
        return Ok(None);
    }

    let field = |key: &str, default: u8| -> std::result::Result<u8, String> {
        match obj.get(key) {
            Some(v) => v
                .as_u64()
                .filter(|n| *n <= 0xFF)
                .map(|n| n as u8)
                .ok_or_else(|| format!("\"{}\" must be 0..=255", key)),
            None => Ok(default),
        }
    };

    let range = NumericRange {
        min: field("min", 0)?,
        max: field("max", 0xFF)?,
        step: field("step", 1)?,
    };
    if range.min > range.max || range.step == 0 {
        return Err(format!(
            "invalid range [{}, {}, {}]",
            range.min, range.max, range.step
        ));
    }
    Ok(Some(range))
}

fn str_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(|v| v.as_str()))
}

/// A protocol byte given as a number or a decimal/"0x" hex string
fn byte_id(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_u64().filter(|v| *v <= 0xFF).map(|v| v as u8),
        Value::String(s) => parse_byte(s),
        _ => None,
    }
}

fn parse_byte(text: &str) -> Option<u8> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
