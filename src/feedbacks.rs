use crate::actions::entry_id;
use crate::schema::SchemaRegistry;
use crate::state::DeviceState;
use crate::types::{Choice, ModelName, ParameterDescriptor};
use crate::value::SettingValue;
use std::collections::BTreeMap;

/// One observable parameter of one model
#[derive(Debug, Clone)]
pub struct FeedbackEntry {
    id: String,
    model: ModelName,
    descriptor: ParameterDescriptor,
}

impl FeedbackEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn descriptor(&self) -> &ParameterDescriptor {
        &self.descriptor
    }

    pub fn label(&self) -> &str {
        &self.descriptor.label
    }

    pub fn choices(&self) -> &[Choice] {
        &self.descriptor.choices
    }

    /// The value last recorded for this parameter, if any
    pub fn observed<'a>(&self, state: &'a DeviceState) -> Option<&'a SettingValue> {
        state.get(
            &self.model,
            self.descriptor.command_id,
            self.descriptor.setting_id,
        )
    }

    /// Whether the device's last known value equals `expected`
    ///
    /// Values are compared by their wire encoding when both are valid for
    /// the parameter, so a packed colour matches its byte triple.
    pub fn evaluate(&self, state: &DeviceState, expected: &SettingValue) -> bool {
        let Some(observed) = self.observed(state) else {
            return false;
        };
        match (self.descriptor.encode(observed), self.descriptor.encode(expected)) {
            (Ok(a), Ok(b)) => a == b,
            _ => observed == expected,
        }
    }
}

/// All feedbacks, keyed by entry id
#[derive(Debug, Clone, Default)]
pub struct FeedbackTable {
    entries: BTreeMap<String, FeedbackEntry>,
}

impl FeedbackTable {
    pub fn get(&self, id: &str) -> Option<&FeedbackEntry> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedbackEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate a feedback by id; unknown ids evaluate to false
    pub fn evaluate(&self, id: &str, state: &DeviceState, expected: &SettingValue) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| entry.evaluate(state, expected))
    }
}

/// Build one feedback per observable parameter of every model
///
/// Ids that collide are resolved in favour of the entry built last.
pub fn build_feedback_table(registry: &SchemaRegistry) -> FeedbackTable {
    let mut entries = BTreeMap::new();

    for schema in registry.iter() {
        for descriptor in &schema.feedbacks {
            let id = entry_id(&schema.model, descriptor.command_id, descriptor.setting_id);
            let entry = FeedbackEntry {
                id: id.clone(),
                model: schema.model.clone(),
                descriptor: descriptor.clone(),
            };
            if let Some(previous) = entries.insert(id.clone(), entry) {
                tracing::warn!(
                    "Feedback {} ({}) replaced by {}",
                    id,
                    previous.descriptor.name,
                    descriptor.name
                );
            }
        }
    }

    tracing::debug!("Built {} feedback(s)", entries.len());
    FeedbackTable { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceSchema, UiType};
    use crate::value::ParameterValueType;

    fn descriptor(name: &str, command_id: u8, setting_id: u8, value_type: ParameterValueType) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            label: name.to_string(),
            command_id,
            setting_id,
            value_type,
            ui_type: UiType::default_for(value_type),
            choices: Vec::new(),
            range: None,
            default: None,
            current: None,
        }
    }

    fn table() -> FeedbackTable {
        let schema = |model: &str| DeviceSchema {
            model: model.to_string(),
            settings: Vec::new(),
            feedbacks: vec![
                descriptor("TalkbackToggle", 13, 0x0A, ParameterValueType::Boolean),
                descriptor("LedColor", 0x21, 0x01, ParameterValueType::Rgb),
            ],
            commands: BTreeMap::new(),
        };
        build_feedback_table(&SchemaRegistry::from_schemas([
            schema("Model209"),
            schema("Model5205"),
        ]))
    }

    #[test]
    fn compares_against_model_scoped_state() {
        let table = table();
        assert_eq!(table.len(), 4);

        let mut state = DeviceState::new();
        let talkback = table.get("Model209:13:10").unwrap();
        assert!(!talkback.evaluate(&state, &SettingValue::Bool(true)));

        state.set("Model209", 13, 0x0A, SettingValue::Bool(true));
        assert!(talkback.evaluate(&state, &SettingValue::Bool(true)));
        assert!(!talkback.evaluate(&state, &SettingValue::Bool(false)));

        // Same ids on another model are independent
        assert!(!table.evaluate("Model5205:13:10", &state, &SettingValue::Bool(true)));
        assert!(!table.evaluate("Model999:1:1", &state, &SettingValue::Bool(true)));
    }

    #[test]
    fn colours_compare_by_encoding() {
        let table = table();
        let mut state = DeviceState::new();
        state.set("Model209", 0x21, 0x01, SettingValue::Bytes(vec![0xFF, 0x00, 0x00]));

        assert!(table.evaluate("Model209:33:1", &state, &SettingValue::Int(0xFF0000)));
        assert!(!table.evaluate("Model209:33:1", &state, &SettingValue::Int(0x00FF00)));
    }

    #[test]
    fn later_feedback_wins_on_id_collision() {
        let schema = DeviceSchema {
            model: "Model209".to_string(),
            settings: Vec::new(),
            feedbacks: vec![
                descriptor("Old", 13, 0x0A, ParameterValueType::Boolean),
                descriptor("New", 13, 0x0A, ParameterValueType::Boolean),
            ],
            commands: BTreeMap::new(),
        };
        let table = build_feedback_table(&SchemaRegistry::from_schemas([schema]));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("Model209:13:10").unwrap().label(), "New");
    }
}
