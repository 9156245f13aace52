use crate::types::ModelName;
use crate::value::SettingValue;
use std::collections::HashMap;

/// Last-known device values, keyed by model then (command id, setting id)
///
/// The crate never writes to this itself; whoever receives device replies
/// keeps it current and hands it to feedbacks for comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    models: HashMap<ModelName, HashMap<(u8, u8), SettingValue>>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed value, returning the one it replaced
    pub fn set(
        &mut self,
        model: impl Into<ModelName>,
        command_id: u8,
        setting_id: u8,
        value: SettingValue,
    ) -> Option<SettingValue> {
        self.models
            .entry(model.into())
            .or_default()
            .insert((command_id, setting_id), value)
    }

    /// Get the last observed value
    pub fn get(&self, model: &str, command_id: u8, setting_id: u8) -> Option<&SettingValue> {
        self.models
            .get(model)
            .and_then(|settings| settings.get(&(command_id, setting_id)))
    }

    /// Forget everything known about a model
    pub fn clear_model(&mut self, model: &str) {
        self.models.remove(model);
    }

    pub fn clear(&mut self) {
        self.models.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.models.values().all(|settings| settings.is_empty())
    }
}
