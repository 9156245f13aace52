//! Invocable actions built from schema settings
//!
//! Every setting of every model becomes one [`ActionEntry`] keyed
//! `model:commandId:settingId`. Invoking an entry validates the value
//! against the setting's declared type, frames it, and hands it to a
//! [`CommandSender`].

use crate::error::{IntercomError, Result};
use crate::schema::SchemaRegistry;
use crate::transactor::{CommandRequest, CommandSender};
use crate::types::{Choice, ModelName, NumericRange, ParameterDescriptor, UiType};
use crate::value::SettingValue;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Table key for a parameter: `model:commandId:settingId`
pub fn entry_id(model: &str, command_id: u8, setting_id: u8) -> String {
    format!("{}:{}:{}", model, command_id, setting_id)
}

/// One settable parameter of one model
pub struct ActionEntry<S> {
    id: String,
    model: ModelName,
    descriptor: ParameterDescriptor,
    sender: Arc<S>,
}

impl<S> Clone for ActionEntry<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            model: self.model.clone(),
            descriptor: self.descriptor.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<S> std::fmt::Debug for ActionEntry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEntry")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl<S: CommandSender> ActionEntry<S> {
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

    pub fn ui_type(&self) -> UiType {
        self.descriptor.ui_type
    }

    /// Declared choices, unchanged from the schema
    pub fn choices(&self) -> &[Choice] {
        &self.descriptor.choices
    }

    /// `[min, max, step]` for numeric parameters
    pub fn range(&self) -> Option<NumericRange> {
        self.descriptor.numeric_range()
    }

    /// Validate `value` and build the request that would be sent
    pub fn request(&self, dest: IpAddr, value: &SettingValue) -> Result<CommandRequest> {
        let bytes = self.descriptor.encode(value)?;
        Ok(CommandRequest::new(self.model.clone(), self.descriptor.command_id, dest)
            .with_setting(self.descriptor.setting_id)
            .with_value(SettingValue::Bytes(bytes)))
    }

    /// Send `value` to the device at `dest` and return its raw reply
    pub async fn invoke(&self, dest: IpAddr, value: SettingValue) -> Result<Vec<u8>> {
        let request = self.request(dest, &value)?;
        tracing::debug!("Invoking {} on {} with {:?}", self.id, dest, value);
        self.sender.send_await_ack(request).await
    }
}

/// All actions, keyed by entry id
pub struct ActionTable<S> {
    entries: BTreeMap<String, ActionEntry<S>>,
}

impl<S: CommandSender> ActionTable<S> {
    pub fn get(&self, id: &str) -> Option<&ActionEntry<S>> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionEntry<S>> {
        self.entries.values()
    }

    /// Entries belonging to one model
    pub fn for_model<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a ActionEntry<S>> + 'a {
        self.entries.values().filter(move |e| e.model == model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an action and invoke it
    pub async fn invoke(&self, id: &str, dest: IpAddr, value: SettingValue) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| IntercomError::UnknownAction(id.to_string()))?;
        entry.invoke(dest, value).await
    }
}

impl<S> std::fmt::Debug for ActionTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// Build one action per setting of every model in the registry
///
/// Ids that collide are resolved in favour of the entry built last.
pub fn build_action_table<S: CommandSender>(registry: &SchemaRegistry, sender: Arc<S>) -> ActionTable<S> {
    let mut entries = BTreeMap::new();

    for schema in registry.iter() {
        for descriptor in &schema.settings {
            let id = entry_id(&schema.model, descriptor.command_id, descriptor.setting_id);
            let entry = ActionEntry {
                id: id.clone(),
                model: schema.model.clone(),
                descriptor: descriptor.clone(),
                sender: sender.clone(),
            };
            if let Some(previous) = entries.insert(id.clone(), entry) {
                tracing::warn!(
                    "Action {} ({}) replaced by {}",
                    id,
                    previous.descriptor.name,
                    descriptor.name
                );
            }
        }
    }

    tracing::debug!("Built {} action(s)", entries.len());
    ActionTable { entries }
}
