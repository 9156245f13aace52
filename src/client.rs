use crate::actions::{build_action_table, ActionTable};
use crate::config::TransportConfig;
use crate::discovery::Discovery;
use crate::error::Result;
use crate::feedbacks::{build_feedback_table, FeedbackTable};
use crate::schema::SchemaRegistry;
use crate::state::DeviceState;
use crate::transactor::Transactor;
use crate::types::DeviceInfo;
use crate::value::SettingValue;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Client for discovering and controlling intercom devices
///
/// The `IntercomClient` owns the loaded schemas, the action and feedback
/// tables built from them, and the transport used to reach devices.
pub struct IntercomClient {
    registry: SchemaRegistry,
    transactor: Arc<Transactor>,
    discovery: Discovery,
    actions: ActionTable<Transactor>,
    feedbacks: FeedbackTable,
}

impl IntercomClient {
    /// Load every schema in `dir` and build the tables
    ///
    /// # Example
    ///
    /// ```no_run
    /// use studio_intercom::{IntercomClient, SettingValue, TransportConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = IntercomClient::load("schemas", TransportConfig::default())?;
    ///     for device in client.discover().await {
    ///         println!("Found {} at {}", device.model, device.ip);
    ///     }
    ///     client
    ///         .invoke("Model209:13:10", "192.168.1.20".parse()?, SettingValue::Bool(true))
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn load(dir: impl AsRef<Path>, config: TransportConfig) -> Result<Self> {
        let registry = SchemaRegistry::load_dir(dir)?;
        Ok(Self::new(registry, config))
    }

    /// Build a client around an already loaded registry
    pub fn new(registry: SchemaRegistry, config: TransportConfig) -> Self {
        let transactor = Arc::new(Transactor::with_config(config.clone()));
        let actions = build_action_table(&registry, transactor.clone());
        let feedbacks = build_feedback_table(&registry);

        Self {
            registry,
            transactor,
            discovery: Discovery::with_config(config),
            actions,
            feedbacks,
        }
    }

    /// Replace the schemas and rebuild both tables
    ///
    /// On error the current schemas stay in place.
    pub fn reload(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let registry = SchemaRegistry::load_dir(dir)?;
        self.actions = build_action_table(&registry, self.transactor.clone());
        self.feedbacks = build_feedback_table(&registry);
        self.registry = registry;
        Ok(())
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn actions(&self) -> &ActionTable<Transactor> {
        &self.actions
    }

    /// Ids of every registered action
    pub fn action_ids(&self) -> impl Iterator<Item = &str> {
        self.actions.ids()
    }

    pub fn feedbacks(&self) -> &FeedbackTable {
        &self.feedbacks
    }

    pub fn transactor(&self) -> &Transactor {
        &self.transactor
    }

    /// Invoke an action by id against the device at `dest`
    pub async fn invoke(&self, action_id: &str, dest: IpAddr, value: SettingValue) -> Result<Vec<u8>> {
        self.actions.invoke(action_id, dest, value).await
    }

    /// Evaluate a feedback by id against caller-maintained state
    pub fn evaluate(&self, feedback_id: &str, state: &DeviceState, expected: &SettingValue) -> bool {
        self.feedbacks.evaluate(feedback_id, state, expected)
    }

    /// Find devices on the local network
    pub async fn discover(&self) -> Vec<DeviceInfo> {
        self.discovery.discover().await
    }
}
