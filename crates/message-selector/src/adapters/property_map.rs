//! In-memory message properties
//!
//! A [`PropertySource`] backed by plain maps, loadable from JSON. Useful for
//! tests, tools and embedders whose messages already decode to a map.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::Value;
use crate::error::SelectorError;
use crate::ports::PropertySource;

/// Properties, topic, QoS and ACLs of one message
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyMap {
    pub properties: HashMap<String, Value>,
    pub topic: Option<String>,
    pub qos: u8,
    /// ACL name to member keys
    pub acls: HashMap<String, HashSet<String>>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object such as
    /// `{"properties": {"color": "red"}, "topic": "a/b", "qos": 1}`
    pub fn from_json(json: &str) -> Result<Self, SelectorError> {
        serde_json::from_str(json).map_err(|e| SelectorError::InvalidConfig(e.to_string()))
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_qos(mut self, qos: u8) -> Self {
        self.qos = qos;
        self
    }

    /// Add `key` to the ACL named `acl`
    pub fn with_acl_key(mut self, acl: impl Into<String>, key: impl Into<String>) -> Self {
        self.acls.entry(acl.into()).or_default().insert(key.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }
}

impl PropertySource for PropertyMap {
    fn property(&self, name: &str) -> Option<Value> {
        self.properties.get(name).cloned()
    }

    fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    fn qos(&self) -> u8 {
        self.qos
    }

    fn check_acl(&self, acl: &str, key: &str) -> Option<bool> {
        self.acls.get(acl).map(|keys| keys.contains(key))
    }
}
