//! Message type shared by every publisher, receiver and interceptor.
//!
//! A [`Message`] is an immutable value: its content, identifier and partition
//! identifier never change once constructed. Interceptors that need different
//! content produce a fresh message through [`Message::clone_with_content`],
//! which shares the content buffer of the replacement and copies both
//! property maps.

use bytes::Bytes;
use std::collections::HashMap;

/// Arbitrary property value attached to a message
pub type PropertyValue = serde_json::Value;

/// Property map attached to a message
pub type Properties = HashMap<String, PropertyValue>;

/// A message travelling through publishers, receivers and interceptors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    id: Option<String>,
    content: Bytes,
    partition_id: Option<String>,
    properties: Properties,
    system_properties: Properties,
}

impl Message {
    /// Create new message with content
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Set the transport- or caller-assigned identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the partition identifier used by ordering-sensitive consumers
    pub fn with_partition_id(mut self, partition_id: impl Into<String>) -> Self {
        self.partition_id = Some(partition_id.into());
        self
    }

    /// Add an application-visible property
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Replace all application-visible properties
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Add a transport-internal property
    pub fn with_system_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.system_properties.insert(key.into(), value.into());
        self
    }

    /// Produce a copy of this message carrying different content.
    ///
    /// Identifier, partition identifier and both property maps are carried over.
    pub fn clone_with_content(&self, content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    /// Message identifier, if one was assigned
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Raw message content; empty when unset
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Partition identifier, if one was assigned
    pub fn partition_id(&self) -> Option<&str> {
        self.partition_id.as_deref()
    }

    /// Application-visible properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Transport-internal properties
    pub fn system_properties(&self) -> &Properties {
        &self.system_properties
    }

    /// Look up a single application-visible property
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Look up a single application-visible property as a string
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
