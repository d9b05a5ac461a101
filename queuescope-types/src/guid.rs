//! Stable entity identity strings.
//!
//! A GUID is the pipe-delimited join of the entity type, the account scope,
//! the provider and the identity chain:
//!
//! ```text
//! MESSAGE_QUEUE_BROKER|<account>|kafka|prod|1
//! ```
//!
//! It is a pure function of its inputs, so the same logical entity always
//! maps to the same GUID across runs, and downstream storage can upsert on
//! it. Segments are escaped so a name containing `|` cannot collide with a
//! longer chain.

use std::fmt;

use crate::{EntityType, Identity, ProviderKind};

const DELIMITER: char = '|';

/// Derived, immutable entity identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntityGuid(String);

impl EntityGuid {
    /// Derive the GUID for an entity.
    ///
    /// # Example
    ///
    /// ```rust
    /// use queuescope_types::{EntityGuid, EntityType, Identity, ProviderKind};
    ///
    /// let identity = Identity::cluster("prod").with_broker("1");
    /// let guid = EntityGuid::derive(EntityType::Broker, "12345", ProviderKind::Kafka, &identity);
    ///
    /// assert_eq!(guid.as_str(), "MESSAGE_QUEUE_BROKER|12345|kafka|prod|1");
    /// ```
    pub fn derive(
        entity_type: EntityType,
        account_scope: &str,
        provider: ProviderKind,
        identity: &Identity,
    ) -> Self {
        let segments = [entity_type.as_str(), account_scope, provider.as_str()]
            .into_iter()
            .chain(identity.chain(entity_type));

        let mut guid = String::new();
        for segment in segments.filter(|s| !s.is_empty()) {
            if !guid.is_empty() {
                guid.push(DELIMITER);
            }
            push_escaped(&mut guid, segment);
        }
        EntityGuid(guid)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn push_escaped(out: &mut String, segment: &str) {
    for c in segment.chars() {
        if c == '\\' || c == DELIMITER {
            out.push('\\');
        }
        out.push(c);
    }
}

impl fmt::Display for EntityGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityGuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
