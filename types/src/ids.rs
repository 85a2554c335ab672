use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{what} must not be empty")]
pub struct EmptyIdError {
    what: &'static str,
}

impl EmptyIdError {
    #[must_use]
    pub const fn new(what: &'static str) -> Self {
        Self { what }
    }
}

/// Primary key of an object inside Pocket ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EmptyIdError::new("external id"));
        }
        Ok(Self(value))
    }

    /// Wraps whatever the remote returned, including an empty string.
    ///
    /// Used for wire values where an empty id signals a partial response.
    #[must_use]
    pub fn from_remote(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Composite identity of a membership binding: `member:container`.
    #[must_use]
    pub fn composite(member: &ExternalId, container: &ExternalId) -> Self {
        Self(format!("{}:{}", member.0, container.0))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-legible lookup key used to discover an object before its
/// [`ExternalId`] is known: a username, a group name, or a client name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableName(String);

impl StableName {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ExternalId> for StableName {
    fn from(id: &ExternalId) -> Self {
        Self(id.0.clone())
    }
}

/// Unique name of a declared resource within its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EmptyIdError::new("resource name"));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceName {
    type Error = EmptyIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceName> for String {
    fn from(value: ResourceName) -> Self {
        value.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
