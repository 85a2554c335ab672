//! Cross-resource references.
//!
//! A binding names its endpoints either by a literal Pocket ID identifier, by
//! pointing at another declared resource whose observed identity supplies the
//! value, or by a label selector. The manifest spells these as three optional
//! fields (`id`, `ref`, `selector`); exactly one must be set, and that rule is
//! enforced when the [`Reference`] is constructed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ExternalId, ResourceName};

/// Label selector over declared resources. Parsed and carried, never resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Selector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawReference", into = "RawReference")]
pub enum Reference {
    Literal(ExternalId),
    Pointer { name: ResourceName },
    Selector(Selector),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("one of `id`, `ref`, or `selector` must be set")]
    Empty,
    #[error("only one of `id`, `ref`, or `selector` may be set (got {})", .0.join(", "))]
    Ambiguous(Vec<&'static str>),
    #[error("`ref` must name a declared resource")]
    BlankPointer,
}

impl Reference {
    pub fn literal(id: impl Into<String>) -> Result<Self, ReferenceError> {
        ExternalId::new(id)
            .map(Self::Literal)
            .map_err(|_| ReferenceError::Empty)
    }

    pub fn pointer(name: impl Into<String>) -> Result<Self, ReferenceError> {
        ResourceName::new(name)
            .map(|name| Self::Pointer { name })
            .map_err(|_| ReferenceError::BlankPointer)
    }
}

/// Wire shape of a reference: three optional, mutually exclusive fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
}

impl TryFrom<RawReference> for Reference {
    type Error = ReferenceError;

    fn try_from(raw: RawReference) -> Result<Self, Self::Error> {
        // Empty strings count as unset.
        let id = raw.id.filter(|value| !value.trim().is_empty());
        let pointer = raw.pointer.filter(|value| !value.trim().is_empty());

        let mut set = Vec::new();
        if id.is_some() {
            set.push("id");
        }
        if pointer.is_some() {
            set.push("ref");
        }
        if raw.selector.is_some() {
            set.push("selector");
        }
        if set.len() > 1 {
            return Err(ReferenceError::Ambiguous(set));
        }

        match (id, pointer, raw.selector) {
            (Some(id), None, None) => Self::literal(id),
            (None, Some(name), None) => Self::pointer(name),
            (None, None, Some(selector)) => Ok(Self::Selector(selector)),
            _ => Err(ReferenceError::Empty),
        }
    }
}

impl From<Reference> for RawReference {
    fn from(reference: Reference) -> Self {
        match reference {
            Reference::Literal(id) => RawReference {
                id: Some(id.as_str().to_string()),
                ..Default::default()
            },
            Reference::Pointer { name } => RawReference {
                pointer: Some(name.into()),
                ..Default::default()
            },
            Reference::Selector(selector) => RawReference {
                selector: Some(selector),
                ..Default::default()
            },
        }
    }
}
