//! Present-or-placeholder values.
//!
//! Upstream responses omit properties freely. Reporting code must be able to
//! tell a genuinely empty string apart from a value that never arrived, so
//! absence is carried as a tag alongside the placeholder to display.

use std::collections::BTreeMap;
use std::fmt;

/// A single display attribute of a related object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Field {
    /// The upstream returned a value (possibly empty).
    Present(String),
    /// The upstream returned nothing; render the placeholder instead.
    Absent(&'static str),
}

impl Field {
    /// Build from an optional upstream value.
    pub fn from_option(value: Option<String>, placeholder: &'static str) -> Self {
        match value {
            Some(v) => Self::Present(v),
            None => Self::Absent(placeholder),
        }
    }

    /// Whether the upstream supplied a value.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// The upstream value, if any.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Present(v) => Some(v),
            Self::Absent(_) => None,
        }
    }

    /// Text to show: the value or its placeholder.
    pub fn display(&self) -> &str {
        match self {
            Self::Present(v) => v,
            Self::Absent(p) => p,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Placeholder shown for an object the batch API never returned.
pub const UNKNOWN_OBJECT: &str = "(unknown)";

/// Display attributes of one related object (deal, email, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Detail {
    /// Returned by the batch read; every requested attribute is filled.
    Known {
        /// Object id.
        id: String,
        /// Attribute name → value or placeholder.
        fields: BTreeMap<String, Field>,
    },
    /// Requested but missing from the response (typically deleted upstream).
    Unknown {
        /// Object id.
        id: String,
    },
}

impl Detail {
    /// Object id.
    pub fn id(&self) -> &str {
        match self {
            Self::Known { id, .. } | Self::Unknown { id } => id,
        }
    }

    /// Whether the object was returned upstream.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known { .. })
    }

    /// Look up one attribute. Unknown objects answer with the
    /// [`UNKNOWN_OBJECT`] placeholder for every attribute.
    pub fn field(&self, name: &str) -> Field {
        match self {
            Self::Known { fields, .. } => fields
                .get(name)
                .cloned()
                .unwrap_or(Field::Absent(UNKNOWN_OBJECT)),
            Self::Unknown { .. } => Field::Absent(UNKNOWN_OBJECT),
        }
    }
}
