//! Contact search, association and detail settings.

use serde::{Deserialize, Serialize};

use pulse_core::models::AssociationType;
use pulse_crm::{ContactQuery, SearchFilter, SearchSort};

/// Which contacts to walk and what to fetch for each.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactSettings {
    /// Search filters (combined with AND).
    pub filters: Vec<SearchFilter>,
    /// Sort order.
    pub sorts: Vec<SearchSort>,
    /// Contact properties to request.
    pub properties: Vec<String>,
    /// Search page size (capped at 100 by the CRM).
    pub page_size: usize,
    /// Stop after this many contacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_contacts: Option<usize>,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            filters: vec![SearchFilter {
                property_name: "email".to_string(),
                operator: "HAS_PROPERTY".to_string(),
                value: None,
            }],
            sorts: vec![SearchSort {
                property_name: "lastmodifieddate".to_string(),
                direction: "DESCENDING".to_string(),
            }],
            properties: ["firstname", "lastname", "email", "company", "lifecyclestage"]
                .into_iter()
                .map(String::from)
                .collect(),
            page_size: 100,
            max_contacts: None,
        }
    }
}

impl ContactSettings {
    /// The search request these settings describe.
    pub fn query(&self) -> ContactQuery {
        ContactQuery {
            filters: self.filters.clone(),
            sorts: self.sorts.clone(),
            properties: self.properties.clone(),
        }
    }
}

/// Relationship types to resolve per contact.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssociationSettings {
    /// (name, remote type) pairs, resolved in order.
    pub types: Vec<AssociationType>,
    /// Contact ids per association batch read.
    pub batch_size: usize,
}

impl Default for AssociationSettings {
    fn default() -> Self {
        Self {
            types: vec![
                AssociationType::new("deals", "deals"),
                AssociationType::new("emails", "emails"),
            ],
            batch_size: 100,
        }
    }
}

/// Related-object detail reads.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailSettings {
    /// Object ids per batch read.
    pub batch_size: usize,
}

impl Default for DetailSettings {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}
