//! Advisor record types.

use serde::{Deserialize, Serialize};

/// The agency advisor attached to the authenticated identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisor {
    /// Site-side advisor identifier (identity key).
    pub id: String,
    /// Advisor full name.
    pub name: String,
    /// Contact email, when published.
    pub email: Option<String>,
    /// Contact phone, when published.
    pub phone: Option<String>,
    /// Agency name, filled from the contact page when available.
    pub agency: Option<String>,
}

impl Advisor {
    /// Creates an advisor record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            phone: None,
            agency: None,
        }
    }
}
