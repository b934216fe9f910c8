use std::fmt::Display;

use serde_json::Value;

use crate::client::{ResponseFormat, api_base};
use crate::entity::{Entity, EntityState};

/// An institution profile from the affiliation retrieval API.
#[derive(Debug, Clone)]
pub struct AffiliationProfile {
    state: EntityState,
}

impl AffiliationProfile {
    pub fn new(affiliation_id: impl Display) -> Self {
        Self::from_uri(format!(
            "{}/content/affiliation/affiliation_id/{affiliation_id}",
            api_base()
        ))
    }

    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            state: EntityState::new(uri, ResponseFormat::Json),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.state
            .data()?
            .get("affiliation-name")
            .and_then(Value::as_str)
    }
}

impl Entity for AffiliationProfile {
    fn payload_key(&self) -> &'static str {
        "affiliation-retrieval-response"
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }
}
