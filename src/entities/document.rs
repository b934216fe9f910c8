use std::fmt::Display;

use serde_json::Value;

use crate::client::{ResponseFormat, api_base};
use crate::entity::{Entity, EntityState};

/// An abstract record from the Scopus abstract retrieval API.
#[derive(Debug, Clone)]
pub struct AbstractDocument {
    state: EntityState,
}

impl AbstractDocument {
    pub fn new(scopus_id: impl Display) -> Self {
        Self::from_uri(format!(
            "{}/content/abstract/scopus_id/{scopus_id}",
            api_base()
        ))
    }

    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            state: EntityState::new(uri, ResponseFormat::Json),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.state
            .data()?
            .pointer("/coredata/dc:title")
            .and_then(Value::as_str)
    }
}

impl Entity for AbstractDocument {
    fn payload_key(&self) -> &'static str {
        "abstracts-retrieval-response"
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }
}

/// A full-text article from the ScienceDirect article retrieval API,
/// addressed by PII or DOI.
#[derive(Debug, Clone)]
pub struct FullTextDocument {
    state: EntityState,
}

impl FullTextDocument {
    pub fn from_pii(pii: impl Display) -> Self {
        Self::from_uri(format!("{}/content/article/pii/{pii}", api_base()))
    }

    pub fn from_doi(doi: impl Display) -> Self {
        Self::from_uri(format!("{}/content/article/doi/{doi}", api_base()))
    }

    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            state: EntityState::new(uri, ResponseFormat::Json),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.state
            .data()?
            .pointer("/coredata/dc:title")
            .and_then(Value::as_str)
    }
}

impl Entity for FullTextDocument {
    fn payload_key(&self) -> &'static str {
        "full-text-retrieval-response"
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }
}
