use std::fmt::Display;

use serde_json::Value;

use crate::client::{ResponseFormat, api_base};
use crate::entity::{Entity, EntityState};

/// An author profile from the author retrieval API.
#[derive(Debug, Clone)]
pub struct AuthorProfile {
    state: EntityState,
}

impl AuthorProfile {
    pub fn new(author_id: impl Display) -> Self {
        Self::from_uri(format!("{}/content/author/author_id/{author_id}", api_base()))
    }

    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            state: EntityState::new(uri, ResponseFormat::Json),
        }
    }

    pub fn given_name(&self) -> Option<&str> {
        self.preferred_name("given-name")
    }

    pub fn surname(&self) -> Option<&str> {
        self.preferred_name("surname")
    }

    /// Preferred given name and surname joined with a space; `None` unless
    /// both parts are present.
    pub fn full_name(&self) -> Option<String> {
        Some(format!("{} {}", self.given_name()?, self.surname()?))
    }

    fn preferred_name(&self, part: &str) -> Option<&str> {
        self.state
            .data()?
            .pointer(&format!("/author-profile/preferred-name/{part}"))
            .and_then(Value::as_str)
    }
}

impl Entity for AuthorProfile {
    fn payload_key(&self) -> &'static str {
        "author-retrieval-response"
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }
}
