//! Concrete entity kinds retrievable from the content APIs.
//!
//! Each kind supplies its own URI-construction rule and the envelope key its
//! representation is nested under; everything else comes from [`Entity`].
//!
//! [`Entity`]: crate::entity::Entity

pub mod affiliation;
pub mod author;
pub mod document;
