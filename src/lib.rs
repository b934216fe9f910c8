#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod client;
pub mod entities;
pub mod entity;
pub mod error;
pub mod search;
pub mod store;

pub use client::{ApiClient, ApiClientBuilder, ResponseFormat};
pub use entities::affiliation::AffiliationProfile;
pub use entities::author::AuthorProfile;
pub use entities::document::{AbstractDocument, FullTextDocument};
pub use entity::{Entity, EntityState};
pub use error::ScopusError;
pub use search::{Search, SearchIndex};
pub use store::{DataStore, DirStore};
