//! Domain types shared by the pet registry crates.
//!
//! [`catalog::BreedCatalog`] is the frozen breed index built at startup;
//! [`types`] holds the breed and pet records exchanged over HTTP and stored.
pub mod catalog;
pub mod types;

pub use catalog::{BreedCatalog, CatalogError};
pub use types::{pet_id, Breed, CreatePetRequest, Pet};
