use std::collections::HashMap;

use thiserror::Error;

use crate::types::Breed;

/// Read-only index of breeds keyed by id.
///
/// Built once from a payload snapshot and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreedCatalog {
    breeds: HashMap<String, Breed>,
    replaced: usize,
}

impl BreedCatalog {
    /// Parses a JSON array of breeds and indexes it by id.
    pub fn from_payload(payload: &[u8]) -> Result<Self, CatalogError> {
        let breeds: Vec<Breed> = serde_json::from_slice(payload)?;
        if let Some(index) = breeds.iter().position(|breed| breed.id.is_empty()) {
            return Err(CatalogError::EmptyId { index });
        }
        Ok(Self::from_breeds(breeds))
    }

    /// Indexes the provided breeds. Later entries replace earlier ones with the same id.
    pub fn from_breeds<I>(breeds: I) -> Self
    where
        I: IntoIterator<Item = Breed>,
    {
        let iter = breeds.into_iter();
        let mut map = HashMap::with_capacity(iter.size_hint().0);
        let mut replaced = 0;
        for breed in iter {
            if map.insert(breed.id.clone(), breed).is_some() {
                replaced += 1;
            }
        }
        Self {
            breeds: map,
            replaced,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Breed> {
        self.breeds.get(id)
    }

    pub fn len(&self) -> usize {
        self.breeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breeds.is_empty()
    }

    /// Number of payload entries dropped because a later entry reused their id.
    pub fn replaced(&self) -> usize {
        self.replaced
    }

    /// Iterates the indexed breeds in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Breed> {
        self.breeds.values()
    }

    /// Indexed breed ids in ascending order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.iter().map(|breed| breed.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

/// Errors produced while building a catalog from a payload.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to decode breed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("breed at index {index} has an empty id")]
    EmptyId { index: usize },
}
