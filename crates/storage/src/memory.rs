use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use tokio::sync::RwLock;

use pet_registry_core::types::Pet;

use crate::{PetStore, PetStoreError};

/// In-process [`PetStore`] backed by a shared map.
#[derive(Clone, Default)]
pub struct MemoryPetStore {
    pets: Arc<RwLock<HashMap<String, Pet>>>,
}

impl MemoryPetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored pets.
    pub async fn len(&self) -> usize {
        self.pets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pets.read().await.is_empty()
    }
}

impl PetStore for MemoryPetStore {
    async fn insert(&self, pet: &Pet) -> Result<(), PetStoreError> {
        match self.pets.write().await.entry(pet.id.clone()) {
            Entry::Occupied(_) => Err(PetStoreError::Duplicate { id: pet.id.clone() }),
            Entry::Vacant(slot) => {
                slot.insert(pet.clone());
                Ok(())
            }
        }
    }

    async fn select(&self, id: &str) -> Result<Option<Pet>, PetStoreError> {
        Ok(self.pets.read().await.get(id).cloned())
    }
}
