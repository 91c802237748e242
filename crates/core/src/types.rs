use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Breed entry as published by the breed catalog source.
///
/// Everything except `id`, including `name`, is kept verbatim in `attributes`
/// and written back inline when the breed is serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breed {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Breed {
    /// Creates a breed carrying only a display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let mut attributes = Map::new();
        attributes.insert("name".to_string(), Value::String(name.into()));
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Display name, when the source provides one as a string.
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }
}

/// Body accepted by `POST /pets`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatePetRequest {
    pub name: String,
    pub photo: String,
    pub breed_id: String,
}

/// Stored pet record.
///
/// `breed_details` is a copy of the catalog entry taken at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub name: String,
    pub photo: String,
    pub breed_details: Breed,
    pub create_time: DateTime<Utc>,
}

impl Pet {
    /// Builds a new pet for `breed`, deriving the id from the breed id and `now`.
    pub fn new(request: CreatePetRequest, breed: &Breed, now: DateTime<Utc>) -> Self {
        Self {
            id: pet_id(&breed.id, now),
            name: request.name,
            photo: request.photo,
            breed_details: breed.clone(),
            create_time: now,
        }
    }

    /// Path under which the pet is served.
    pub fn location(&self) -> String {
        format!("/pets/{}", self.id)
    }
}

/// Concatenates the breed id with the creation time in Unix milliseconds.
///
/// Two pets of the same breed created within the same millisecond share an id;
/// stores reject the second insert.
pub fn pet_id(breed_id: &str, now: DateTime<Utc>) -> String {
    format!("{breed_id}{}", now.timestamp_millis())
}
