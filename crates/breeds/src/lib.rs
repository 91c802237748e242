pub mod source;

pub use source::{
    BreedFetcher, BreedSource, BreedSourceError, DEFAULT_BREED_ENDPOINT, FETCH_TIMEOUT,
    MAX_PAYLOAD_BYTES,
};
