use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use tracing::{error, info, warn};

use pet_registry_core::types::{CreatePetRequest, Pet};
use pet_registry_storage::{PetStore, PetStoreError};

use crate::problem::ProblemResponse;
use crate::router::AppState;

fn record(route: &'static str, result: &'static str) {
    counter!("pet_requests_total", "route" => route, "result" => result).increment(1);
}

fn missing_id_problem() -> ProblemResponse {
    record("get", "bad_request");
    ProblemResponse::bad_request("missing_id", "id missing")
}

/// `GET /pets/`: the id segment is empty.
pub async fn missing_id() -> ProblemResponse {
    missing_id_problem()
}

/// `GET /pets/{id}`.
///
/// An id segment that cannot be decoded as UTF-8 is rejected as `invalid_id`.
pub async fn get<S: PetStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Pet>, ProblemResponse> {
    let id = match id {
        Ok(Path(id)) => id,
        Err(rejection) => {
            warn!(stage = "pets", error = %rejection.body_text(), "rejected pet id");
            record("get", "bad_request");
            return Err(ProblemResponse::bad_request(
                "invalid_id",
                rejection.body_text(),
            ));
        }
    };
    if id.is_empty() {
        return Err(missing_id_problem());
    }

    match state.store().select(&id).await {
        Ok(Some(pet)) => {
            record("get", "ok");
            Ok(Json(pet))
        }
        Ok(None) => {
            record("get", "not_found");
            Err(ProblemResponse::not_found(
                "pet_not_found",
                format!("id not found: {id}"),
            ))
        }
        Err(err) => {
            error!(stage = "pets", pet_id = %id, error = %err, "failed to load pet");
            record("get", "error");
            Err(ProblemResponse::storage_error())
        }
    }
}

/// `POST /pets`.
///
/// The breed id must resolve in the catalog; the resolved breed is copied into
/// the new pet. Nothing is written unless every check passes.
pub async fn create<S: PetStore>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<Response, ProblemResponse> {
    let request: CreatePetRequest = serde_json::from_slice(&body).map_err(|err| {
        record("create", "bad_request");
        ProblemResponse::bad_request("invalid_body", format!("failed to parse request: {err}"))
    })?;

    let Some(breed) = state.catalog().get(&request.breed_id) else {
        record("create", "breed_not_found");
        return Err(ProblemResponse::not_found(
            "breed_not_found",
            format!("breed id not found: {}", request.breed_id),
        ));
    };

    let pet = Pet::new(request, breed, state.now());

    if let Err(err) = state.store().insert(&pet).await {
        return Err(match err {
            PetStoreError::Duplicate { id } => {
                warn!(stage = "pets", pet_id = %id, "generated pet id already in use");
                record("create", "conflict");
                ProblemResponse::new(
                    StatusCode::CONFLICT,
                    "pet_id_conflict",
                    format!("pet id already exists: {id}"),
                )
            }
            other => {
                error!(stage = "pets", pet_id = %pet.id, error = %other, "failed to persist pet");
                record("create", "error");
                ProblemResponse::storage_error()
            }
        });
    }

    info!(stage = "pets", pet_id = %pet.id, breed_id = %pet.breed_details.id, "pet created");
    record("create", "created");

    let location = pet.location();
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(pet),
    )
        .into_response())
}
