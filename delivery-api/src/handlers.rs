//! HTTP handlers. Every resource gets the same six explicit functions: list,
//! create, get, replace (PUT), patch (PATCH) and delete. Each validates the
//! payload, checks references it names, then calls its repository.

use axum::{
    debug_handler,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    errors::{AppError, AppJson, FieldErrors},
    models::{
        missing_reference, DeliveryProof, DeliveryProofPayload, Parcel, ParcelPayload, User, UserPayload, WriteMode,
    },
    repository::Repositories,
    routes::{ApiIndex, API_PREFIX},
};

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub db: Option<sqlx::PgPool>,
}

impl AppState {
    pub fn new(repos: Repositories, db: Option<sqlx::PgPool>) -> Self { Self { repos, db } }
}

/// Item paths carry a UUID; anything else cannot name an existing record.
fn parse_id(raw: &str, resource: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("{resource} {raw}")))
}

async fn check_user_ref(state: &AppState, errors: &mut FieldErrors, field: &str, id: Option<Uuid>) -> Result<(), AppError> {
    if let Some(id) = id {
        if !state.repos.users.exists(id).await? {
            errors.add(field, missing_reference(id));
        }
    }
    Ok(())
}

async fn check_parcel_ref(state: &AppState, errors: &mut FieldErrors, field: &str, id: Option<Uuid>) -> Result<(), AppError> {
    if let Some(id) = id {
        if !state.repos.parcels.exists(id).await? {
            errors.add(field, missing_reference(id));
        }
    }
    Ok(())
}

// ---- users ----

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.repos.users.list().await?))
}

#[debug_handler]
pub async fn create_user(State(state): State<AppState>, AppJson(payload): AppJson<UserPayload>) -> Result<impl IntoResponse, AppError> {
    payload.validate(WriteMode::Full).into_result()?;
    let user = state.repos.users.create(payload.into_new()).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<User>, AppError> {
    let id = parse_id(&id, "user")?;
    Ok(Json(state.repos.users.find_by_id(id).await?))
}

pub async fn replace_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UserPayload>,
) -> Result<Json<User>, AppError> {
    update_user(state, &id, payload, WriteMode::Full).await
}

pub async fn patch_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UserPayload>,
) -> Result<Json<User>, AppError> {
    update_user(state, &id, payload, WriteMode::Partial).await
}

async fn update_user(state: AppState, id: &str, payload: UserPayload, mode: WriteMode) -> Result<Json<User>, AppError> {
    let id = parse_id(id, "user")?;
    let mut user = state.repos.users.find_by_id(id).await?;
    payload.validate(mode).into_result()?;
    payload.apply(&mut user);
    let user = state.repos.users.update(user).await?;
    tracing::info!(user_id = %user.id, "user updated");
    Ok(Json(user))
}

pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "user")?;
    state.repos.users.delete(id).await?;
    tracing::info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---- parcels ----

pub async fn list_parcels(State(state): State<AppState>) -> Result<Json<Vec<Parcel>>, AppError> {
    Ok(Json(state.repos.parcels.list().await?))
}

#[debug_handler]
pub async fn create_parcel(State(state): State<AppState>, AppJson(payload): AppJson<ParcelPayload>) -> Result<impl IntoResponse, AppError> {
    validate_parcel(&state, &payload, WriteMode::Full).await?;
    let parcel = state.repos.parcels.create(payload.into_new()).await?;
    tracing::info!(parcel_id = %parcel.id, tracking_number = %parcel.tracking_number, "parcel created");
    Ok((StatusCode::CREATED, Json(parcel)))
}

pub async fn get_parcel(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Parcel>, AppError> {
    let id = parse_id(&id, "parcel")?;
    Ok(Json(state.repos.parcels.find_by_id(id).await?))
}

pub async fn replace_parcel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<ParcelPayload>,
) -> Result<Json<Parcel>, AppError> {
    update_parcel(state, &id, payload, WriteMode::Full).await
}

pub async fn patch_parcel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<ParcelPayload>,
) -> Result<Json<Parcel>, AppError> {
    update_parcel(state, &id, payload, WriteMode::Partial).await
}

async fn validate_parcel(state: &AppState, payload: &ParcelPayload, mode: WriteMode) -> Result<(), AppError> {
    let mut errors = payload.validate(mode);
    check_user_ref(state, &mut errors, "sender_id", payload.sender_id.flatten()).await?;
    check_user_ref(state, &mut errors, "courier_id", payload.courier_id.flatten()).await?;
    errors.into_result()
}

async fn update_parcel(state: AppState, id: &str, payload: ParcelPayload, mode: WriteMode) -> Result<Json<Parcel>, AppError> {
    let id = parse_id(id, "parcel")?;
    let mut parcel = state.repos.parcels.find_by_id(id).await?;
    validate_parcel(&state, &payload, mode).await?;
    payload.apply(&mut parcel);
    let parcel = state.repos.parcels.update(parcel).await?;
    tracing::info!(parcel_id = %parcel.id, status = parcel.status.as_str(), "parcel updated");
    Ok(Json(parcel))
}

pub async fn delete_parcel(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "parcel")?;
    state.repos.parcels.delete(id).await?;
    tracing::info!(parcel_id = %id, "parcel deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---- delivery proofs ----

pub async fn list_proofs(State(state): State<AppState>) -> Result<Json<Vec<DeliveryProof>>, AppError> {
    Ok(Json(state.repos.proofs.list().await?))
}

#[debug_handler]
pub async fn create_proof(
    State(state): State<AppState>,
    AppJson(payload): AppJson<DeliveryProofPayload>,
) -> Result<impl IntoResponse, AppError> {
    validate_proof(&state, &payload, WriteMode::Full).await?;
    let proof = state.repos.proofs.create(payload.into_new()).await?;
    tracing::info!(proof_id = %proof.id, parcel_id = %proof.parcel_id, "delivery proof created");
    Ok((StatusCode::CREATED, Json(proof)))
}

pub async fn get_proof(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<DeliveryProof>, AppError> {
    let id = parse_id(&id, "delivery proof")?;
    Ok(Json(state.repos.proofs.find_by_id(id).await?))
}

pub async fn replace_proof(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<DeliveryProofPayload>,
) -> Result<Json<DeliveryProof>, AppError> {
    update_proof(state, &id, payload, WriteMode::Full).await
}

pub async fn patch_proof(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<DeliveryProofPayload>,
) -> Result<Json<DeliveryProof>, AppError> {
    update_proof(state, &id, payload, WriteMode::Partial).await
}

async fn validate_proof(state: &AppState, payload: &DeliveryProofPayload, mode: WriteMode) -> Result<(), AppError> {
    let mut errors = payload.validate(mode);
    check_parcel_ref(state, &mut errors, "parcel_id", payload.parcel_id.flatten()).await?;
    check_user_ref(state, &mut errors, "courier_id", payload.courier_id.flatten()).await?;
    errors.into_result()
}

async fn update_proof(state: AppState, id: &str, payload: DeliveryProofPayload, mode: WriteMode) -> Result<Json<DeliveryProof>, AppError> {
    let id = parse_id(id, "delivery proof")?;
    let mut proof = state.repos.proofs.find_by_id(id).await?;
    validate_proof(&state, &payload, mode).await?;
    payload.apply(&mut proof);
    let proof = state.repos.proofs.update(proof).await?;
    tracing::info!(proof_id = %proof.id, "delivery proof updated");
    Ok(Json(proof))
}

pub async fn delete_proof(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "delivery proof")?;
    state.repos.proofs.delete(id).await?;
    tracing::info!(proof_id = %id, "delivery proof deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---- service endpoints ----

/// Map of resource name to the absolute URL of its collection.
pub async fn api_root(Extension(index): Extension<ApiIndex>, headers: HeaderMap) -> impl IntoResponse {
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok()).unwrap_or("localhost");
    let links: serde_json::Map<String, serde_json::Value> = index
        .resources
        .iter()
        .map(|name| (name.to_string(), serde_json::Value::String(format!("http://{host}{API_PREFIX}/{name}/"))))
        .collect();
    Json(serde_json::Value::Object(links))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.db {
        None => (StatusCode::OK, Json(serde_json::json!({ "status": "ok", "storage": "memory" }))),
        Some(ref pool) => {
            if sqlx::query("SELECT 1").fetch_one(pool).await.is_ok() {
                (StatusCode::OK, Json(serde_json::json!({ "status": "ok", "storage": "postgres" })))
            } else {
                (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "status": "degraded", "storage": "postgres" })))
            }
        }
    }
}
