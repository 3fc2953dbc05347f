use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::db::{
    Book, BookRepository, LocationRecord, LocationRepository, LocationUpdate, NewLocation,
};
use crate::legacy_code::{base_number, location_for_code, AllocatorError};
use crate::services::{CatalogService, CodeService, CodeServiceError, NextCodePreview};

#[derive(Clone)]
pub struct AppState {
    pub code_service: CodeService<BookRepository>,
    pub catalog_service: CatalogService,
    pub location_repo: LocationRepository,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CodeLocationResponse {
    pub code: String,
    pub location: &'static str,
    pub suffix: &'static str,
    pub base_number: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct MoveBookRequest {
    pub location: String,
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/locations", get(get_locations).post(create_location))
        .route(
            "/locations/{location}",
            put(update_location).delete(deactivate_location),
        )
        .route("/locations/{location}/next-code", get(get_next_code))
        .route("/codes/{code}/location", get(get_code_location))
        .route("/books/{code}/location", put(move_book))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[instrument(skip(state))]
async fn get_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<LocationRecord>>, StatusCode> {
    let locations = state.location_repo.list_active().await.map_err(|e| {
        error!("Failed to list locations: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!("Retrieved {} active locations", locations.len());
    Ok(Json(locations))
}

fn code_error_status(e: CodeServiceError) -> StatusCode {
    match e {
        CodeServiceError::Allocator(AllocatorError::UnknownLocation(e)) => {
            warn!("{}", e);
            StatusCode::NOT_FOUND
        }
        CodeServiceError::Allocator(e @ AllocatorError::Exhausted { .. }) => {
            error!("{}", e);
            StatusCode::CONFLICT
        }
        CodeServiceError::Database(e) => {
            error!("Database error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn is_blank(name: &str) -> bool {
    name.trim().is_empty()
}

#[instrument(skip(state, location), fields(name = %location.name))]
async fn create_location(
    State(state): State<AppState>,
    Json(location): Json<NewLocation>,
) -> Result<(StatusCode, Json<LocationRecord>), StatusCode> {
    if is_blank(&location.name) {
        warn!("Rejected location without a name");
        return Err(StatusCode::BAD_REQUEST);
    }

    let created = state.location_repo.create(&location).await.map_err(|e| {
        error!("Failed to create location {}: {}", location.name, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, update))]
async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(update): Json<LocationUpdate>,
) -> Result<Json<LocationRecord>, StatusCode> {
    if update.name.as_deref().is_some_and(is_blank) {
        warn!("Rejected blank name for location {}", id);
        return Err(StatusCode::BAD_REQUEST);
    }

    let updated = state
        .location_repo
        .update(id, &update)
        .await
        .map_err(|e| {
            error!("Failed to update location {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    info!("Updated location {} ({})", updated.name, id);
    Ok(Json(updated))
}

#[instrument(skip(state))]
async fn deactivate_location(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, StatusCode> {
    let found = state.location_repo.deactivate(id).await.map_err(|e| {
        error!("Failed to deactivate location {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if found {
        info!("Deactivated location {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        warn!("Location {} not found", id);
        Err(StatusCode::NOT_FOUND)
    }
}

#[instrument(skip(state, request), fields(to = %request.location))]
async fn move_book(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<MoveBookRequest>,
) -> Result<Json<Book>, StatusCode> {
    let moved = state
        .catalog_service
        .relocate(&code, &request.location)
        .await
        .map_err(code_error_status)?
        .ok_or_else(|| {
            warn!("No book with code {}", code);
            StatusCode::NOT_FOUND
        })?;

    Ok(Json(moved))
}

#[instrument(skip(state), fields(location = %name))]
async fn get_next_code(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NextCodePreview>, StatusCode> {
    debug!("Computing next code for {}", name);
    let preview = state
        .code_service
        .preview(&name)
        .await
        .map_err(code_error_status)?;

    info!(
        "Next code for {} is {} (current max {:?})",
        preview.location, preview.next_code, preview.current_max
    );
    Ok(Json(preview))
}

#[instrument]
async fn get_code_location(
    Path(code): Path<String>,
) -> Result<Json<CodeLocationResponse>, StatusCode> {
    let location = location_for_code(&code).ok_or_else(|| {
        warn!("Cannot deduce a location from {}", code);
        StatusCode::NOT_FOUND
    })?;

    Ok(Json(CodeLocationResponse {
        location: location.label(),
        suffix: location.config().suffix,
        base_number: base_number(&code),
        code,
    }))
}
