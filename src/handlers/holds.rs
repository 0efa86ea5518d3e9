use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{SlotHold, Span};
use crate::services::{holds, Resolution};
use crate::state::AppState;

// POST /api/holds
#[derive(Deserialize)]
pub struct CreateHoldRequest {
    pub resource_id: String,
    #[serde(default)]
    pub bookable_type_id: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

pub async fn create_hold(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<(StatusCode, Json<SlotHold>), AppError> {
    if req.end <= req.start {
        return Err(AppError::Validation("end must be after start".to_string()));
    }
    let now = state.config.local_now();
    if req.start < now {
        return Err(AppError::SlotUnavailable("slot is in the past".to_string()));
    }

    let hold = {
        let mut db = state.db();
        holds::create_hold(
            &mut db,
            &req.resource_id,
            req.bookable_type_id.as_deref(),
            &Span::new(req.start, req.end),
            &now,
            state.config.hold_ttl(),
        )?
    };

    Ok((StatusCode::CREATED, Json(hold)))
}

// DELETE /api/holds/:id
pub async fn release_hold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = state.config.local_now();
    let resolution: Resolution = {
        let db = state.db();
        holds::release_hold(&db, &id, &now)?
    };
    Ok(Json(serde_json::json!({ "resolution": resolution })))
}
