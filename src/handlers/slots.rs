use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::slots::{plan_slots, Slot, SlotQuery};
use crate::state::AppState;

// GET /api/slots
#[derive(Deserialize)]
pub struct SlotsParams {
    pub resource_id: Option<String>,
    pub bookable_type_id: Option<String>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub duration_minutes: i64,
    pub step_minutes: Option<i64>,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    slots: Vec<Slot>,
    days: BTreeMap<NaiveDate, bool>,
}

pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SlotsParams>,
) -> Result<Json<SlotsResponse>, AppError> {
    let query = SlotQuery {
        resource_id: params.resource_id.filter(|s| !s.is_empty()),
        bookable_type_id: params.bookable_type_id.filter(|s| !s.is_empty()),
        from: params.from,
        to: params.to,
        duration_minutes: params.duration_minutes,
        step_minutes: params.step_minutes,
    };
    let now = state.config.local_now();

    let plan = {
        let db = state.db();
        plan_slots(&db, &query, &now, state.config.max_query_days)?
    };

    Ok(Json(SlotsResponse {
        slots: plan.slots().collect(),
        days: plan.day_availability(),
    }))
}
