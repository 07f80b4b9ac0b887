use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::Appointment;
use crate::services::appointments::list_sorted;
use crate::state::AppState;

// GET /api/appointments/:user_id
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let appointments = list_sorted(state.appointments.as_ref(), &user_id)?;
    Ok(Json(appointments))
}
