// src/handlers/dashboard.rs

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    config::AppState,
    models::dashboard::{ActivityFilter, DashboardView},
};

// GET /api/dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Dashboard",
    params(ActivityFilter),
    responses(
        (status = 200, description = "Indicadores e atividade recente", body = DashboardView),
        (status = 401, description = "Não autorizado")
    ),
    security(
        ("api_jwt" = [])
    )
)]
pub async fn get_dashboard(
    State(app_state): State<AppState>,
    Query(filter): Query<ActivityFilter>,
) -> Json<DashboardView> {
    Json(app_state.dashboard.compute(&filter))
}
