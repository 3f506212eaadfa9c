// src/handlers/orders.rs

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Datelike, Local};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::{
        order::{CreateOrderPayload, NextNumberParams, Order, OrderAction, OrderListParams, OrderNumber, OrderStatus},
        print::PrintDocument,
    },
    services::order_workflow::CreatedOrder,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextNumberResponse {
    pub order_number: u32,
    pub year: i32,
    #[schema(example = "001/2025")]
    pub number: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub id: String,
    pub status: OrderStatus,
    pub status_label: String,
}

// GET /api/orders
#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "Orders",
    params(OrderListParams),
    responses(
        (status = 200, description = "OS do usuário, mais recentes primeiro", body = Vec<Order>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_orders(
    State(app_state): State<AppState>,
    Query(params): Query<OrderListParams>,
) -> Json<Vec<Order>> {
    Json(app_state.workflow.filter(params.status, params.q.as_deref()))
}

// GET /api/orders/next-number
#[utoipa::path(
    get,
    path = "/api/orders/next-number",
    tag = "Orders",
    params(NextNumberParams),
    responses(
        (status = 200, description = "Próximo número do ano", body = NextNumberResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn next_number(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(params): Query<NextNumberParams>,
) -> Result<impl IntoResponse, ApiError> {
    let year = params.year.unwrap_or_else(|| Local::now().year());
    let order_number = app_state
        .workflow
        .next_order_number(year)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(NextNumberResponse {
        order_number,
        year,
        number: OrderNumber::new(order_number, year).to_string(),
    }))
}

// POST /api/orders
#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "Orders",
    request_body = CreateOrderPayload,
    responses(
        (status = 201, description = "OS criada, com o documento de impressão", body = CreatedOrder),
        (status = 400, description = "Cliente ou número ausente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_order(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CreateOrderPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let client = match payload.client_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => Some(
            app_state
                .directory
                .resolve(id)
                .await
                .map_err(to_api)?
                .ok_or_else(|| to_api(AppError::NotFound(id.to_string())))?,
        ),
        None => None,
    };

    let created = app_state
        .workflow
        .create_order(client.as_ref(), payload.form)
        .await
        .map_err(to_api)?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn transition(app_state: &AppState, locale: &Locale, id: String, action: OrderAction) -> Result<Json<TransitionResponse>, ApiError> {
    let status = app_state
        .workflow
        .request_transition(&id, action)
        .await
        .map_err(|e| e.to_api_error(locale, &app_state.i18n_store))?;

    Ok(Json(TransitionResponse {
        id,
        status,
        status_label: status.label().to_string(),
    }))
}

// POST /api/orders/{id}/complete
#[utoipa::path(
    post,
    path = "/api/orders/{id}/complete",
    tag = "Orders",
    params(("id" = String, Path, description = "ID da OS")),
    responses(
        (status = 200, description = "OS concluída", body = TransitionResponse),
        (status = 409, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn complete_order(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<String>,
) -> Result<Json<TransitionResponse>, ApiError> {
    transition(&app_state, &locale, id, OrderAction::Complete).await
}

// POST /api/orders/{id}/reopen
#[utoipa::path(
    post,
    path = "/api/orders/{id}/reopen",
    tag = "Orders",
    params(("id" = String, Path, description = "ID da OS")),
    responses(
        (status = 200, description = "OS reaberta", body = TransitionResponse),
        (status = 409, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn reopen_order(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<String>,
) -> Result<Json<TransitionResponse>, ApiError> {
    transition(&app_state, &locale, id, OrderAction::Reopen).await
}

// DELETE /api/orders/{id}
#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    tag = "Orders",
    params(("id" = String, Path, description = "ID da OS")),
    responses((status = 204, description = "OS removida")),
    security(("api_jwt" = []))
)]
pub async fn delete_order(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .workflow
        .delete_order(&id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/orders/{id}/print
#[utoipa::path(
    get,
    path = "/api/orders/{id}/print",
    tag = "Orders",
    params(("id" = String, Path, description = "ID da OS")),
    responses(
        (status = 200, description = "Documento de impressão", body = PrintDocument),
        (status = 404, description = "OS inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn print_order(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<String>,
) -> Result<Json<PrintDocument>, ApiError> {
    let order = app_state
        .workflow
        .resolve(&id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(app_state.workflow.print_document(&order)))
}

// GET /api/orders/{id}/pdf
#[utoipa::path(
    get,
    path = "/api/orders/{id}/pdf",
    tag = "Orders",
    params(("id" = String, Path, description = "ID da OS")),
    responses(
        (status = 200, description = "PDF da OS", content_type = "application/pdf"),
        (status = 404, description = "OS inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn order_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let order = app_state
        .workflow
        .resolve(&id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let pdf_bytes = app_state
        .workflow
        .render_pdf(&order)
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let filename = format!("OS_{}.pdf", order.number.replace('/', "-"));
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
    ];

    Ok((headers, pdf_bytes).into_response())
}
