use crate::api::{parse_user, AppState};
use crate::domain::{Decimal, Direction, MonthRef, Operation, OptionKind, Ticker};
use crate::engine::OpenSpec;
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    pub ticker: String,
    pub kind: String,
    pub direction: String,
    pub strike: Decimal,
    pub price: Decimal,
    pub quantity: i64,
    pub margin: Option<Decimal>,
    pub reference_month: u32,
    pub reference_year: i32,
    pub notes: Option<String>,
    pub group_label: Option<String>,
}

pub async fn open_position(
    Query(params): Query<UserQuery>,
    State(state): State<AppState>,
    Json(body): Json<OpenPositionRequest>,
) -> Result<Json<Operation>, AppError> {
    let user = parse_user(&params.user)?;

    let kind = OptionKind::parse(&body.kind)
        .ok_or_else(|| AppError::BadRequest(format!("kind must be CALL or PUT, got {}", body.kind)))?;
    let direction = Direction::parse(&body.direction).ok_or_else(|| {
        AppError::BadRequest(format!(
            "direction must be BUY or SELL, got {}",
            body.direction
        ))
    })?;
    let reference = MonthRef::new(body.reference_month, body.reference_year)
        .ok_or_else(|| AppError::BadRequest("referenceMonth must be 1-12".to_string()))?;

    let spec = OpenSpec {
        user_id: user,
        ticker: Ticker::new(body.ticker),
        kind,
        direction,
        strike: body.strike,
        price: body.price,
        quantity: body.quantity,
        margin: body.margin,
        reference,
        notes: body.notes,
        group_label: body.group_label,
    };

    let op = state.lifecycle.open_position(spec).await?;
    Ok(Json(op))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    #[serde(flatten)]
    pub operation: Operation,
    /// Best-effort live quote for display; never feeds P&L.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub positions: Vec<PositionDto>,
}

pub async fn list_positions(
    Query(params): Query<UserQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let user = parse_user(&params.user)?;

    let active = state.repo.query_active(&user).await?;

    let mut positions = Vec::with_capacity(active.len());
    for operation in active {
        let display_price = match state.pricing.quote(operation.ticker.as_str()).await {
            Ok(quote) => quote,
            Err(e) => {
                debug!(ticker = %operation.ticker, error = %e, "quote unavailable");
                None
            }
        };
        positions.push(PositionDto {
            operation,
            display_price,
        });
    }

    Ok(Json(PositionsResponse { positions }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionRequest {
    pub close_price: Decimal,
    pub quantity_to_close: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseResponse {
    pub parent: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_child: Option<Operation>,
}

pub async fn close_position(
    Path(id): Path<Uuid>,
    Query(params): Query<UserQuery>,
    State(state): State<AppState>,
    Json(body): Json<ClosePositionRequest>,
) -> Result<Json<CloseResponse>, AppError> {
    let user = parse_user(&params.user)?;

    let outcome = state
        .lifecycle
        .close_position(&user, id, body.close_price, body.quantity_to_close)
        .await?;

    Ok(Json(CloseResponse {
        parent: outcome.parent,
        realized_child: outcome.realized_child,
    }))
}

pub async fn delete_position(
    Path(id): Path<Uuid>,
    Query(params): Query<UserQuery>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = parse_user(&params.user)?;
    state.lifecycle.delete_position(&user, id).await?;
    Ok(Json(serde_json::json!({"status": "deleted"})))
}
