use crate::api::{parse_user, AppState};
use crate::domain::{Decimal, MarginAccount, MarginAdjustment};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::positions::UserQuery;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginAccountDto {
    pub total: Decimal,
    pub allocated: Decimal,
    pub available: Decimal,
}

impl From<&MarginAccount> for MarginAccountDto {
    fn from(account: &MarginAccount) -> Self {
        MarginAccountDto {
            total: account.total,
            allocated: account.allocated,
            available: account.available(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginResponse {
    pub account: MarginAccountDto,
    pub adjustments: Vec<MarginAdjustment>,
}

pub async fn get_margin(
    Query(params): Query<UserQuery>,
    State(state): State<AppState>,
) -> Result<Json<MarginResponse>, AppError> {
    let user = parse_user(&params.user)?;

    let account = state.ledger.account(&user).await?;
    let adjustments = state.ledger.adjustments(&user).await?;

    Ok(Json(MarginResponse {
        account: MarginAccountDto::from(&account),
        adjustments,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTotalRequest {
    pub total: Decimal,
    pub note: Option<String>,
}

pub async fn set_total(
    Query(params): Query<UserQuery>,
    State(state): State<AppState>,
    Json(body): Json<SetTotalRequest>,
) -> Result<Json<MarginAccountDto>, AppError> {
    let user = parse_user(&params.user)?;

    if body.total.is_negative() {
        return Err(AppError::BadRequest("total must be >= 0".to_string()));
    }

    let account = state.ledger.set_total(&user, body.total, body.note).await?;
    Ok(Json(MarginAccountDto::from(&account)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    pub delta: Decimal,
    pub note: Option<String>,
}

pub async fn adjust_total(
    Query(params): Query<UserQuery>,
    State(state): State<AppState>,
    Json(body): Json<AdjustRequest>,
) -> Result<Json<MarginAccountDto>, AppError> {
    let user = parse_user(&params.user)?;

    if body.delta.is_zero() {
        return Err(AppError::BadRequest("delta must not be zero".to_string()));
    }

    let account = state
        .ledger
        .adjust_total(&user, body.delta, body.note)
        .await?;
    Ok(Json(MarginAccountDto::from(&account)))
}
