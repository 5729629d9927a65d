use crate::api::{parse_user, AppState};
use crate::db::Repository;
use crate::domain::{Decimal, Operation, TimeMs, UserId};
use crate::engine::report::{compute_report, qualifying_closed, sum_results};
use crate::engine::{OperationSummary, Period, RankedOperation, Report, ResolvedPeriod};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub user: String,
    pub period: Option<String>,
    pub month: Option<String>,
    pub year: Option<i32>,
}

/// ROI serializes as an integer percent, or the string "N/A" when the
/// opening notional was zero.
fn serialize_roi<S: Serializer>(roi: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
    match roi {
        Some(value) => serializer.serialize_i64(*value),
        None => serializer.serialize_str("N/A"),
    }
}

#[derive(Debug, Serialize)]
pub struct NameValue {
    pub nome: String,
    pub valor: usize,
}

#[derive(Debug, Serialize)]
pub struct MonthResult {
    pub mes: String,
    pub resultado: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MonthCount {
    pub mes: String,
    pub quantidade: usize,
}

#[derive(Debug, Serialize)]
pub struct OperationSummaryDto {
    pub id: Uuid,
    #[serde(rename = "visualId")]
    pub visual_id: String,
    pub ticker: String,
    pub tipo: String,
    pub direcao: String,
    pub quantidade: i64,
    pub resultado: Decimal,
    #[serde(serialize_with = "serialize_roi")]
    pub roi: Option<i64>,
    #[serde(
        rename = "operacaoOriginalId",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_operation_id: Option<Uuid>,
}

impl From<&OperationSummary> for OperationSummaryDto {
    fn from(summary: &OperationSummary) -> Self {
        OperationSummaryDto {
            id: summary.id,
            visual_id: summary.visual_id.clone(),
            ticker: summary.ticker.clone(),
            tipo: summary.kind.clone(),
            direcao: summary.direction.clone(),
            quantidade: summary.quantity,
            resultado: summary.result,
            roi: summary.roi,
            original_operation_id: summary.original_operation_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RankedDto {
    pub ticker: String,
    pub tipo: String,
    pub direcao: String,
    pub resultado: Decimal,
    #[serde(serialize_with = "serialize_roi")]
    pub roi: Option<i64>,
    #[serde(
        rename = "operacaoOriginalId",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_operation_id: Option<Uuid>,
}

impl From<&RankedOperation> for RankedDto {
    fn from(ranked: &RankedOperation) -> Self {
        RankedDto {
            ticker: ranked.ticker.clone(),
            tipo: ranked.kind.clone(),
            direcao: ranked.direction.clone(),
            resultado: ranked.result,
            roi: ranked.roi,
            original_operation_id: ranked.original_operation_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    #[serde(rename = "totalOperacoes")]
    pub total_operacoes: usize,
    #[serde(rename = "resultadoTotal")]
    pub resultado_total: Decimal,
    #[serde(rename = "resultadoTendencia")]
    pub resultado_tendencia: i64,
    #[serde(rename = "taxaAcerto")]
    pub taxa_acerto: i64,
    #[serde(rename = "mediaResultado")]
    pub media_resultado: Decimal,
    #[serde(rename = "distribuicaoTipo")]
    pub distribuicao_tipo: Vec<NameValue>,
    #[serde(rename = "distribuicaoDirecao")]
    pub distribuicao_direcao: Vec<NameValue>,
    #[serde(rename = "resultadoPorMes")]
    pub resultado_por_mes: Vec<MonthResult>,
    #[serde(rename = "operacoesPorMes")]
    pub operacoes_por_mes: Vec<MonthCount>,
    #[serde(rename = "detalhesPorMes")]
    pub detalhes_por_mes: BTreeMap<String, Vec<OperationSummaryDto>>,
    #[serde(rename = "melhoresOperacoes")]
    pub melhores_operacoes: Vec<RankedDto>,
    #[serde(rename = "pioresOperacoes")]
    pub piores_operacoes: Vec<RankedDto>,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        ReportResponse {
            total_operacoes: report.total_operations,
            resultado_total: report.total_result,
            resultado_tendencia: report.trend_pct,
            taxa_acerto: report.hit_rate_pct,
            media_resultado: report.mean_result,
            distribuicao_tipo: report
                .distribution_by_kind
                .iter()
                .map(|d| NameValue {
                    nome: d.label.clone(),
                    valor: d.count,
                })
                .collect(),
            distribuicao_direcao: report
                .distribution_by_direction
                .iter()
                .map(|d| NameValue {
                    nome: d.label.clone(),
                    valor: d.count,
                })
                .collect(),
            resultado_por_mes: report
                .months
                .iter()
                .map(|bucket| MonthResult {
                    mes: bucket.label.clone(),
                    resultado: bucket.result,
                })
                .collect(),
            operacoes_por_mes: report
                .months
                .iter()
                .map(|bucket| MonthCount {
                    mes: bucket.label.clone(),
                    quantidade: bucket.count,
                })
                .collect(),
            detalhes_por_mes: report
                .months
                .iter()
                .map(|bucket| {
                    (
                        bucket.label.clone(),
                        bucket.operations.iter().map(OperationSummaryDto::from).collect(),
                    )
                })
                .collect(),
            melhores_operacoes: report.best.iter().map(RankedDto::from).collect(),
            piores_operacoes: report.worst.iter().map(RankedDto::from).collect(),
        }
    }
}

/// Fetch the broader in-period set and the P&L-qualifying set for a
/// resolved period.
async fn period_sets(
    repo: &Repository,
    user: &UserId,
    resolved: ResolvedPeriod,
) -> Result<(Vec<Operation>, Vec<Operation>), AppError> {
    match resolved {
        ResolvedPeriod::Range { from, to } => {
            let closed = repo.query_closed_in_range(user, from, to).await?;
            let qualifying = qualifying_closed(&closed);
            let active = repo.query_active_opened_in_range(user, from, to).await?;

            let mut in_period = qualifying.clone();
            in_period.extend(active);
            Ok((in_period, qualifying))
        }
        ResolvedPeriod::Reference(reference) => {
            let records = repo
                .query_by_reference(user, reference.month, reference.year)
                .await?;
            let qualifying = qualifying_closed(&records);
            let active: Vec<Operation> = records
                .iter()
                .filter(|record| record.operation.status.is_closable())
                .map(|record| record.operation.clone())
                .collect();

            let mut in_period = qualifying.clone();
            in_period.extend(active);
            Ok((in_period, qualifying))
        }
    }
}

pub async fn get_report(
    Query(params): Query<ReportQuery>,
    State(state): State<AppState>,
) -> Result<Json<ReportResponse>, AppError> {
    let user = parse_user(&params.user)?;

    let period = Period::parse(
        params.period.as_deref().unwrap_or("all"),
        params.month.as_deref(),
        params.year,
    )
    .map_err(AppError::BadRequest)?;

    let now = TimeMs::now();
    let (in_period, qualifying) = period_sets(&state.repo, &user, period.resolve(now)).await?;

    let prior_result = match period.prior(now) {
        Some(prior) => {
            let (_, prior_qualifying) = period_sets(&state.repo, &user, prior).await?;
            Some(sum_results(&prior_qualifying))
        }
        None => None,
    };

    let report = compute_report(&in_period, &qualifying, prior_result);
    Ok(Json(ReportResponse::from(report)))
}
