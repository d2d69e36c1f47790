//! Axum-based HTTP API over the billing, tariff and summary modules

use crate::accounts::{AccountRepository, validate_account_id};
use crate::billing::{
    BillingCycleConfig, BillingPeriod, CycleKind, DEFAULT_MAX_PERIODS, enumerate_recent_periods,
    label_for_period, period_for_label,
};
use crate::config::Config;
use crate::error::{EvnError, Result};
use crate::persistence::BillingCycleStore;
use crate::readings::{AccountData, MonthLabel};
use crate::summary::{
    DetailTable, current_period_snapshot, detail_table, readings_in_period, summarize,
    trend_for_periods,
};
use crate::tariff::compute_cost;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repository: AccountRepository,
    pub store: Arc<RwLock<BillingCycleStore>>,
}

impl AppState {
    pub fn new(config: Config, store: BillingCycleStore) -> Self {
        let repository = AccountRepository::new(&config.data_dir);
        Self {
            config: Arc::new(config),
            repository,
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// Data and cycle of `account`, plus today's date in the configured timezone
    async fn account_context(
        &self,
        account: &str,
    ) -> Result<(AccountData, BillingCycleConfig, NaiveDate)> {
        let data = self.repository.load(account)?;
        let cycle = self.store.read().await.get(account);
        let today = self.config.today()?;
        Ok((data, cycle, today))
    }
}

/// Error response with a status derived from the error kind
pub struct ApiError(EvnError);

impl From<EvnError> for ApiError {
    fn from(err: EvnError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_user_error() {
            StatusCode::BAD_REQUEST
        } else {
            crate::logging::get_logger("web").error(&format!("Request failed: {}", self.0));
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "version": env!("APP_VERSION") }))
}

#[derive(Debug, Serialize)]
pub struct AccountEntry {
    pub account: String,
    pub billing_cycle: BillingCycleConfig,
    pub description: String,
}

async fn list_accounts(State(state): State<AppState>) -> ApiResult<Vec<AccountEntry>> {
    let accounts = state.config.accounts()?;
    let store = state.store.read().await;
    let entries = accounts
        .into_iter()
        .map(|account| {
            let billing_cycle = store.get(&account);
            AccountEntry {
                description: billing_cycle.description(),
                billing_cycle,
                account,
            }
        })
        .collect();
    Ok(Json(entries))
}

#[derive(Debug, Serialize)]
pub struct PeriodEntry {
    pub label: MonthLabel,
    pub is_current: bool,
    pub caption: String,
}

async fn periods(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> ApiResult<Vec<PeriodEntry>> {
    let (data, cycle, today) = state.account_context(&account).await?;
    let labels =
        enumerate_recent_periods(&cycle, &data.daily, &data.monthly, today, DEFAULT_MAX_PERIODS)?;
    let mode = cycle.mode();
    Ok(Json(
        labels
            .into_iter()
            .map(|p| PeriodEntry {
                caption: p.caption(mode),
                label: p.label,
                is_current: p.is_current,
            })
            .collect(),
    ))
}

async fn summary(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> ApiResult<crate::summary::Summary> {
    let (data, cycle, today) = state.account_context(&account).await?;
    Ok(Json(summarize(&data.monthly, &data.daily, &cycle, today)?))
}

async fn current(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> ApiResult<Option<crate::summary::CurrentPeriodSnapshot>> {
    let (data, cycle, today) = state.account_context(&account).await?;
    Ok(Json(current_period_snapshot(&cycle, &data.daily, today)?))
}

#[derive(Debug, Deserialize)]
pub struct TrendParams {
    pub count: Option<usize>,
}

async fn trend(
    State(state): State<AppState>,
    Path(account): Path<String>,
    Query(params): Query<TrendParams>,
) -> ApiResult<Vec<crate::summary::PeriodTrend>> {
    let count = params.count.unwrap_or(state.config.trend_periods);
    if count == 0 || count > DEFAULT_MAX_PERIODS {
        return Err(EvnError::validation(
            "count",
            format!("Must be between 1 and {}", DEFAULT_MAX_PERIODS),
        )
        .into());
    }

    let (data, cycle, today) = state.account_context(&account).await?;
    let labels: Vec<MonthLabel> =
        enumerate_recent_periods(&cycle, &data.daily, &data.monthly, today, DEFAULT_MAX_PERIODS)?
            .into_iter()
            .take(count)
            .map(|p| p.label)
            .collect();
    Ok(Json(trend_for_periods(
        &labels,
        &data.daily,
        &data.monthly,
        &cycle,
    )?))
}

#[derive(Debug, Deserialize)]
pub struct DailyParams {
    /// `mm-yyyy`; the live period when absent
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DailyResponse {
    pub label: MonthLabel,
    pub period: BillingPeriod,
    #[serde(flatten)]
    pub table: DetailTable,
}

async fn daily(
    State(state): State<AppState>,
    Path(account): Path<String>,
    Query(params): Query<DailyParams>,
) -> ApiResult<DailyResponse> {
    let (data, cycle, today) = state.account_context(&account).await?;
    let label = match params.month.as_deref() {
        Some(month) => month.parse::<MonthLabel>()?,
        None => label_for_period(&cycle, today, true, today)?,
    };
    let period = period_for_label(&cycle, &label)?.clamp_end(today);
    let table = detail_table(&readings_in_period(&data.daily, &period));
    Ok(Json(DailyResponse {
        label,
        period,
        table,
    }))
}

#[derive(Debug, Serialize)]
pub struct BillingCycleView {
    pub account: String,
    #[serde(flatten)]
    pub cycle: BillingCycleConfig,
    pub configured: bool,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct BillingCycleBody {
    #[serde(alias = "startDay")]
    pub start_day: u32,
    #[serde(default, alias = "type")]
    pub kind: CycleKind,
}

async fn get_billing_cycle(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> ApiResult<BillingCycleView> {
    validate_account_id(&account)?;
    let store = state.store.read().await;
    let cycle = store.get(&account);
    Ok(Json(BillingCycleView {
        configured: store.contains(&account),
        description: cycle.description(),
        cycle,
        account,
    }))
}

async fn put_billing_cycle(
    State(state): State<AppState>,
    Path(account): Path<String>,
    Json(body): Json<BillingCycleBody>,
) -> ApiResult<BillingCycleView> {
    validate_account_id(&account)?;
    let cycle = state
        .store
        .write()
        .await
        .set_billing_cycle(&account, body.start_day, body.kind)?;
    Ok(Json(BillingCycleView {
        configured: true,
        description: cycle.description(),
        cycle,
        account,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CostParams {
    pub kwh: f64,
}

async fn cost(Query(params): Query<CostParams>) -> ApiResult<crate::tariff::CostBreakdown> {
    if !params.kwh.is_finite() || params.kwh < 0.0 {
        return Err(EvnError::validation("kwh", "Must be a non-negative number").into());
    }
    Ok(Json(compute_cost(params.kwh)))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/accounts", get(list_accounts))
        .route("/api/accounts/{account}/periods", get(periods))
        .route("/api/accounts/{account}/summary", get(summary))
        .route("/api/accounts/{account}/current", get(current))
        .route("/api/accounts/{account}/trend", get(trend))
        .route("/api/accounts/{account}/daily", get(daily))
        .route(
            "/api/accounts/{account}/billing-cycle",
            get(get_billing_cycle).put(put_billing_cycle),
        )
        .route("/api/cost", get(cost))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = build_router(state);

    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let (addr, parsed_ok): (SocketAddr, bool) = match host.parse::<IpAddr>() {
        Ok(ip) => (SocketAddr::new(ip, port), true),
        Err(_) => (([127, 0, 0, 1], port).into(), false),
    };
    if !parsed_ok {
        logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EvnError::web(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router).await?;
    Ok(())
}
