use axum::{
    Router,
    body::Bytes,
    extract::{Json, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::core::{
    Edit, FieldChange, FormError, FormRecord, FormSession, FormSnapshot, Goal, GoalField, Group,
    Migration, NetWorth, Report, Row, headline,
};

#[derive(Parser, Debug)]
#[command(
    name = "needsheet",
    about = "Financial needs intake form: derived totals, report and HTTP API"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the in-memory form session over HTTP.
    Serve {
        #[arg(long, env = "NEEDSHEET_BIND", default_value = "0.0.0.0")]
        bind: IpAddr,
        #[arg(long, env = "NEEDSHEET_PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Settle a flat JSON record and print it.
    Settle {
        #[arg(long, help = "Path to a JSON record; reads stdin when omitted")]
        input: Option<PathBuf>,
    },
    /// Settle a flat JSON record and print its report.
    Report {
        #[arg(long, help = "Path to a JSON record; reads stdin when omitted")]
        input: Option<PathBuf>,
        #[arg(long, help = "Print the report as JSON instead of text")]
        json: bool,
        #[arg(long, help = "Date ages are computed at (YYYY-MM-DD); defaults to today")]
        as_of: Option<NaiveDate>,
    },
}

pub type AppState = Arc<RwLock<FormSession>>;

/// A flat record as sent by a client. Numbers, booleans and null are accepted
/// in place of strings.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct RecordPayload(BTreeMap<String, serde_json::Value>);

impl RecordPayload {
    pub fn into_record(self) -> FormRecord {
        self.0
            .into_iter()
            .map(|(key, value)| (key, value_text(value)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct FieldPayload {
    key: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RowPayload {
    group: String,
    slug: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoalEditPayload {
    field: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReportQuery {
    as_of: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldResponse {
    #[serde(flatten)]
    edit: Edit,
    snapshot: FormSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RowResponse {
    row: Option<Row>,
    derived: Vec<FieldChange>,
    snapshot: FormSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoalResponse {
    index: usize,
    goal: Goal,
    snapshot: FormSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub record: FormRecord,
    pub migrations: Vec<Migration>,
    pub net_worth: NetWorth,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn value_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

fn apply_field(
    session: &mut FormSession,
    payload: FieldPayload,
) -> Result<FieldResponse, FormError> {
    let edit = session.set_field(&payload.key, value_text(payload.value))?;
    Ok(FieldResponse {
        edit,
        snapshot: session.snapshot(),
    })
}

fn add_row(session: &mut FormSession, payload: RowPayload) -> Result<RowResponse, FormError> {
    let group: Group = payload.group.parse()?;
    let slug = payload.slug.trim();
    let (row, settlement) = session.add_row(group, slug, payload.label.as_deref())?;
    Ok(RowResponse {
        row: Some(row),
        derived: settlement.changes,
        snapshot: session.snapshot(),
    })
}

fn remove_row(
    session: &mut FormSession,
    group: &str,
    slug: &str,
) -> Result<RowResponse, FormError> {
    let group: Group = group.parse()?;
    let settlement = session.remove_row(group, slug.trim())?;
    Ok(RowResponse {
        row: None,
        derived: settlement.changes,
        snapshot: session.snapshot(),
    })
}

fn add_goal(session: &mut FormSession, body: &[u8]) -> Result<GoalResponse, String> {
    let goal = if body.iter().all(u8::is_ascii_whitespace) {
        Goal::default()
    } else {
        serde_json::from_slice::<Goal>(body).map_err(|e| format!("Invalid goal JSON: {e}"))?
    };
    let index = session.add_goal(goal.clone());
    Ok(GoalResponse {
        index,
        goal,
        snapshot: session.snapshot(),
    })
}

fn update_goal(
    session: &mut FormSession,
    index: usize,
    payload: GoalEditPayload,
) -> Result<GoalResponse, FormError> {
    let field: GoalField = payload.field.parse()?;
    let goal = session
        .update_goal(index, field, value_text(payload.value))?
        .clone();
    Ok(GoalResponse {
        index,
        goal,
        snapshot: session.snapshot(),
    })
}

fn build_report(session: &FormSession, query: ReportQuery) -> Result<Report, String> {
    let as_of = match query.as_of.as_deref().map(str::trim) {
        None | Some("") => Local::now().date_naive(),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| format!("asOf must be a YYYY-MM-DD date, got `{raw}`"))?,
    };
    Ok(Report::from_snapshot(&session.snapshot(), as_of))
}

/// Stateless settle used by `POST /api/settle` and the `settle` command.
pub fn settle_record(record: FormRecord) -> Result<SettleResponse, FormError> {
    let (session, migrations) = FormSession::from_record(record)?;
    let net_worth = headline(session.record());
    Ok(SettleResponse {
        record: session.into_record(),
        migrations,
        net_worth,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/form", get(form_handler))
        .route("/api/field", post(field_handler))
        .route("/api/rows", post(add_row_handler))
        .route("/api/rows/:group/:slug", delete(remove_row_handler))
        .route("/api/goals", post(add_goal_handler))
        .route(
            "/api/goals/:index",
            put(update_goal_handler).delete(remove_goal_handler),
        )
        .route("/api/report", get(report_handler))
        .route("/api/settle", post(settle_handler))
        .route("/api/reset", post(reset_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(bind: IpAddr, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::new(bind, port);
    let app = router(Arc::new(RwLock::new(FormSession::new())));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "needsheet HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/form");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn form_handler(State(state): State<AppState>) -> Response {
    let session = state.read().await;
    json_response(StatusCode::OK, session.snapshot())
}

async fn field_handler(
    State(state): State<AppState>,
    Json(payload): Json<FieldPayload>,
) -> Response {
    let mut session = state.write().await;
    match apply_field(&mut session, payload) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => form_error_response(err),
    }
}

async fn add_row_handler(
    State(state): State<AppState>,
    Json(payload): Json<RowPayload>,
) -> Response {
    let mut session = state.write().await;
    match add_row(&mut session, payload) {
        Ok(body) => json_response(StatusCode::CREATED, body),
        Err(err) => form_error_response(err),
    }
}

async fn remove_row_handler(
    State(state): State<AppState>,
    Path((group, slug)): Path<(String, String)>,
) -> Response {
    let mut session = state.write().await;
    match remove_row(&mut session, &group, &slug) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => form_error_response(err),
    }
}

async fn add_goal_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let mut session = state.write().await;
    match add_goal(&mut session, &body) {
        Ok(body) => json_response(StatusCode::CREATED, body),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn update_goal_handler(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(payload): Json<GoalEditPayload>,
) -> Response {
    let mut session = state.write().await;
    match update_goal(&mut session, index, payload) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => form_error_response(err),
    }
}

async fn remove_goal_handler(State(state): State<AppState>, Path(index): Path<usize>) -> Response {
    let mut session = state.write().await;
    let removed = session.remove_goal(index);
    match removed {
        Ok(goal) => json_response(
            StatusCode::OK,
            GoalResponse {
                index,
                goal,
                snapshot: session.snapshot(),
            },
        ),
        Err(err) => form_error_response(err),
    }
}

async fn report_handler(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let session = state.read().await;
    match build_report(&session, query) {
        Ok(report) => json_response(StatusCode::OK, report),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn settle_handler(Json(payload): Json<RecordPayload>) -> Response {
    match settle_record(payload.into_record()) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => form_error_response(err),
    }
}

async fn reset_handler(State(state): State<AppState>) -> Response {
    let mut session = state.write().await;
    *session = FormSession::new();
    info!("form session reset");
    json_response(StatusCode::OK, session.snapshot())
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn form_error_response(err: FormError) -> Response {
    let status = match err {
        FormError::NotConverged { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    warn!(%err, "request rejected");
    error_response(status, &err.to_string())
}
