use std::sync::Arc;
use std::time::Duration;

use agent_flow::{
    AgentGateway, CallPolicy, FlowError, InMemorySessionStorage, Session, SessionStorage,
};
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{AuthError, CredentialStore};
use crate::design::{analyze_candidates, design_candidates};
use crate::discussion::{Discussion, advance_discussion, initialize_discussion};
use crate::llm::OpenRouterGateway;
use crate::models::*;
use crate::notify::{NotificationGateway, SmtpNotifier};
use crate::panel::run_panel;
use crate::report::{ReportController, ReportStage, ReportWorkflow};
use crate::targets::fetch_targets;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

/// Map workflow errors onto HTTP statuses. Gateway failures are upstream
/// failures (502) and always leave the session at its previous stage.
fn flow_error(e: FlowError) -> ApiError {
    let status = match &e {
        FlowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        FlowError::InvalidTransition(_) => StatusCode::CONFLICT,
        FlowError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        FlowError::Gateway(_) => StatusCode::BAD_GATEWAY,
        FlowError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

fn auth_error(e: AuthError) -> ApiError {
    let status = match &e {
        AuthError::DuplicateEmail(_) => StatusCode::CONFLICT,
        AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn AgentGateway>,
    pub policy: CallPolicy,
    pub reports: Arc<dyn SessionStorage<ReportWorkflow>>,
    pub discussions: Arc<dyn SessionStorage<Discussion>>,
    pub notifier: Arc<dyn NotificationGateway>,
    pub credentials: Arc<CredentialStore>,
}

impl AppState {
    fn controller(&self) -> ReportController {
        ReportController::new(self.gateway.clone(), self.policy)
    }
}

pub async fn create_app() -> Router {
    build_router(create_app_state())
}

fn create_app_state() -> AppState {
    let credentials_path =
        std::env::var("CREDENTIALS_PATH").unwrap_or_else(|_| "users.json".to_string());

    AppState {
        gateway: Arc::new(OpenRouterGateway::from_env()),
        policy: call_policy_from_env(),
        reports: Arc::new(InMemorySessionStorage::new()),
        discussions: Arc::new(InMemorySessionStorage::new()),
        notifier: Arc::new(SmtpNotifier::from_env()),
        credentials: Arc::new(CredentialStore::new(credentials_path)),
    }
}

fn call_policy_from_env() -> CallPolicy {
    let default = CallPolicy::default();
    let timeout = std::env::var("GATEWAY_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default.timeout);
    let max_attempts = std::env::var("GATEWAY_MAX_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default.max_attempts);

    CallPolicy {
        timeout,
        max_attempts,
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/reports", post(create_report))
        .route("/reports/{session_id}", get(get_report))
        .route("/reports/{session_id}/outline", post(generate_outline))
        .route("/reports/{session_id}/research", post(gather_research))
        .route("/reports/{session_id}/draft", post(write_draft))
        .route("/reports/{session_id}/edit", post(edit_report))
        .route("/reports/{session_id}/reset", post(reset_report))
        .route("/reports/{session_id}/export", get(export_report))
        .route("/reports/{session_id}/send", post(send_report))
        .route("/panel", post(panel_query))
        .route("/discussions", post(create_discussion))
        .route("/discussions/{discussion_id}", get(get_discussion))
        .route(
            "/discussions/{discussion_id}/advance",
            post(advance_discussion_turn),
        )
        .route("/designs", post(design_nanobodies))
        .route("/designs/analysis", post(analyze_designs))
        .route("/targets", post(lookup_targets))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Life-Sciences Research Assistant",
        "version": "1.0.0",
        "description": "Agent-backed report generation, specialist panel, discussion simulator and nanobody design lab",
        "endpoints": {
            "POST /reports": "Create a report session",
            "GET /reports/{session_id}": "Get workflow stage and artifacts",
            "POST /reports/{session_id}/outline": "Generate the report outline from a research question",
            "POST /reports/{session_id}/research": "Gather cited research for the outline",
            "POST /reports/{session_id}/draft": "Write the draft section by section",
            "POST /reports/{session_id}/edit": "Polish the draft into the final report",
            "POST /reports/{session_id}/reset": "Reset the workflow to its initial stage",
            "GET /reports/{session_id}/export": "Download the final report as markdown",
            "POST /reports/{session_id}/send": "Email the final report",
            "POST /panel": "Query the specialist panel",
            "POST /discussions": "Start a simulated team discussion",
            "POST /designs": "Generate nanobody candidates",
            "POST /targets": "Look up protein targets for a disease",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

// ---- Report workflow ----

async fn create_report(State(state): State<AppState>) -> ApiResult<CreateReportResponse> {
    let session_id = Uuid::new_v4().to_string();
    let session = Session::new(session_id.clone(), ReportWorkflow::new());

    save_report(&state, session).await?;
    info!("Report session {} created", session_id);

    Ok(Json(CreateReportResponse {
        session_id,
        stage: ReportStage::Start,
    }))
}

async fn get_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ReportStateResponse> {
    let session = load_report(&state, &session_id).await?;
    Ok(Json(ReportStateResponse::from_workflow(
        session_id,
        &session.state,
    )))
}

async fn generate_outline(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<OutlineRequest>,
) -> ApiResult<ReportStateResponse> {
    let mut session = load_report(&state, &session_id).await?;

    let next = state
        .controller()
        .generate_outline(&session.state, &request.question)
        .await
        .map_err(flow_error)?;

    session.state = next;
    let response = ReportStateResponse::from_workflow(session_id, &session.state);
    save_report(&state, session).await?;
    Ok(Json(response))
}

async fn gather_research(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ReportStateResponse> {
    let mut session = load_report(&state, &session_id).await?;

    let next = state
        .controller()
        .gather_research(&session.state)
        .await
        .map_err(flow_error)?;

    session.state = next;
    let response = ReportStateResponse::from_workflow(session_id, &session.state);
    save_report(&state, session).await?;
    Ok(Json(response))
}

async fn write_draft(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ReportStateResponse> {
    let mut session = load_report(&state, &session_id).await?;

    let next = state
        .controller()
        .write_draft(&session.state, |_, _| {})
        .await
        .map_err(flow_error)?;

    session.state = next;
    let response = ReportStateResponse::from_workflow(session_id, &session.state);
    save_report(&state, session).await?;
    Ok(Json(response))
}

async fn edit_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ReportStateResponse> {
    let mut session = load_report(&state, &session_id).await?;

    let next = state
        .controller()
        .edit_report(&session.state)
        .await
        .map_err(flow_error)?;

    session.state = next;
    let response = ReportStateResponse::from_workflow(session_id, &session.state);
    save_report(&state, session).await?;
    Ok(Json(response))
}

async fn reset_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ReportStateResponse> {
    let mut session = load_report(&state, &session_id).await?;

    session.state.reset();
    let response = ReportStateResponse::from_workflow(session_id, &session.state);
    save_report(&state, session).await?;
    Ok(Json(response))
}

async fn export_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let session = load_report(&state, &session_id).await?;

    if session.state.stage != ReportStage::EditingComplete {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "Report is not finished; nothing to export" })),
        ));
    }

    let report = session.state.final_report.clone().unwrap_or_default();
    let question = session.state.research_question.as_deref().unwrap_or("");
    let filename = export_filename(question);

    Ok((
        [
            (CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        report,
    )
        .into_response())
}

/// Download name derived from a sanitized prefix of the research question
fn export_filename(question: &str) -> String {
    let prefix: String = question
        .chars()
        .take(30)
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();

    if prefix.is_empty() {
        "research_report.md".to_string()
    } else {
        format!("{}.md", prefix)
    }
}

async fn send_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SendReportRequest>,
) -> ApiResult<Value> {
    if request.recipient.trim().is_empty() {
        return Err(bad_request_error("Recipient address is required"));
    }

    let session = load_report(&state, &session_id).await?;
    if session.state.stage != ReportStage::EditingComplete {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "Report is not finished; nothing to send" })),
        ));
    }

    let question = session.state.research_question.as_deref().unwrap_or("");
    let report = session.state.final_report.as_deref().unwrap_or("");

    let outcome = state
        .notifier
        .send(
            request.recipient.trim(),
            &format!("Research Report: {}", question),
            report,
        )
        .await;

    Ok(Json(json!({
        "session_id": session_id,
        "success": outcome.success,
        "message": outcome.message
    })))
}

async fn load_report(
    state: &AppState,
    session_id: &str,
) -> Result<Session<ReportWorkflow>, ApiError> {
    match state.reports.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Report session not found", session_id)),
        Err(e) => {
            error!("Failed to load session {}: {}", session_id, e);
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

async fn save_report(state: &AppState, session: Session<ReportWorkflow>) -> Result<(), ApiError> {
    state.reports.save(session).await.map_err(|e| {
        error!("Failed to save report session: {}", e);
        internal_error("Failed to save session", &e.to_string())
    })
}

// ---- Specialist panel ----

async fn panel_query(
    State(state): State<AppState>,
    Json(request): Json<PanelRequest>,
) -> ApiResult<crate::panel::PanelReview> {
    if request.question.trim().is_empty() {
        return Err(bad_request_error("Question is required"));
    }

    let review = run_panel(&state.gateway, state.policy, request.question.trim())
        .await
        .map_err(flow_error)?;

    Ok(Json(review))
}

// ---- Discussion simulator ----

async fn create_discussion(
    State(state): State<AppState>,
    Json(request): Json<DiscussionRequest>,
) -> ApiResult<DiscussionStateResponse> {
    if request.agenda.trim().is_empty() {
        return Err(bad_request_error("Agenda is required"));
    }
    if request.rounds == 0 {
        return Err(bad_request_error("At least one round is required"));
    }

    let discussion_id = Uuid::new_v4().to_string();
    let mut discussion = Discussion::new(request.agenda.trim(), request.rounds);

    initialize_discussion(&state.gateway, state.policy, &mut discussion)
        .await
        .map_err(flow_error)?;

    let response = DiscussionStateResponse::from_discussion(discussion_id.clone(), &discussion);
    save_discussion(&state, Session::new(discussion_id, discussion)).await?;
    Ok(Json(response))
}

async fn get_discussion(
    State(state): State<AppState>,
    Path(discussion_id): Path<String>,
) -> ApiResult<DiscussionStateResponse> {
    let session = load_discussion(&state, &discussion_id).await?;
    Ok(Json(DiscussionStateResponse::from_discussion(
        discussion_id,
        &session.state,
    )))
}

async fn advance_discussion_turn(
    State(state): State<AppState>,
    Path(discussion_id): Path<String>,
) -> ApiResult<DiscussionStateResponse> {
    let mut session = load_discussion(&state, &discussion_id).await?;

    advance_discussion(&state.gateway, state.policy, &mut session.state)
        .await
        .map_err(flow_error)?;

    let response = DiscussionStateResponse::from_discussion(discussion_id, &session.state);
    save_discussion(&state, session).await?;
    Ok(Json(response))
}

async fn load_discussion(
    state: &AppState,
    discussion_id: &str,
) -> Result<Session<Discussion>, ApiError> {
    match state.discussions.get(discussion_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Discussion not found", discussion_id)),
        Err(e) => {
            error!("Failed to load discussion {}: {}", discussion_id, e);
            Err(internal_error("Failed to load discussion", &e.to_string()))
        }
    }
}

async fn save_discussion(state: &AppState, session: Session<Discussion>) -> Result<(), ApiError> {
    state.discussions.save(session).await.map_err(|e| {
        error!("Failed to save discussion: {}", e);
        internal_error("Failed to save discussion", &e.to_string())
    })
}

// ---- Nanobody design lab ----

async fn design_nanobodies(
    State(state): State<AppState>,
    Json(request): Json<DesignRequest>,
) -> ApiResult<crate::design::DesignResult> {
    let result = design_candidates(
        &state.gateway,
        state.policy,
        &request.nanobody,
        &request.design_goal,
    )
    .await
    .map_err(flow_error)?;

    Ok(Json(result))
}

async fn analyze_designs(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<Vec<crate::design::CandidateMetrics>> {
    let rows = analyze_candidates(
        &state.gateway,
        state.policy,
        &request.sequences,
        &request.wildtype,
    )
    .await
    .map_err(flow_error)?;

    Ok(Json(rows))
}

// ---- Protein target lookup ----

async fn lookup_targets(
    State(state): State<AppState>,
    Json(request): Json<TargetsRequest>,
) -> ApiResult<Value> {
    let proteins = fetch_targets(&state.gateway, state.policy, &request.disease)
        .await
        .map_err(flow_error)?;

    Ok(Json(json!({ "proteins": proteins })))
}

// ---- Accounts ----

async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<Value> {
    state
        .credentials
        .signup(&request.email, &request.password)
        .map_err(auth_error)?;

    // Welcome email failure is reported, never fatal
    let outcome = state
        .notifier
        .send(
            request.email.trim(),
            "Welcome to the Research Assistant",
            "Your account has been created. You can now sign in and start a report.",
        )
        .await;

    Ok(Json(json!({
        "status": "created",
        "welcome_email": {
            "success": outcome.success,
            "message": outcome.message
        }
    })))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Value> {
    let authenticated = state
        .credentials
        .verify(&request.email, &request.password)
        .map_err(auth_error)?;

    Ok(Json(json!({ "authenticated": authenticated })))
}
