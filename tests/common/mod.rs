//! In-process mock of the BiteWise backend for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Notify;

use bitewise::{ApiClient, ChatService, ClientConfig, MemoryStore, SessionController, TokenStore};

pub const GOOD_EMAIL: &str = "ann@example.com";
pub const GOOD_PASSWORD: &str = "secret";
pub const REFRESH_TOKEN: &str = "refresh-1";
pub const NEW_CONVERSATION_ID: &str = "77";
pub const LOGGED_INTAKE_ID: &str = "901";

/// Unsigned compact token for `sub` expiring `secs` from now. `nonce` keeps
/// otherwise identical tokens distinct.
pub fn jwt(sub: &str, secs: i64, nonce: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = json!({ "sub": sub, "exp": Utc::now().timestamp() + secs, "jti": nonce });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

pub struct MockState {
    pub valid_access: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
    pub refresh_succeeds: AtomicBool,
    pub logout_fails: AtomicBool,
    pub chat_fails: AtomicBool,
    pub hold_chat: AtomicBool,
    pub chat_gate: Notify,
}

impl MockState {
    fn new() -> Self {
        Self {
            valid_access: Mutex::new(jwt("1", 3600, "initial")),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
            refresh_succeeds: AtomicBool::new(true),
            logout_fails: AtomicBool::new(false),
            chat_fails: AtomicBool::new(false),
            hold_chat: AtomicBool::new(false),
            chat_gate: Notify::new(),
        }
    }

    pub fn valid_access(&self) -> String {
        self.valid_access.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.valid_access());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Not authenticated")
}

fn message_json(id: i64, conversation_id: &str, is_user: bool, content: &str) -> Value {
    let now = Utc::now().to_rfc3339();
    json!({
        "id": id,
        "conversation_id": conversation_id.parse::<i64>().unwrap_or(0),
        "is_user_message": is_user,
        "content": content,
        "status": "sent",
        "created_at": now,
        "updated_at": now,
    })
}

fn user_json() -> Value {
    json!({ "id": 1, "email": GOOD_EMAIL, "username": "ann", "full_name": "Ann Example" })
}

async fn login(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if email != GOOD_EMAIL || password != GOOD_PASSWORD {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect email or password");
    }
    Json(json!({
        "access_token": jwt("1", 3600, "login"),
        "refresh_token": REFRESH_TOKEN,
        "token_type": "bearer",
        "expires_in": 3600,
        "user": user_json(),
    }))
    .into_response()
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Give concurrent callers time to pile up behind the refresh.
    tokio::time::sleep(Duration::from_millis(50)).await;

    if !state.refresh_succeeds.load(Ordering::SeqCst) || body["refresh_token"] != REFRESH_TOKEN {
        return detail(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    let count = state.refresh_calls();
    let fresh = jwt("1", 3600, &format!("refreshed-{count}"));
    *state.valid_access.lock().unwrap() = fresh.clone();
    Json(json!({ "access_token": fresh, "expires_in": 1800 })).into_response()
}

async fn logout(State(state): State<Arc<MockState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if state.logout_fails.load(Ordering::SeqCst) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Logout failed");
    }
    Json(json!({ "message": "Logged out" })).into_response()
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(user_json()).into_response()
}

async fn plain(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, "ok").into_response()
}

async fn broken() -> Response {
    (StatusCode::BAD_GATEWAY, "<html>upstream down</html>").into_response()
}

async fn chat_message(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.chat_calls.fetch_add(1, Ordering::SeqCst);
    if state.hold_chat.load(Ordering::SeqCst) {
        state.chat_gate.notified().await;
    }
    if state.chat_fails.load(Ordering::SeqCst) {
        return detail(StatusCode::SERVICE_UNAVAILABLE, "Assistant is unavailable");
    }
    let conversation_id = body["conversation_id"]
        .as_str()
        .unwrap_or(NEW_CONVERSATION_ID)
        .to_string();
    let content = body["message"].as_str().unwrap_or_default();
    Json(json!({
        "conversation_id": conversation_id.parse::<i64>().unwrap_or(0),
        "user_message": message_json(501, &conversation_id, true, content),
        "ai_message": message_json(502, &conversation_id, false, "Aim for about 1.6 g of protein per kg."),
    }))
    .into_response()
}

async fn list_messages(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "messages": [
            message_json(501, &id, true, "How much protein do I need?"),
            message_json(502, &id, false, "Aim for about 1.6 g of protein per kg."),
        ],
        "total_count": 2,
        "page": 1,
        "page_size": 50,
    }))
    .into_response()
}

async fn list_conversations(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let now = Utc::now().to_rfc3339();
    Json(json!({
        "conversations": [
            { "id": 77, "title": "Protein", "created_at": now, "updated_at": now, "unread_count": 1 }
        ],
        "total_count": 1,
        "page": 1,
        "page_size": 20,
    }))
    .into_response()
}

fn date_range(params: &HashMap<String, String>) -> Result<(String, String), Response> {
    match (params.get("start_date"), params.get("end_date")) {
        (Some(start), Some(end)) => Ok((start.clone(), end.clone())),
        _ => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": [{ "loc": ["query", "start_date"], "msg": "date range is required" }] })),
        )
            .into_response()),
    }
}

async fn log_intake(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let (Some(dish_id), Some(portion)) = (body["dish_id"].as_str(), body["portion_size"].as_f64())
    else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "dish_id and portion_size are required");
    };
    let intake_time = body["intake_time"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    Json(json!({
        "id": LOGGED_INTAKE_ID.parse::<i64>().unwrap_or(0),
        "dish_id": dish_id.parse::<i64>().unwrap_or(0),
        "dish_name": "Oatmeal",
        "portion_size": portion,
        "intake_time": intake_time,
        "calories": 150.0 * portion,
    }))
    .into_response()
}

async fn list_intakes(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let (start, _) = match date_range(&params) {
        Ok(range) => range,
        Err(response) => return response,
    };
    Json(json!({
        "intakes": [{
            "id": 901,
            "dish_id": 12,
            "dish_name": "Oatmeal",
            "portion_size": 1.0,
            "intake_time": format!("{start}T08:30:00Z"),
            "calories": 150.0,
        }],
        "total_count": 1,
    }))
    .into_response()
}

async fn delete_intake(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if id != LOGGED_INTAKE_ID {
        return detail(StatusCode::NOT_FOUND, "Intake not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn search_dishes(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let Some(query) = params.get("q") else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "q is required");
    };
    let limit = params.get("limit").and_then(|l| l.parse::<usize>().ok()).unwrap_or(10);
    let dishes: Vec<Value> = ["bowl", "salad", "soup"]
        .iter()
        .enumerate()
        .take(limit)
        .map(|(i, kind)| json!({ "id": i + 1, "name": format!("{query} {kind}"), "calories": 320.0 }))
        .collect();
    Json(json!({ "total_count": dishes.len(), "dishes": dishes })).into_response()
}

async fn create_dish(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let mut dish = body;
    dish["id"] = json!(33);
    Json(dish).into_response()
}

async fn quick_stats(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "calories_today": 1450.0,
        "calorie_goal": 2000.0,
        "protein_g": 90.0,
        "carbs_g": 160.0,
        "fats_g": 50.0,
        "meals_logged": 3,
    }))
    .into_response()
}

async fn calorie_stats(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let (start, end) = match date_range(&params) {
        Ok(range) => range,
        Err(response) => return response,
    };
    Json(json!({
        "total_calories": 3800.0,
        "average_daily_calories": 1900.0,
        "daily": [
            { "date": start, "calories": 2000.0 },
            { "date": end, "calories": 1800.0 },
        ],
    }))
    .into_response()
}

async fn macronutrient_stats(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if let Err(response) = date_range(&params) {
        return response;
    }
    Json(json!({ "protein_g": 95.0, "carbs_g": 210.0, "fats_g": 60.0, "protein_pct": 24.0 }))
        .into_response()
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/auth/me", get(me))
            .route("/plain", get(plain))
            .route("/broken", get(broken))
            .route("/chat/message", post(chat_message))
            .route("/chat/conversations", get(list_conversations))
            .route("/chat/conversations/{id}/messages", get(list_messages))
            .route("/intakes", get(list_intakes).post(log_intake))
            .route("/intakes/{id}", delete(delete_intake))
            .route("/dishes", post(create_dish))
            .route("/dishes/search", get(search_dishes))
            .route("/statistics/quick", get(quick_stats))
            .route("/statistics/calories", get(calorie_stats))
            .route("/statistics/macronutrients", get(macronutrient_stats));
        let app = Router::new().nest("/api/v1", api).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url: format!("http://{addr}"), state }
    }

    pub fn client(&self) -> ApiClient {
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
        ApiClient::new(ClientConfig::for_url(&self.base_url), tokens).unwrap()
    }

    pub fn session(&self) -> SessionController {
        let session = SessionController::new(self.client());
        session.initialize();
        session
    }

    /// Client already holding the server's valid token.
    pub fn signed_in_client(&self) -> ApiClient {
        let client = self.client();
        client
            .tokens()
            .set_tokens(&self.state.valid_access(), REFRESH_TOKEN, 3600)
            .unwrap();
        client
    }

    pub fn signed_in_chat(&self) -> ChatService {
        ChatService::new(self.signed_in_client())
    }
}
