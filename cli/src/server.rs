use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use slank_core::metrics::{ACTIVITY_MULTIPLIERS, weight_loss_plan};
use slank_core::models::{FoodItem, IngredientLine, LogEntry, Recipe, WeightEntry, parse_meal};
use slank_core::service::Tracker;
use slank_core::sheets::is_quota_exceeded;
use slank_core::table::Table;

const BODY_LIMIT: usize = 2 * 1024 * 1024; // 2 MB

#[derive(Clone)]
struct AppState {
    tracker: Arc<Tracker>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct LevelQuery {
    level: Option<usize>,
}

#[derive(Deserialize)]
struct CreateLogRequest {
    date: String,
    meal: String,
    name: String,
    quantity: f64,
    serving: Option<String>,
}

#[derive(Deserialize)]
struct CreateWeightRequest {
    date: String,
    weight: f64,
}

#[derive(Deserialize)]
struct SetTargetRequest {
    target: f64,
}

#[derive(Deserialize)]
struct PlanRequest {
    current: f64,
    desired: f64,
    start: Option<String>,
    target_date: String,
}

#[derive(Deserialize)]
struct CreateFoodRequest {
    name: String,
    calories_per_100g: f64,
    #[serde(default)]
    fat_per_100g: f64,
    #[serde(default)]
    carbs_per_100g: f64,
    #[serde(default)]
    protein_per_100g: f64,
    serving_name: String,
    serving_size_g: f64,
    #[serde(default)]
    food_type: String,
}

#[derive(Deserialize)]
struct CreateTagRequest {
    tag: String,
}

#[derive(Deserialize)]
struct RecipeListQuery {
    tag: Option<String>,
}

#[derive(Deserialize)]
struct ServingsQuery {
    servings: Option<f64>,
}

#[derive(Deserialize)]
struct IngredientBody {
    ingredient: String,
    quantity: f64,
    serving: Option<String>,
}

#[derive(Deserialize)]
struct CreateRecipeRequest {
    name: String,
    #[serde(default)]
    description: String,
    servings: Option<f64>,
    #[serde(default)]
    tags: Vec<String>,
    ingredients: Vec<IngredientBody>,
    #[serde(default)]
    instructions: Vec<String>,
}

#[derive(Deserialize)]
struct SheetBody {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(err) => {
                eprintln!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if is_quota_exceeded(&err) {
            Self::Unavailable("Spreadsheet API quota exceeded, try again shortly".to_string())
        } else {
            Self::Internal(err)
        }
    }
}

/// Map a service error to 400, preserving the quota mapping.
fn bad_request(err: anyhow::Error) -> ApiError {
    if is_quota_exceeded(&err) {
        ApiError::from(err)
    } else {
        ApiError::BadRequest(format!("{err:#}"))
    }
}

/// Map a service error to 404, preserving the quota mapping.
fn not_found(err: anyhow::Error) -> ApiError {
    if is_quota_exceeded(&err) {
        ApiError::from(err)
    } else {
        ApiError::NotFound(format!("{err:#}"))
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

/// Run a service call on the blocking pool; the tracker's backend blocks on
/// network I/O and must stay off the async workers.
async fn with_tracker<T, F>(state: &AppState, f: F) -> Result<anyhow::Result<T>, ApiError>
where
    F: FnOnce(&Tracker) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let tracker = Arc::clone(&state.tracker);
    tokio::task::spawn_blocking(move || f(&tracker))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("worker task failed: {e}")))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Overview / log handlers ---

async fn get_overview(
    State(state): State<AppState>,
    Path((person, date_str)): Path<(String, String)>,
    Query(params): Query<LevelQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_date(&date_str)?;
    let level = params.level.unwrap_or(1);
    if level >= ACTIVITY_MULTIPLIERS.len() {
        return Err(ApiError::BadRequest(format!(
            "level must be between 0 and {}",
            ACTIVITY_MULTIPLIERS.len() - 1
        )));
    }

    let overview = with_tracker(&state, move |t| t.day_overview(&person, date, level))
        .await?
        .map_err(ApiError::from)?;
    let value = serde_json::to_value(overview)
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(value))
}

async fn create_log_entry(
    State(state): State<AppState>,
    Path(person): Path<String>,
    Json(req): Json<CreateLogRequest>,
) -> Result<(StatusCode, Json<LogEntry>), ApiError> {
    let entry = LogEntry {
        date: parse_date(&req.date)?,
        meal: parse_meal(&req.meal).map_err(bad_request)?,
        name: req.name,
        quantity: req.quantity,
        serving: req.serving.unwrap_or_else(|| "g".to_string()),
    };

    let stored = entry.clone();
    with_tracker(&state, move |t| t.add_log_entry(&person, &stored))
        .await?
        .map_err(bad_request)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// --- Weight handlers ---

async fn get_weight_progress(
    State(state): State<AppState>,
    Path(person): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let progress = with_tracker(&state, move |t| t.weight_progress(&person))
        .await?
        .map_err(ApiError::from)?;
    let value = serde_json::to_value(progress)
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(value))
}

async fn create_weight(
    State(state): State<AppState>,
    Path(person): Path<String>,
    Json(req): Json<CreateWeightRequest>,
) -> Result<(StatusCode, Json<WeightEntry>), ApiError> {
    let entry = WeightEntry {
        date: parse_date(&req.date)?,
        weight: req.weight,
    };
    let stored = entry.clone();
    with_tracker(&state, move |t| t.add_weight(&person, &stored))
        .await?
        .map_err(bad_request)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_challenge(
    State(state): State<AppState>,
    Path((person_a, person_b)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let challenge = with_tracker(&state, move |t| t.challenge(&person_a, &person_b))
        .await?
        .map_err(not_found)?;
    let value = serde_json::to_value(challenge)
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(value))
}

// --- Target / plan handlers ---

async fn get_target(
    State(state): State<AppState>,
    Path(person): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let target = with_tracker(&state, move |t| t.target(&person))
        .await?
        .map_err(ApiError::from)?;
    Ok(Json(serde_json::json!({ "target": target })))
}

async fn set_target(
    State(state): State<AppState>,
    Path(person): Path<String>,
    Json(req): Json<SetTargetRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_tracker(&state, move |t| t.set_target(&person, req.target))
        .await?
        .map_err(bad_request)?;
    Ok(Json(serde_json::json!({ "target": req.target })))
}

async fn create_plan(Json(req): Json<PlanRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let start = match req.start {
        Some(ref s) => parse_date(s)?,
        None => chrono::Local::now().date_naive(),
    };
    let target_date = parse_date(&req.target_date)?;
    let plan = weight_loss_plan(req.current, req.desired, start, target_date)
        .map_err(bad_request)?;
    let value = serde_json::to_value(plan).map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(value))
}

// --- Food handlers ---

async fn list_foods(State(state): State<AppState>) -> Result<Json<Vec<FoodItem>>, ApiError> {
    let foods = with_tracker(&state, Tracker::foods)
        .await?
        .map_err(ApiError::from)?;
    Ok(Json(foods))
}

async fn create_food(
    State(state): State<AppState>,
    Json(req): Json<CreateFoodRequest>,
) -> Result<(StatusCode, Json<FoodItem>), ApiError> {
    let item = FoodItem {
        name: req.name,
        fat_per_100g: req.fat_per_100g,
        carbs_per_100g: req.carbs_per_100g,
        protein_per_100g: req.protein_per_100g,
        calories_per_100g: req.calories_per_100g,
        serving_name: req.serving_name,
        serving_size_g: req.serving_size_g,
        food_type: req.food_type,
    };
    let stored = item.clone();
    with_tracker(&state, move |t| t.add_food(&stored))
        .await?
        .map_err(bad_request)?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn delete_food(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_tracker(&state, move |t| t.remove_food(&name))
        .await?
        .map_err(not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Tag handlers ---

async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let tags = with_tracker(&state, Tracker::tags)
        .await?
        .map_err(ApiError::from)?;
    Ok(Json(tags))
}

async fn create_tag(
    State(state): State<AppState>,
    Json(req): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let tag = req.tag.clone();
    with_tracker(&state, move |t| t.add_tag(&tag))
        .await?
        .map_err(bad_request)?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "tag": req.tag }))))
}

async fn delete_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_tracker(&state, move |t| t.remove_tag(&tag))
        .await?
        .map_err(not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Recipe handlers ---

async fn list_recipes(
    State(state): State<AppState>,
    Query(params): Query<RecipeListQuery>,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    let tags: Vec<String> = params.tag.into_iter().collect();
    let recipes = with_tracker(&state, move |t| t.recipes(&tags))
        .await?
        .map_err(ApiError::from)?;
    Ok(Json(recipes))
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let servings = req.servings.unwrap_or(1.0);
    let recipe = Recipe {
        name: req.name,
        description: req.description,
        tags: req.tags,
        ingredients: req
            .ingredients
            .into_iter()
            .map(|i| IngredientLine {
                ingredient: i.ingredient,
                quantity: i.quantity,
                serving: i.serving.unwrap_or_else(|| "g".to_string()),
            })
            .collect(),
        instructions: req.instructions,
    };
    let stored = recipe.clone();
    with_tracker(&state, move |t| t.save_recipe(&stored, servings))
        .await?
        .map_err(bad_request)?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ServingsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let servings = params.servings.unwrap_or(1.0);
    let recipe = with_tracker(&state, move |t| t.scaled_recipe(&name, servings))
        .await?
        .map_err(not_found)?;
    let value = serde_json::to_value(recipe).map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(value))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_tracker(&state, move |t| t.remove_recipe(&name))
        .await?
        .map_err(not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Sheet / cache handlers ---

async fn get_sheet(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Table>, ApiError> {
    let table = with_tracker(&state, move |t| t.sheet(&name))
        .await?
        .map_err(ApiError::from)?;
    Ok(Json(table))
}

async fn put_sheet(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<SheetBody>,
) -> Result<StatusCode, ApiError> {
    let columns: Vec<&str> = body.columns.iter().map(String::as_str).collect();
    let mut table = Table::new(&columns);
    for row in body.rows {
        table.push_row(row).map_err(bad_request)?;
    }
    with_tracker(&state, move |t| t.save_sheet(&name, &table))
        .await?
        .map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_cache(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = with_tracker(&state, Tracker::clear_cache)
        .await?
        .map_err(ApiError::from)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/people/{person}/overview/{date}", get(get_overview))
        .route("/api/v1/people/{person}/log", post(create_log_entry))
        .route(
            "/api/v1/people/{person}/weight",
            get(get_weight_progress).post(create_weight),
        )
        .route(
            "/api/v1/people/{person}/target",
            get(get_target).put(set_target),
        )
        .route("/api/v1/challenge/{a}/{b}", get(get_challenge))
        .route("/api/v1/plan", post(create_plan))
        .route("/api/v1/foods", get(list_foods).post(create_food))
        .route("/api/v1/foods/{name}", delete(delete_food))
        .route("/api/v1/tags", get(list_tags).post(create_tag))
        .route("/api/v1/tags/{tag}", delete(delete_tag))
        .route("/api/v1/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/api/v1/recipes/{name}",
            get(get_recipe).delete(delete_recipe),
        )
        .route("/api/v1/sheets/{name}", get(get_sheet).put(put_sheet))
        .route("/api/v1/cache", delete(clear_cache))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    tracker: Tracker,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        tracker: Arc::new(tracker),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
