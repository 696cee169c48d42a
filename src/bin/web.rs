use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use football_value_bets::config::AppConfig;
use football_value_bets::odds_api::OddsApiClient;
use football_value_bets::pipeline::RunReport;
use football_value_bets::value_bets::PickFilter;
use football_value_bets::{fetch_and_run, StakedPick};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

// Custom filters for formatting
mod filters {
    use chrono::{DateTime, Utc};

    pub fn format_percent(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.1}%", value * 100.0))
    }

    pub fn format_edge(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:+.2}%", value * 100.0))
    }

    pub fn format_money(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.2}", value))
    }

    pub fn kickoff(dt: &DateTime<Utc>) -> ::askama::Result<String> {
        Ok(dt.format("%Y-%m-%d %H:%M").to_string())
    }
}

#[derive(Template)]
#[template(path = "picks.html")]
struct PicksTemplate {
    leagues: Vec<String>,
    loaded: bool,
    total: usize,
    rows: Vec<StakedPick>,
    market: String,
    league: String,
    book: String,
    min_edge: String,
    min_prob: String,
}

// Wrapper to render askama templates as axum responses
struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

struct AppState {
    config: AppConfig,
    report: RwLock<Option<RunReport>>,
}

type SharedState = Arc<AppState>;

#[derive(Debug, Default, Deserialize)]
struct RunQuery {
    #[serde(default)]
    token: String,
}

/// Raw query strings; unparsable numbers are ignored rather than rejected
#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    #[serde(default)]
    market: String,
    #[serde(default)]
    league: String,
    #[serde(default)]
    book: String,
    #[serde(default)]
    min_edge: String,
    #[serde(default)]
    min_prob: String,
}

impl ViewQuery {
    fn filter(&self) -> PickFilter {
        let text = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        PickFilter {
            market: text(&self.market),
            league: text(&self.league),
            book: text(&self.book),
            min_edge: self.min_edge.trim().parse().ok(),
            min_prob: self.min_prob.trim().parse().ok(),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn run(State(state): State<SharedState>, Query(query): Query<RunQuery>) -> Response {
    if let Some(want) = state.config.run_token.as_deref() {
        if query.token.trim() != want {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "ok": false, "error": "invalid_token" })),
            )
                .into_response();
        }
    }

    match fetch_and_run(&state.config).await {
        Ok(report) => {
            let body = json!({
                "ok": true,
                "fixtures": report.fixtures,
                "quotes": report.quotes,
                "model_rows": report.model_sets,
                "skipped_fixtures": report.skipped_fixtures.len(),
                "picks": report.picks.len(),
            });
            *state.report.write().await = Some(report);
            Json(body).into_response()
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": format!("{:#}", e) })),
            )
                .into_response()
        }
    }
}

async fn view(State(state): State<SharedState>, Query(query): Query<ViewQuery>) -> Response {
    let report = state.report.read().await;
    let filter = query.filter();

    let (loaded, total, rows) = match report.as_ref() {
        Some(r) => (
            true,
            r.picks.len(),
            r.picks
                .iter()
                .filter(|p| filter.matches(&p.pick))
                .cloned()
                .collect(),
        ),
        None => (false, 0, Vec::new()),
    };

    let template = PicksTemplate {
        leagues: state.config.leagues.clone(),
        loaded,
        total,
        rows,
        market: query.market,
        league: query.league,
        book: query.book,
        min_edge: query.min_edge,
        min_prob: query.min_prob,
    };

    HtmlTemplate(template).into_response()
}

async fn probe(State(state): State<SharedState>) -> Response {
    let config = &state.config;
    let (usage, statuses) = match config.require_api_key() {
        Ok(key) => {
            let client = OddsApiClient::new(key.to_string(), config.regions.clone());
            let usage = match client.check_usage().await {
                Ok(usage) => json!(usage),
                Err(e) => json!({ "error": format!("{:#}", e) }),
            };
            (usage, json!(client.league_statuses(&config.leagues).await))
        }
        Err(e) => (json!({ "error": e.to_string() }), json!([])),
    };

    Json(json!({
        "provider": "the-odds-api",
        "leagues": config.leagues,
        "hours_ahead": config.hours_ahead,
        "regions": config.regions,
        "usage": usage,
        "league_status": statuses,
    }))
    .into_response()
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    println!("Fetching fixtures and odds...");

    // Fetch data on startup
    let report = match fetch_and_run(&config).await {
        Ok(report) => {
            println!("Data loaded successfully");
            println!("  - {} fixtures", report.fixtures);
            println!("  - {} quotes", report.quotes);
            println!("  - {} value picks", report.picks.len());
            Some(report)
        }
        Err(e) => {
            warn!("Error fetching data: {:#}", e);
            eprintln!("Server will start; call /run to load picks");
            None
        }
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState {
        config,
        report: RwLock::new(report),
    });

    // Build router with routes
    let app = Router::new()
        .route("/", get(health))
        .route("/run", get(run))
        .route("/view", get(view))
        .route("/probe", get(probe))
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Listening on http://{}", addr);
    println!("Press Ctrl+C to stop\n");

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
    }
}
