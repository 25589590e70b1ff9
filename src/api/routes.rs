//! HTTP surface: manual detection triggers, the cron-gated bulk trigger, and
//! read queries over the durable edges.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::db::models::LiveEdgeRow;
use crate::error::{AppError, Result};
use crate::lifecycle::{EdgeFilter, LifecycleManager};
use crate::orchestrator::DetectionOrchestrator;
use crate::state::GameStore;
use crate::types::{CycleSummary, EdgeStatus, EdgeType, ReconcileStats, SweepStats};

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<DetectionOrchestrator>,
    pub manager: Arc<LifecycleManager>,
    pub store: Arc<GameStore>,
    pub latency: Arc<LatencyStats>,
    pub cron_secret: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/detect", post(detect_game))
        .route("/detect/run", post(detect_all))
        .route("/edges", get(list_edges))
        .route("/games/:game_id/edges", get(game_edges))
        .route("/stats/latency", get(latency_stats))
        .with_state(state)
}

pub async fn serve(state: ApiState, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "api listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Health {
    status: &'static str,
    games: usize,
}

async fn health(State(state): State<ApiState>) -> Json<Health> {
    Json(Health { status: "ok", games: state.store.game_count() })
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DetectRequest {
    game_id: String,
    sport: String,
}

#[derive(Serialize)]
struct DetectResponse {
    game_id: String,
    stats: ReconcileStats,
    ceq_edges: usize,
    ceq: crate::scorer::GameCeq,
    sweep: SweepStats,
}

async fn detect_game(
    State(state): State<ApiState>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<DetectResponse>> {
    if req.game_id.trim().is_empty() {
        return Err(AppError::BadRequest("game_id is required".to_string()));
    }
    if req.sport.trim().is_empty() {
        return Err(AppError::BadRequest("sport is required".to_string()));
    }
    let game = state.orchestrator.resolve_game(&req.game_id).await?;
    if req.sport != game.sport {
        return Err(AppError::BadRequest(format!(
            "game {} belongs to {}, not {}",
            game.id, game.sport, req.sport
        )));
    }
    let report = state.orchestrator.run_game(&game).await?;
    // Single-game triggers still sweep every known edge, not just this
    // game's.
    let sweep = state.manager.sweep(crate::types::now_ms()).await?;
    Ok(Json(DetectResponse {
        game_id: report.game_id,
        stats: report.stats,
        ceq_edges: report.ceq.edge_count(),
        ceq: report.ceq,
        sweep,
    }))
}

/// An unset secret means the bulk trigger always rejects.
fn cron_authorized(secret: &str, presented: Option<&str>) -> bool {
    !secret.is_empty() && presented == Some(secret)
}

/// Bulk trigger, gated on the shared cron secret.
async fn detect_all(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CycleSummary>> {
    let presented = headers.get("x-cron-key").and_then(|v| v.to_str().ok());
    if !cron_authorized(&state.cron_secret, presented) {
        return Err(AppError::Unauthorized);
    }
    let summary = state.orchestrator.run_bulk().await;
    Ok(Json(summary))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EdgesQuery {
    status: Option<String>,
    edge_type: Option<String>,
    sport: Option<String>,
    min_confidence: Option<f64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct EdgesResponse {
    count: usize,
    edges: Vec<LiveEdgeRow>,
}

async fn list_edges(
    State(state): State<ApiState>,
    Query(q): Query<EdgesQuery>,
) -> Result<Json<EdgesResponse>> {
    let status = match q.status.as_deref() {
        None => None,
        Some(raw) => Some(
            EdgeStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status: {raw}")))?,
        ),
    };
    let edge_type = match q.edge_type.as_deref() {
        None => None,
        Some(raw) => Some(
            EdgeType::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown edge_type: {raw}")))?,
        ),
    };
    let filter = EdgeFilter {
        status,
        edge_type,
        sport: q.sport.as_deref(),
        min_confidence: q.min_confidence,
    };
    let limit = q.limit.unwrap_or(100).clamp(1, 500);
    let edges = state.manager.list_edges(&filter, limit).await?;
    Ok(Json(EdgesResponse { count: edges.len(), edges }))
}

#[derive(Serialize)]
struct GameEdgesResponse {
    game_id: String,
    active: Vec<LiveEdgeRow>,
    fading: Vec<LiveEdgeRow>,
    expired: Vec<LiveEdgeRow>,
}

async fn game_edges(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
) -> Result<Json<GameEdgesResponse>> {
    let mut rows = state.manager.edges_for_game(&game_id).await?;
    // Latest row per detection key; older expired generations drop out.
    rows.sort_by_key(|r| std::cmp::Reverse(r.detected_at_ms));
    let mut seen = std::collections::HashSet::new();

    let mut resp = GameEdgesResponse {
        game_id,
        active: Vec::new(),
        fading: Vec::new(),
        expired: Vec::new(),
    };
    for row in rows {
        let key = (row.market_type.clone(), row.outcome_key.clone(), row.edge_type.clone());
        if !seen.insert(key) {
            continue;
        }
        match row.status() {
            Some(EdgeStatus::Active) => resp.active.push(row),
            Some(EdgeStatus::Fading) => resp.fading.push(row),
            Some(EdgeStatus::Expired) | None => resp.expired.push(row),
        }
    }
    Ok(Json(resp))
}

async fn latency_stats(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_gate_requires_exact_match() {
        assert!(cron_authorized("s3cret", Some("s3cret")));
        assert!(!cron_authorized("s3cret", Some("wrong")));
        assert!(!cron_authorized("s3cret", None));
    }

    #[test]
    fn empty_secret_rejects_everything() {
        assert!(!cron_authorized("", Some("")));
        assert!(!cron_authorized("", None));
    }

    #[test]
    fn detect_request_requires_both_fields() {
        assert!(serde_json::from_str::<DetectRequest>(r#"{"game_id":"g1"}"#).is_err());
        assert!(serde_json::from_str::<DetectRequest>(r#"{"sport":"basketball_nba"}"#).is_err());
        let ok: DetectRequest =
            serde_json::from_str(r#"{"game_id":"g1","sport":"basketball_nba"}"#).unwrap();
        assert_eq!(ok.game_id, "g1");
        assert_eq!(ok.sport, "basketball_nba");
    }
}
