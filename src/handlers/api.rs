// src/handlers/api.rs
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::models::YieldSeries;
use crate::services::dashboard::{Dashboard, Section};
use crate::services::session::{Controls, ControlsUpdate};
use crate::services::transform;
use crate::state::AppState;

use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct LookbackQuery {
    pub lookback_days: Option<usize>,
}

/// Controls of the caller's session, or 401 when it is not authenticated.
async fn require_auth(state: &AppState, token: Option<&str>) -> Result<Controls, Rejection> {
    let ctx = state.ctx.lock().await;
    let controls = token
        .and_then(|t| ctx.session(t))
        .filter(|s| s.is_authenticated())
        .map(|s| s.controls);
    controls.ok_or_else(|| warp::reject::custom(ApiError::unauthorized()))
}

fn lookback_for(mut controls: Controls, query: &LookbackQuery) -> usize {
    controls.apply(&ControlsUpdate {
        lookback_days: query.lookback_days,
        ..Default::default()
    });
    controls.lookback_days
}

async fn yield_section(
    state: &AppState,
    token: Option<String>,
    query: &LookbackQuery,
) -> Result<Section<Arc<YieldSeries>>, Rejection> {
    let controls = require_auth(state, token.as_deref()).await?;
    let token = token.unwrap_or_default();
    let lookback = lookback_for(controls, query);
    Ok(Section::from_result(
        "treasury yield",
        state.dashboard.yields(&state.ctx, &token, lookback).await,
    ))
}

pub async fn get_yields(
    query: LookbackQuery,
    token: Option<String>,
    state: Arc<AppState>,
) -> Result<Json, Rejection> {
    info!("Handling request for treasury yields");
    let section = yield_section(&state, token, &query).await?.map(|s| (*s).clone());
    Ok(warp::reply::json(&section))
}

pub async fn get_yield_curve(
    query: LookbackQuery,
    token: Option<String>,
    state: Arc<AppState>,
) -> Result<Json, Rejection> {
    info!("Handling request for the yield curve snapshot");
    let section = yield_section(&state, token, &query)
        .await?
        .map(|s| transform::build_yield_curve_snapshot(&s));
    Ok(warp::reply::json(&section))
}

pub async fn get_credit_spreads(token: Option<String>, state: Arc<AppState>) -> Result<Json, Rejection> {
    require_auth(&state, token.as_deref()).await?;
    info!("Handling request for credit spreads");
    let section = Section::from_result("credit spread", state.dashboard.credit_spreads_bps().await);
    Ok(warp::reply::json(&section))
}

pub async fn get_releases(token: Option<String>, state: Arc<AppState>) -> Result<Json, Rejection> {
    let controls = require_auth(&state, token.as_deref()).await?;
    info!("Handling request for upcoming releases");
    let section = state
        .dashboard
        .upcoming_releases(Dashboard::today(), controls.days_ahead, controls.only_important)
        .await;
    Ok(warp::reply::json(&section))
}

pub async fn get_earnings(token: Option<String>, state: Arc<AppState>) -> Result<Json, Rejection> {
    require_auth(&state, token.as_deref()).await?;
    info!("Handling request for earnings dates");
    Ok(warp::reply::json(&state.dashboard.earnings(Dashboard::today()).await))
}

pub async fn get_fed_futures(token: Option<String>, state: Arc<AppState>) -> Result<Json, Rejection> {
    require_auth(&state, token.as_deref()).await?;
    info!("Handling request for fed funds futures");
    Ok(warp::reply::json(&state.dashboard.fed_futures(Dashboard::today()).await))
}

pub async fn get_indices(token: Option<String>, state: Arc<AppState>) -> Result<Json, Rejection> {
    require_auth(&state, token.as_deref()).await?;
    info!("Handling request for index prices");
    Ok(warp::reply::json(&state.dashboard.index_prices().await))
}
