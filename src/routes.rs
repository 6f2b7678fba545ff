// src/routes.rs
use log::info;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::api::{
    get_credit_spreads, get_earnings, get_fed_futures, get_indices, get_releases, get_yield_curve,
    get_yields, LookbackQuery,
};
use crate::handlers::auth::{post_login, post_logout, LoginForm};
use crate::handlers::error::ApiError;
use crate::handlers::page::get_index;
use crate::services::session::{ControlsUpdate, SESSION_COOKIE};
use crate::state::AppState;

const MAX_FORM_BYTES: u64 = 4 * 1024;

// Turn rejections into JSON error bodies
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(api_error) = err.find::<ApiError>() {
        (api_error.status, api_error.message.clone())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let state_filter = warp::any().map(move || state.clone());
    let session = warp::cookie::optional::<String>(SESSION_COOKIE);

    let index_route = warp::path::end()
        .and(warp::get())
        .and(warp::query::<ControlsUpdate>())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(get_index);

    let login_route = warp::path!("login")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_FORM_BYTES))
        .and(warp::body::form::<LoginForm>())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(post_login);

    let logout_route = warp::path!("logout")
        .and(warp::post())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(post_logout);

    let health_route = warp::path!("healthz")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let yields_route = warp::path!("api" / "v1" / "yields")
        .and(warp::get())
        .and(warp::query::<LookbackQuery>())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(get_yields);

    let yield_curve_route = warp::path!("api" / "v1" / "yield_curve")
        .and(warp::get())
        .and(warp::query::<LookbackQuery>())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(get_yield_curve);

    let credit_route = warp::path!("api" / "v1" / "credit_spreads")
        .and(warp::get())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(get_credit_spreads);

    let releases_route = warp::path!("api" / "v1" / "releases")
        .and(warp::get())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(get_releases);

    let earnings_route = warp::path!("api" / "v1" / "earnings")
        .and(warp::get())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(get_earnings);

    let futures_route = warp::path!("api" / "v1" / "fed_futures")
        .and(warp::get())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(get_fed_futures);

    let indices_route = warp::path!("api" / "v1" / "indices")
        .and(warp::get())
        .and(session.clone())
        .and(state_filter.clone())
        .and_then(get_indices);

    info!("All routes configured successfully.");

    index_route
        .or(login_route)
        .or(logout_route)
        .or(health_route)
        .or(yields_route)
        .or(yield_curve_route)
        .or(credit_route)
        .or(releases_route)
        .or(earnings_route)
        .or(futures_route)
        .or(indices_route)
        .recover(handle_rejection)
}
