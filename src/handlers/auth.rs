// src/handlers/auth.rs
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use warp::http::header::SET_COOKIE;
use warp::http::Uri;
use warp::Rejection;

use crate::services::session::{SESSION_COOKIE, SESSION_IDLE_TTL};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub password: String,
}

fn session_cookie(token: &str, max_age: u64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE, token, max_age
    )
}

pub async fn post_login(
    form: LoginForm,
    token: Option<String>,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Rejection> {
    let (token, outcome) = state.ctx.lock().await.login(token.as_deref(), &form.password);
    info!("Login attempt -> {:?}", outcome);
    Ok(warp::reply::with_header(
        warp::redirect::see_other(Uri::from_static("/")),
        SET_COOKIE,
        session_cookie(&token, SESSION_IDLE_TTL.as_secs()),
    ))
}

pub async fn post_logout(token: Option<String>, state: Arc<AppState>) -> Result<impl warp::Reply, Rejection> {
    state.ctx.lock().await.logout(token.as_deref());
    Ok(warp::reply::with_header(
        warp::redirect::see_other(Uri::from_static("/")),
        SET_COOKIE,
        session_cookie("", 0),
    ))
}
