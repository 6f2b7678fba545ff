// src/handlers/page.rs
use log::{debug, info};
use std::sync::Arc;
use warp::Rejection;

use crate::services::dashboard::Dashboard;
use crate::services::page::{render_dashboard, render_login};
use crate::services::session::{AuthState, ControlsUpdate};
use crate::state::AppState;

/// The dashboard when the caller's session is authenticated, the credential
/// prompt otherwise.
pub async fn get_index(
    update: ControlsUpdate,
    token: Option<String>,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Rejection> {
    let auth_state = {
        let mut ctx = state.ctx.lock().await;
        let auth_state = ctx.auth_state(token.as_deref());
        if auth_state == AuthState::Authenticated {
            if let Some(session) = token.as_deref().and_then(|t| ctx.session_mut(t)) {
                session.controls.apply(&update);
            }
        }
        auth_state
    };

    let view = match token.as_deref() {
        Some(t) => state.dashboard.render(&state.ctx, t, Dashboard::today()).await,
        None => None,
    };
    match view {
        Some(view) => {
            info!("Dashboard rendered");
            Ok(warp::reply::html(render_dashboard(&view)))
        }
        None => {
            debug!("Rendering login prompt in state {:?}", auth_state);
            Ok(warp::reply::html(render_login(auth_state)))
        }
    }
}
