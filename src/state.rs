// src/state.rs
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::services::dashboard::Dashboard;
use crate::services::session::DashboardContext;

/// What every handler gets: the provider set and the session table.
pub struct AppState {
    pub dashboard: Dashboard,
    pub ctx: Mutex<DashboardContext>,
}

impl AppState {
    pub fn new(dashboard: Dashboard, ctx: DashboardContext) -> Arc<Self> {
        Arc::new(AppState {
            dashboard,
            ctx: Mutex::new(ctx),
        })
    }
}
