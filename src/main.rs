use dotenv::dotenv;
use log::{error, info};
use std::net::SocketAddr;
use warp::Filter;

use macro_dashboard_fbu::config::AppConfig;
use macro_dashboard_fbu::routes;
use macro_dashboard_fbu::services::dashboard::Dashboard;
use macro_dashboard_fbu::services::session::DashboardContext;
use macro_dashboard_fbu::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {:#}", e);
        e
    })?;
    info!("Using PORT: {}", config.port);

    // Bind to 0.0.0.0 so the service is reachable inside a container
    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();

    let dashboard = Dashboard::from_config(&config)?;
    let state = AppState::new(dashboard, DashboardContext::new(config.password.clone()));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST"]);

    let api = routes::routes(state).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
