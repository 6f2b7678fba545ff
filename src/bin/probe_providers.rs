// src/bin/probe_providers.rs
use dotenv::dotenv;
use log::{error, info};
use reqwest::Client;
use std::time::Duration;

use macro_dashboard_fbu::services::dashboard::Dashboard;
use macro_dashboard_fbu::services::fred::FredClient;
use macro_dashboard_fbu::services::market_data;
use macro_dashboard_fbu::services::nasdaq::NasdaqClient;
use macro_dashboard_fbu::services::yahoo::YahooClient;

/// Hits every provider once and prints what came back.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let api_key = std::env::var("FRED_API_KEY")
        .or_else(|_| std::env::var("fredapikey"))
        .ok();
    let client = Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .build()?;
    let fred = FredClient::new(client.clone(), api_key);
    let yahoo = YahooClient::new(client.clone());
    let nasdaq = NasdaqClient::new(client);
    let today = Dashboard::today();
    info!("Probing providers as of {}", today);

    match market_data::fetch_yield_series(&fred, 10).await {
        Ok(table) => println!("Yields:          {} rows, last {:?}", table.len(), table.dates.last()),
        Err(e) => error!("Yields failed: {}", e),
    }
    match market_data::fetch_credit_spreads(&fred, 10).await {
        Ok(table) => println!("Credit spreads:  {} rows", table.len()),
        Err(e) => error!("Credit spreads failed: {}", e),
    }

    let releases = market_data::fetch_upcoming_releases(&fred, today, 14, true).await;
    println!("Releases:        {} high-impact in the next 14 days", releases.len());

    match market_data::fetch_earnings_dates(&nasdaq, today).await {
        Ok(events) => println!("Earnings:        {} this week", events.len()),
        Err(e) => error!("Earnings failed: {}", e),
    }
    match market_data::fetch_fed_futures_curve(&yahoo, &fred, today).await {
        Ok(points) => println!("Fed futures:     {} contracts", points.len()),
        Err(e) => error!("Fed futures failed: {}", e),
    }
    match market_data::fetch_index_prices(&yahoo).await {
        Some(prices) => println!("Index prices:    {} tickers", prices.series.len()),
        None => error!("Index prices failed"),
    }
    Ok(())
}
