// src/services/mod.rs
pub mod cache;
pub mod charts;
pub mod dashboard;
pub mod fred;
pub mod market_data;
pub mod nasdaq;
pub mod page;
pub mod provider;
pub mod session;
pub mod transform;
pub mod yahoo;
