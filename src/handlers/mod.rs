// src/handlers/mod.rs
pub mod api;
pub mod auth;
pub mod error;
pub mod page;
