pub mod analytics;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod eth;
pub mod models;
pub mod storage;
