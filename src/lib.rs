pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod runner;
pub mod scrapers;
pub mod store;
