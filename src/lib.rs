pub mod api;
pub mod clients;
pub mod config;
pub mod context;
pub mod models;
pub mod notify;
pub mod utils;
pub mod worker;
