pub mod api_client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod keep_alive;
pub mod models;
pub mod retry;
pub mod startup;
