pub mod app;
pub mod config;
pub mod gateway;
pub mod models;
pub mod prompts;
pub mod rate_limit;
pub mod validate;
