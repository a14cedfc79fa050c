pub mod app;
pub mod atv;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod pairing;
pub mod pin;
pub mod prompt;
pub mod tv;
