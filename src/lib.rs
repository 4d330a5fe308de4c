pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod output;
pub mod providers;
pub mod session;
pub mod storage;
