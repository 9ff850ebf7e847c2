pub mod config;
pub mod contest;
pub mod db;
pub mod environment;
pub mod errors;
pub mod export;
pub mod log;
pub mod normalization;
pub mod notify;
pub mod rate_limit;
pub mod registration;
pub mod routes;
pub mod validation;
