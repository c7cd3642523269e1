pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod realtime;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
