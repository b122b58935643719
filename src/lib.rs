pub mod acquisition;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod network;
pub mod output;
pub mod parser;
pub mod render;
pub mod routes;
pub mod services;
pub mod stations;
pub mod stats;
pub mod trips;
