pub mod config;
pub mod context;
pub mod error;
pub mod inference;
pub mod models;
pub mod preprocess;
pub mod routes;
pub mod storage;
