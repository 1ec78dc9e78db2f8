pub mod api;
pub mod assignment;
pub mod audit;
pub mod bulk;
pub mod catalog;
pub mod config;
pub mod distribution;
pub mod domain;
pub mod engine;
pub mod export;
pub mod notify;
pub mod observability;
pub mod quota;
pub mod store;
