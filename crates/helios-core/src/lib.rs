pub mod clean;
pub mod config;
pub mod datetime;
pub mod error;
pub mod keys;
pub mod mappings;
pub mod pipeline;
pub mod reshape;
pub mod schema;
pub mod sink;
pub mod sources;
