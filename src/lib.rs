pub mod aggregate;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch_data;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
