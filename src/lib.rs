pub mod config;
pub mod error;
pub mod feed;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod reset;
pub mod store;
