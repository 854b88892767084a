pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod retry;
pub mod transport;
