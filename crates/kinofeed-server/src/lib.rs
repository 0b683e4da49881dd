pub mod broker;
pub mod config;
pub mod error;
pub mod library;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use routes::app;
