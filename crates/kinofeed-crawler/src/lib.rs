pub mod broker_client;
pub mod config;
pub mod detail;
pub mod notify;
pub mod site;
pub mod sync;
pub mod worker;
