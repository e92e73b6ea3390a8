pub mod api;
pub mod attendance;
pub mod billing;
pub mod client;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod leads;
pub mod models;
pub mod state;
