pub mod boss;
pub mod clock;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod rhythm;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod stealth;
pub mod types;
pub mod world;
