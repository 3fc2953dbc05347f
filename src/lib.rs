pub mod api;
pub mod config;
pub mod db;
pub mod legacy_code;
pub mod location;
pub mod services;
