pub mod config;
pub mod gantry;
pub mod messages;
pub mod runtime;
