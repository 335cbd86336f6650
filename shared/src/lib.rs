pub mod config;

pub use config::{AlertOverrides, Config};
