//! Session pipeline: ingestion events in, stabilized signals out

pub mod runner;
pub mod session;

pub use runner::*;
pub use session::*;
