//! Strategy module
//!
//! Signal synthesis, regime classification and stabilization.

pub mod patterns;
pub mod regime;
pub mod signal;
pub mod stabilizer;
pub mod synthesizer;
pub mod validator;

pub use patterns::*;
pub use regime::*;
pub use signal::*;
pub use stabilizer::*;
pub use synthesizer::*;
pub use validator::*;
