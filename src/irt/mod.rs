pub mod ability;
pub mod calibration;
pub mod evaluation;
pub mod path;
pub mod types;

pub use ability::{theta_to_level, ProficiencyLevel};
pub use types::*;
