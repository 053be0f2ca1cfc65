pub mod ability;
pub mod catalog;
pub mod interaction_log;
pub mod learning_path;
pub mod model_registry;
pub mod recalibration;
