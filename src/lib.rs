pub mod config;
pub mod ine_validator;
pub mod models;
pub mod processing;
pub mod utils;
pub mod validation;

pub use config::ExtractionConfig;
pub use ine_validator::{FaceRecord, IneValidator};
