pub mod calibration;
pub mod career;
pub mod classifier;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod form;
pub mod h2h;
pub mod predictor;
pub mod report_export;
pub mod store;
pub mod telemetry;
pub mod training;

pub use engine::Engine;
pub use error::AnalyticsError;
