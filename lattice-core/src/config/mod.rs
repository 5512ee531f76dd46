// Configuration Module
// Matrix description models and YAML loading

pub mod models;
pub mod parser;

pub use models::{
    DeployConfig, DeployOn, MatrixConfig, MatrixEntry, Stage, StageStatus, Step,
};
pub use parser::ConfigParser;
