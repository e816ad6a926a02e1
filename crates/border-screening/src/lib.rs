//! Border screening intake: questionnaire wizard, officer assessment and threat scoring.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
