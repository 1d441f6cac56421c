//! Error types for acceptance testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccError {
    #[error("{0} must be set for acceptance tests")]
    PreCheck(String),

    #[error("terraform {command} failed (exit code {code:?}): {stderr}")]
    Terraform {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Step {step} error: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("After applying step {0}, the plan was not empty")]
    PlanNotEmpty(String),

    #[error("ImportStateVerify attributes not equivalent for {resource}:\n{details}")]
    ImportVerify { resource: String, details: String },

    #[error("{0}")]
    CheckFailed(String),

    #[error("Invalid test case: {0}")]
    InvalidTestCase(String),

    #[error("Provider error: {0}")]
    Provider(#[from] azurerm_common::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AccResult<T> = Result<T, AccError>;
