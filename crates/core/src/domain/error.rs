use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("invalid score: {0}. score must be in [0, 10]")]
    InvalidScore(f64),
    #[error("invalid verdict: {0:?}. verdict must be SUCCESS or FAILURE")]
    InvalidVerdict(String),
}
