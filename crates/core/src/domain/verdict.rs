use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Success,
    Failure,
}

impl Verdict {
    /// Accepts `SUCCESS` or `FAILURE` in any letter case. Surrounding
    /// whitespace is not tolerated.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            _ => Err(DomainError::InvalidVerdict(raw.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Success => "SUCCESS",
            Verdict::Failure => "FAILURE",
        }
    }

    pub fn is_success(self) -> bool {
        self == Verdict::Success
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Verdict::parse("success"), Ok(Verdict::Success));
        assert_eq!(Verdict::parse("Failure"), Ok(Verdict::Failure));
    }

    #[test]
    fn parse_rejects_other_words() {
        let err = Verdict::parse("PASS").expect_err("PASS is not a verdict");

        assert_eq!(err, DomainError::InvalidVerdict("PASS".to_string()));
        assert!(Verdict::parse(" SUCCESS").is_err());
    }

    #[test]
    fn serializes_in_upper_case() {
        let json = serde_json::to_string(&Verdict::Failure).expect("verdict should serialize");

        assert_eq!(json, "\"FAILURE\"");
    }
}
