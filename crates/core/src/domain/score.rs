use serde::{Deserialize, Serialize};

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(f64);

impl Score {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 10.0;

    pub fn new(value: f64) -> Result<Self, DomainError> {
        if value.is_finite() && (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidScore(value))
        }
    }

    pub fn zero() -> Self {
        Self(Self::MIN)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::zero()
    }
}

impl TryFrom<f64> for Score {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for f64 {
    fn from(value: Score) -> Self {
        value.value()
    }
}

#[cfg(test)]
mod tests {
    use super::Score;

    #[test]
    fn valid_score_is_created() {
        let score = Score::new(8.5).expect("8.5 should be valid");

        assert_eq!(score.value(), 8.5);
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let err = Score::new(10.5).expect_err("10.5 should be rejected");

        assert_eq!(
            err.to_string(),
            "invalid score: 10.5. score must be in [0, 10]"
        );
        assert!(Score::new(-1.0).is_err());
        assert!(Score::new(f64::NAN).is_err());
    }

    #[test]
    fn deserializing_rejects_out_of_range_values() {
        assert!(serde_json::from_str::<Score>("11").is_err());
        let score: Score = serde_json::from_str("9").expect("9 should deserialize");
        assert_eq!(score.value(), 9.0);
    }
}
