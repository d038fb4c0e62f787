use serde::{Deserialize, Serialize};

use super::{Score, Verdict};

/// Evaluation of a single declared requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementResult {
    pub requirement: String,
    pub verdict: Verdict,
    pub score: Score,
    pub reasoning: String,
}

impl RequirementResult {
    pub fn new(
        requirement: impl Into<String>,
        verdict: Verdict,
        score: Score,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            requirement: requirement.into(),
            verdict,
            score,
            reasoning: reasoning.into(),
        }
    }

    pub fn failure(requirement: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self::new(requirement, Verdict::Failure, Score::zero(), reasoning)
    }
}

/// Structured verdict produced by the judge for a whole transcript.
///
/// An empty `requirements` list means no per-requirement evaluation was
/// requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeResult {
    pub verdict: Verdict,
    pub score: Score,
    pub reasoning: String,
    #[serde(default)]
    pub requirements: Vec<RequirementResult>,
}

impl JudgeResult {
    pub fn new(verdict: Verdict, score: Score, reasoning: impl Into<String>) -> Self {
        Self {
            verdict,
            score,
            reasoning: reasoning.into(),
            requirements: Vec::new(),
        }
    }

    /// `FAILURE` with a zero score.
    pub fn failure(reasoning: impl Into<String>) -> Self {
        Self::new(Verdict::Failure, Score::zero(), reasoning)
    }

    pub fn with_requirements(mut self, requirements: Vec<RequirementResult>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn failed_requirements(&self) -> impl Iterator<Item = &RequirementResult> {
        self.requirements
            .iter()
            .filter(|requirement| requirement.verdict == Verdict::Failure)
    }

    pub fn is_success(&self) -> bool {
        self.verdict.is_success() && self.failed_requirements().next().is_none()
    }

    /// Describes every reason this result counts as a failure, or `None`
    /// when the overall verdict and all requirements succeeded.
    pub fn failure_summary(&self) -> Option<String> {
        let mut sections = Vec::new();

        if self.verdict == Verdict::Failure {
            sections.push(format!(
                "Judge marked session as FAILURE with score {}. Reason: {}",
                self.score.value(),
                self.reasoning
            ));
        }

        let failed: Vec<String> = self
            .failed_requirements()
            .map(|requirement| {
                format!(
                    "Requirement '{}' was not met. Reason: {}",
                    requirement.requirement, requirement.reasoning
                )
            })
            .collect();
        if !failed.is_empty() {
            sections.push(format!(
                "Judge marked one or more requirements as FAILURE:\n{}",
                failed.join("\n")
            ));
        }

        if sections.is_empty() {
            None
        } else {
            Some(sections.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(value: f64) -> Score {
        Score::new(value).expect("score should be valid")
    }

    #[test]
    fn failure_has_zero_score() {
        let result = JudgeResult::failure("conversation was empty");

        assert_eq!(result.verdict, Verdict::Failure);
        assert_eq!(result.score, Score::zero());
        assert!(result.requirements.is_empty());
    }

    #[test]
    fn successful_result_has_no_failure_summary() {
        let result = JudgeResult::new(Verdict::Success, score(9.0), "ok").with_requirements(vec![
            RequirementResult::new("in French", Verdict::Success, score(10.0), "yes"),
        ]);

        assert!(result.is_success());
        assert!(result.failure_summary().is_none());
    }

    #[test]
    fn failure_summary_lists_every_failing_requirement() {
        let result = JudgeResult::new(Verdict::Success, score(8.0), "fine").with_requirements(vec![
            RequirementResult::failure("mentions cookies", "no cookies"),
            RequirementResult::new("is polite", Verdict::Success, score(9.0), "polite"),
            RequirementResult::failure("mentions cake", "no cake"),
        ]);

        let summary = result.failure_summary().expect("requirements failed");

        assert!(!result.is_success());
        assert!(summary.contains("Requirement 'mentions cookies' was not met. Reason: no cookies"));
        assert!(summary.contains("Requirement 'mentions cake' was not met. Reason: no cake"));
        assert!(!summary.contains("is polite"));
    }

    #[test]
    fn failure_summary_reports_overall_failure() {
        let result = JudgeResult::new(Verdict::Failure, score(2.0), "evasive");

        let summary = result.failure_summary().expect("overall verdict failed");

        assert_eq!(
            summary,
            "Judge marked session as FAILURE with score 2. Reason: evasive"
        );
    }
}
