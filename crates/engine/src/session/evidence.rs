use std::collections::BTreeSet;

use colloquy_api_types::{AssertionResult, AssertionStatus, SessionReport, ValidatorResult};
use colloquy_core::JudgeResult;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::Session;
use crate::assertions::{CheckResult, SessionAssertion};
use crate::events::ConversationEvent;
use crate::validators::Validator;
use crate::{EngineError, Result};

/// Judge 执行失败时记录的校验器名称。
pub const JUDGE_EXECUTION_ERROR: &str = "JudgeExecutionError";

impl Session {
    pub fn assertion_results(&self) -> &[AssertionResult] {
        &self.assertion_results
    }

    pub fn validator_results(&self) -> &[ValidatorResult] {
        &self.validator_results
    }

    pub fn judge_result(&self) -> Option<&JudgeResult> {
        self.judge_result.as_ref()
    }

    /// 手动执行一个会话级断言，失败时记录并返回错误。
    pub fn run_assertion(&mut self, assertion: &SessionAssertion) -> Result<AssertionResult> {
        let outcome = assertion.call(self);
        self.record_assertion(assertion.name(), outcome, Map::new())
    }

    /// 手动执行单个校验器，失败时记录并返回 [`EngineError::ValidationFailed`]。
    pub fn run_validator(&mut self, validator: &Validator) -> Result<()> {
        match self.check(validator) {
            Some(failure) => Err(EngineError::ValidationFailed(vec![failure])),
            None => Ok(()),
        }
    }

    /// 执行全部已注册校验器，逐个记录结果，全部执行完后汇总失败。
    pub fn run_validators(&mut self) -> Result<()> {
        let failures = self.check_all();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EngineError::ValidationFailed(failures))
        }
    }

    /// 返回会话的 Judge 结论，首次调用时才真正评审。未配置 Judge 时返回 `None`。
    pub async fn judge(&mut self) -> Result<Option<JudgeResult>> {
        if let Some(result) = &self.judge_result {
            return Ok(Some(result.clone()));
        }
        let Some(judge) = self.judge.clone() else {
            return Ok(None);
        };

        let result = judge.judge_session(&*self).await?;
        self.record_judge_result(result.clone());
        Ok(Some(result))
    }

    /// 使用会话配置的 Judge 评审，结论失败时返回错误。
    pub async fn judge_and_assert(&mut self) -> Result<JudgeResult> {
        let judge = self
            .judge
            .clone()
            .ok_or_else(|| EngineError::Config("会话未配置 Judge".to_string()))?;
        judge.judge_and_assert(self).await
    }

    pub fn record_judge_result(&mut self, result: JudgeResult) {
        self.events.emit(ConversationEvent::JudgeCompleted {
            session_id: self.id,
            verdict: result.verdict,
            score: result.score,
        });
        self.judge_result = Some(result);
    }

    /// 测试主体成功结束后调用：执行全部校验器，再视需要执行 Judge。
    ///
    /// Judge 自身执行出错时记录为名为 `JudgeExecutionError` 的失败校验器。
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub async fn conclude(&mut self) -> Result<()> {
        let mut failures = self.check_all();

        match self.judge().await {
            Ok(Some(result)) => failures.extend(result.failure_summary()),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "judge execution failed");
                self.record_validator(ValidatorResult::failed(
                    JUDGE_EXECUTION_ERROR,
                    err.to_string(),
                ));
                failures.push(format!("Judge execution failed: {err}"));
            }
        }

        if failures.is_empty() {
            info!("session concluded successfully");
            Ok(())
        } else {
            Err(EngineError::ValidationFailed(failures))
        }
    }

    /// 汇总会话证据，参与者取自消息的发送方与接收方。
    pub fn report(&self) -> SessionReport {
        let participants: BTreeSet<String> = self
            .message_history()
            .iter()
            .flat_map(|message| std::iter::once(message.sender()).chain(message.receiver()))
            .map(str::to_string)
            .collect();

        SessionReport {
            id: self.id.to_string(),
            participants: participants.into_iter().collect(),
            messages: self.message_history().to_vec(),
            assertions: self.assertion_results.clone(),
            validators: self.validator_results.clone(),
            judge_result: self.judge_result.clone(),
        }
    }

    pub(super) fn record_assertion(
        &mut self,
        name: &str,
        outcome: CheckResult,
        metadata: Map<String, Value>,
    ) -> Result<AssertionResult> {
        let (status, description) = match outcome {
            Ok(description) => (AssertionStatus::Passed, description),
            Err(reason) => (AssertionStatus::Failed, Some(reason)),
        };
        let result = AssertionResult {
            id: format!("assert_{}", self.assertion_results.len() + 1),
            assertion_name: name.to_string(),
            description,
            status,
            metadata,
        };

        self.events.emit(ConversationEvent::AssertionRecorded {
            session_id: self.id,
            assertion_id: result.id.clone(),
            assertion_name: result.assertion_name.clone(),
            status,
        });
        self.assertion_results.push(result.clone());

        if result.passed() {
            Ok(result)
        } else {
            warn!(assertion = %result.assertion_name, "assertion failed");
            Err(EngineError::Assertion(Box::new(result)))
        }
    }

    fn check_all(&mut self) -> Vec<String> {
        let validators = self.validators.clone();
        validators
            .iter()
            .filter_map(|validator| self.check(validator))
            .collect()
    }

    fn check(&mut self, validator: &Validator) -> Option<String> {
        match validator.validate(self) {
            Ok(()) => {
                self.record_validator(ValidatorResult::passed(validator.name()));
                None
            }
            Err(reason) => {
                warn!(validator = %validator.name(), reason = %reason, "validator failed");
                let failure = format!("Validator '{}' failed: {reason}", validator.name());
                self.record_validator(ValidatorResult::failed(validator.name(), reason));
                Some(failure)
            }
        }
    }

    fn record_validator(&mut self, result: ValidatorResult) {
        self.events.emit(ConversationEvent::ValidatorRecorded {
            session_id: self.id,
            name: result.name.clone(),
            status: result.status,
        });
        self.validator_results.push(result);
    }
}
