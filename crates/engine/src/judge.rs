//! Judge：审阅完整对话记录并给出结构化结论。
//!
//! 评审模型的输出不可信。解析中遇到的任何问题都不会以错误形式抛出，
//! 而是转成一个 `FAILURE` 结论，并在 `reasoning` 中写明具体缺陷。

use std::fmt;
use std::sync::Arc;

use colloquy_core::{
    JudgeResult, Message, Provider, RequirementResult, Score, Verdict,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::session::Session;
use crate::{EngineError, Result};

/// Judge 的默认名称。
pub const DEFAULT_JUDGE_NAME: &str = "Judge";

const STANDARD_PROMPT: &str = r#"You are a Judge AI. Your role is to determine if a conversation between a user and one or more AI agents
resulted in the successful fulfillment of the user's original request.

Analyze the entire conversation history provided. The user's request is the first message from the user.
The subsequent messages are the responses from the agents.

Your response MUST be in a JSON format. The JSON object should have the following properties:
- "verdict": A string, either "SUCCESS" or "FAILURE".
- "score": A float from 0.0 to 10.0, where 10.0 is a perfect, direct, and concise answer, and 0.0 is a complete failure.
- "reasoning": A brief, single-sentence justification for your decision.

- SUCCESS means the agent(s) provided a direct and complete answer to the user's initial query.
- FAILURE means the agent(s) failed to answer, evaded the question, or provided an irrelevant or incomplete response.

Example response:
{
  "verdict": "SUCCESS",
  "score": 8.5,
  "reasoning": "The agent correctly answered the user's question about the capital of France."
}
"#;

const REQUIREMENTS_PROMPT: &str = r#"You are a Judge AI. Your role is to determine if a conversation between a user and one or more AI agents
resulted in the successful fulfillment of the user's original request and meets a list of requirements.

Analyze the entire conversation history provided. The user's request is the first message from the user.
The subsequent messages are the responses from the agents.

Your response MUST be in a JSON format. The JSON object should have the following properties:
- "overall_assessment": An object containing the overall assessment of the conversation, with the following properties:
  - "verdict": A string, either "SUCCESS" or "FAILURE".
  - "score": A float from 0.0 to 10.0.
  - "reasoning": A brief, single-sentence justification for your decision.
- "requirements": An array of objects, where each object evaluates a single requirement. Each object should have:
  - "requirement": The text of the requirement being evaluated.
  - "verdict": A string, either "SUCCESS" or "FAILURE".
  - "score": A float from 0.0 to 10.0.
  - "reasoning": A brief, single-sentence justification for your decision.

- Overall SUCCESS means the agent(s) provided a direct and complete answer to the user's initial query.
- Overall FAILURE means the agent(s) failed to answer, evaded the question, or provided an irrelevant or incomplete response.
- Requirement SUCCESS means the conversation explicitly and correctly fulfills the requirement.
- Requirement FAILURE means the conversation does not fulfill the requirement.

The requirements to be evaluated will be listed in the user prompt.

Example response:
{
  "overall_assessment": {
    "verdict": "SUCCESS",
    "score": 9.0,
    "reasoning": "The agent provided a comprehensive and accurate answer to the user's request."
  },
  "requirements": [
    {
      "requirement": "The response must be in French.",
      "verdict": "SUCCESS",
      "score": 10.0,
      "reasoning": "The entire response was correctly written in French."
    }
  ]
}
"#;

/// 能够渲染出对话记录文本的来源。
pub trait TranscriptSource {
    fn conversation_text(&self) -> String;
}

/// 每条消息渲染为一行 `"{sender}: {content}"`。
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.sender(), message.content()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone)]
pub struct Judge {
    name: String,
    provider: Arc<dyn Provider>,
    requirements: Vec<String>,
}

impl Judge {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            name: DEFAULT_JUDGE_NAME.to_string(),
            provider,
            requirements: Vec::new(),
        }
    }

    pub fn with_requirements<I, S>(provider: Arc<dyn Provider>, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requirements: requirements.into_iter().map(Into::into).collect(),
            ..Self::new(provider)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requirements(&self) -> &[String] {
        &self.requirements
    }

    pub fn system_message(&self) -> &'static str {
        if self.requirements.is_empty() {
            STANDARD_PROMPT
        } else {
            REQUIREMENTS_PROMPT
        }
    }

    /// 评审一段对话记录。
    ///
    /// 空记录直接判定失败，不调用 Provider；否则只发起一次生成调用。
    /// 只有 Provider 自身的错误会向上传播。
    #[tracing::instrument(skip(self, transcript), fields(judge = %self.name))]
    pub async fn judge_session<T>(&self, transcript: &T) -> Result<JudgeResult>
    where
        T: TranscriptSource + ?Sized,
    {
        let conversation = transcript.conversation_text();
        if conversation.is_empty() {
            warn!("conversation was empty, skipping judge call");
            return Ok(JudgeResult::failure("The conversation was empty."));
        }

        let history = [Message::user(self.build_prompt(&conversation))];
        let response = self
            .provider
            .generate_timed(&history, self.system_message(), "")
            .await?;

        let result = self.parse_response(&response.content);
        info!(
            verdict = %result.verdict,
            score = result.score.value(),
            requirements = result.requirements.len(),
            "judge verdict parsed"
        );
        Ok(result)
    }

    /// 评审会话并把结论记录到会话上；整体或任一需求失败时返回
    /// [`EngineError::JudgeRejected`]，消息中列出全部失败原因。
    pub async fn judge_and_assert(&self, session: &mut Session) -> Result<JudgeResult> {
        let result = self.judge_session(&*session).await?;
        session.record_judge_result(result.clone());

        match result.failure_summary() {
            Some(summary) => Err(EngineError::JudgeRejected(summary)),
            None => Ok(result),
        }
    }

    fn build_prompt(&self, conversation: &str) -> String {
        let mut prompt = format!("Here is the conversation log:\n\n{conversation}");
        if !self.requirements.is_empty() {
            prompt.push_str("\n\nHere are the requirements to check:\n\n- ");
            prompt.push_str(&self.requirements.join("\n- "));
        }
        prompt
    }

    /// 把评审模型的原始输出解析为结论，从不失败。
    pub fn parse_response(&self, raw: &str) -> JudgeResult {
        let text = raw.trim();
        let Some(payload) = extract_json_object(text) else {
            warn!("judge response contains no JSON object");
            return JudgeResult::failure(format!(
                "Error parsing judge's JSON response: no JSON object found. Response: {text}"
            ));
        };

        let data: Value = match serde_json::from_str(payload) {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "judge response is not valid JSON");
                return JudgeResult::failure(format!(
                    "Error parsing judge's JSON response: {err}. Response: {text}"
                ));
            }
        };

        if self.requirements.is_empty() {
            assessment_result(&data)
        } else {
            parse_with_requirements(&data, &self.requirements)
        }
    }
}

impl fmt::Debug for Judge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Judge")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("requirements", &self.requirements)
            .finish()
    }
}

/// 取第一个 `{` 到最后一个 `}`（含）之间的子串。
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

struct Assessment {
    verdict: Verdict,
    score: Score,
    reasoning: String,
}

fn parse_assessment(data: &Value) -> std::result::Result<Assessment, String> {
    let object = data
        .as_object()
        .ok_or_else(|| format!("expected a JSON object, got {data}"))?;

    let verdict = match object.get("verdict") {
        Some(Value::String(raw)) => Verdict::parse(raw)
            .map_err(|_| format!("Invalid verdict in JSON response: {raw}"))?,
        Some(other) => return Err(format!("Invalid verdict in JSON response: {other}")),
        None => return Err("Missing verdict in JSON response".to_string()),
    };

    let score = parse_score(object)?;
    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("No reasoning provided.")
        .to_string();

    Ok(Assessment {
        verdict,
        score,
        reasoning,
    })
}

fn parse_score(object: &Map<String, Value>) -> std::result::Result<Score, String> {
    match object.get("score") {
        Some(value) => {
            let raw = value
                .as_f64()
                .ok_or_else(|| format!("Invalid or missing score in JSON response: {value}"))?;
            Score::new(raw).map_err(|err| format!("Invalid score in JSON response: {err}"))
        }
        None => Err("Invalid or missing score in JSON response: missing".to_string()),
    }
}

fn assessment_result(data: &Value) -> JudgeResult {
    match parse_assessment(data) {
        Ok(assessment) => {
            JudgeResult::new(assessment.verdict, assessment.score, assessment.reasoning)
        }
        Err(defect) => {
            warn!(defect = %defect, "judge assessment is malformed");
            JudgeResult::failure(defect)
        }
    }
}

fn parse_with_requirements(data: &Value, declared: &[String]) -> JudgeResult {
    let overall = match data.get("overall_assessment") {
        Some(assessment) if assessment.is_object() => assessment_result(assessment),
        _ => JudgeResult::failure("Missing or invalid 'overall_assessment' in JSON response."),
    };

    let requirements = match data.get("requirements") {
        Some(Value::Array(entries)) => parse_requirement_entries(entries, declared),
        Some(_) => fail_all(
            declared,
            "Invalid 'requirements' field in JSON response, expected a list.",
        ),
        None => fail_all(declared, "Judge response did not evaluate this requirement."),
    };

    overall.with_requirements(requirements)
}

fn parse_requirement_entries(entries: &[Value], declared: &[String]) -> Vec<RequirementResult> {
    let mut results: Vec<RequirementResult> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            parse_requirement(entry).unwrap_or_else(|defect| {
                warn!(position = index + 1, defect = %defect, "judge requirement entry is malformed");
                RequirementResult::failure(
                    declared
                        .get(index)
                        .map(String::as_str)
                        .unwrap_or("Unknown requirement"),
                    format!(
                        "Failed to parse requirement #{} from judge. Error: {defect}. Data: {entry}",
                        index + 1
                    ),
                )
            })
        })
        .collect();

    results.extend(
        declared
            .iter()
            .skip(entries.len())
            .map(|missing| {
                RequirementResult::failure(
                    missing.as_str(),
                    "Judge response did not evaluate this requirement.",
                )
            }),
    );
    results
}

fn parse_requirement(entry: &Value) -> std::result::Result<RequirementResult, String> {
    let object = entry
        .as_object()
        .ok_or_else(|| "Requirement entry is not an object.".to_string())?;

    let text = match object.get("requirement").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => return Err("Missing 'requirement' text.".to_string()),
    };
    let assessment = parse_assessment(entry)?;

    Ok(RequirementResult::new(
        text,
        assessment.verdict,
        assessment.score,
        assessment.reasoning,
    ))
}

fn fail_all(declared: &[String], reasoning: &str) -> Vec<RequirementResult> {
    declared
        .iter()
        .map(|requirement| RequirementResult::failure(requirement.as_str(), reasoning))
        .collect()
}
