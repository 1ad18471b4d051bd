//! ReAct Agent - Reasoning + Acting pattern
//!
//! Each turn the model either reasons, proposes exactly one tool call, or
//! gives a final answer. Tool observations are appended to a scratchpad that
//! is replayed to the model on the next turn. The loop is bounded by
//! `max_iterations`; running out of turns is an error, not a partial answer.

use super::Agent;
use crate::adk::error::ReportError;
use crate::adk::model::{Content, GenerationConfig, Model, Part};
use crate::adk::tool::Tool;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

const FINAL_ANSWER_PREFIX: &str = "final answer:";

/// ReAct (Reasoning + Acting) Agent
pub struct ReActAgent {
    pub name: String,
    pub instruction: String,
    pub model: Arc<dyn Model>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub max_iterations: u32,
    pub generation_config: Option<GenerationConfig>,
    tool_map: HashMap<String, usize>,
}

/// ReAct step types
#[derive(Debug)]
enum ReActStep {
    /// Model is thinking/reasoning
    Thought(String),
    /// Model wants to call a tool
    Action {
        tool: String,
        args: serde_json::Value,
    },
    /// Model has a final answer
    FinalAnswer(String),
}

impl ReActAgent {
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        model: Arc<dyn Model>,
        tools: Vec<Arc<dyn Tool>>,
        max_iterations: u32,
    ) -> Self {
        let tool_map = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();

        Self {
            name: name.into(),
            instruction: instruction.into(),
            model,
            tools,
            max_iterations,
            generation_config: None,
            tool_map,
        }
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    /// Build the ReAct system prompt with tool descriptions
    fn build_react_system_prompt(&self) -> String {
        let tool_section = if self.tools.is_empty() {
            "No tools are available. You must answer from the information given.".to_string()
        } else {
            let tool_descriptions: Vec<String> = self
                .tools
                .iter()
                .map(|t| format!("- {}: {}", t.name(), t.description()))
                .collect();
            format!("Available tools:\n{}", tool_descriptions.join("\n"))
        };

        format!(
            r#"{}

You are using the ReAct (Reasoning + Acting) pattern. For each step:

1. **Thought**: Reason about what you know and what you need to do next
2. **Action**: Either call ONE tool OR provide a final answer

{}

Response format:
- To use a tool, respond with a single function call (only use tools listed above)
- To provide a final answer, respond with text starting with "Final Answer:" followed by your answer

After receiving tool results (Observations), continue reasoning until you can provide a final answer."#,
            self.instruction, tool_section
        )
    }

    /// Build the current prompt including scratchpad history
    fn build_prompt_with_scratchpad(&self, input: &str, scratchpad: &[String]) -> String {
        if scratchpad.is_empty() {
            input.to_string()
        } else {
            format!(
                "{}\n\n--- Previous Steps ---\n{}\n\nContinue from where you left off.",
                input,
                scratchpad.join("\n")
            )
        }
    }

    /// Parse the model response to determine the ReAct step type.
    ///
    /// A function call wins over any text in the same response, and only the
    /// first call is honoured.
    fn parse_response(&self, response: &Content) -> ReActStep {
        if let Some((tool, args)) = response.parts.iter().find_map(|part| match part {
            Part::FunctionCall { name, args } => Some((name.clone(), args.clone())),
            _ => None,
        }) {
            return ReActStep::Action { tool, args };
        }

        for part in &response.parts {
            match part {
                Part::Text(text) => {
                    let trimmed = text.trim();
                    if trimmed
                        .get(..FINAL_ANSWER_PREFIX.len())
                        .is_some_and(|p| p.eq_ignore_ascii_case(FINAL_ANSWER_PREFIX))
                    {
                        let answer = trimmed[FINAL_ANSWER_PREFIX.len()..].trim().to_string();
                        return ReActStep::FinalAnswer(answer);
                    }
                    if !trimmed.is_empty() {
                        return ReActStep::Thought(trimmed.to_string());
                    }
                }
                Part::Thinking(thought) => return ReActStep::Thought(thought.clone()),
                _ => {}
            }
        }
        ReActStep::Thought(String::new())
    }

    /// Execute a tool and return the observation text
    async fn execute_tool(&self, tool_name: &str, args: serde_json::Value) -> String {
        match self.tool_map.get(tool_name).map(|&i| &self.tools[i]) {
            Some(t) => match t.execute(args).await {
                Ok(result) => serde_json::to_string_pretty(&result).unwrap_or_default(),
                Err(e) => {
                    log::warn!("Tool {} failed: {}", tool_name, e);
                    format!("Error: {}", e)
                }
            },
            None => format!("Error: Tool '{}' not found", tool_name),
        }
    }
}

#[async_trait]
impl Agent for ReActAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, ReportError> {
        let system_prompt = self.build_react_system_prompt();
        let mut scratchpad: Vec<String> = Vec::new();

        for iteration in 0..self.max_iterations {
            log::info!(
                "ReActAgent {} iteration {}/{}",
                self.name,
                iteration + 1,
                self.max_iterations
            );

            let history = vec![
                Content::system(system_prompt.clone()),
                Content::user(self.build_prompt_with_scratchpad(&input, &scratchpad)),
            ];

            let response = self
                .model
                .generate_content(
                    &history,
                    self.generation_config.as_ref(),
                    Some(&self.tools),
                )
                .await?;

            let step = self.parse_response(&response);
            log::debug!("ReActAgent step: {:?}", step);

            match step {
                ReActStep::Thought(thought) => {
                    if !thought.is_empty() {
                        scratchpad.push(format!("Thought: {}", thought));
                    }
                }
                ReActStep::Action { tool, args } => {
                    log::info!("Action: {}({})", tool, args);
                    scratchpad.push(format!("Action: {}({})", tool, args));

                    let observation = self.execute_tool(&tool, args).await;
                    scratchpad.push(format!("Observation: {}", observation));
                }
                ReActStep::FinalAnswer(answer) => {
                    log::info!(
                        "ReActAgent {} finished after {} iterations",
                        self.name,
                        iteration + 1
                    );
                    return Ok(answer);
                }
            }
        }

        log::warn!(
            "ReActAgent {} reached max iterations ({})",
            self.name,
            self.max_iterations
        );
        Err(ReportError::MaxIterations {
            kind: "agent iterations".to_string(),
            limit: self.max_iterations,
        })
    }
}
