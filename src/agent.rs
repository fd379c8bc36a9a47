use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::{json, Value};

use crate::gemini::types::*;
use crate::gemini::GeminiClient;
use crate::remote::RemoteFile;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_MAX_TURNS: usize = 8;

// =============================================================================
// Traits
// =============================================================================

/// Runs a prompt against attached media and returns the final text answer.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, prompt: &str, videos: &[RemoteFile]) -> Result<String>;
}

/// A capability the model may invoke while answering.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the call arguments.
    fn parameters(&self) -> Value;
    async fn call(&self, args: Value) -> Result<Value>;
}

// =============================================================================
// Gemini-backed agent
// =============================================================================

pub struct GeminiAgent {
    name: String,
    client: GeminiClient,
    model: String,
    tools: Vec<Arc<dyn Tool>>,
    markdown: bool,
    max_turns: usize,
}

impl GeminiAgent {
    pub fn new(name: impl Into<String>, client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client,
            model: model.into(),
            tools: Vec::new(),
            markdown: false,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn system_instruction(&self) -> Option<Content> {
        let mut lines = Vec::new();
        if !self.tools.is_empty() {
            lines.push("You have access to tools; call them when the video alone cannot answer the question.".to_string());
        }
        if self.markdown {
            lines.push("Use markdown to format your answers.".to_string());
        }
        if lines.is_empty() {
            return None;
        }
        Some(Content::system(lines.join("\n")))
    }

    fn tool_declarations(&self) -> Vec<ToolDeclaration> {
        if self.tools.is_empty() {
            return Vec::new();
        }
        vec![ToolDeclaration {
            function_declarations: self
                .tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters(),
                })
                .collect(),
        }]
    }

    async fn call_tool(&self, call: &FunctionCall) -> Value {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            warn!("Model requested unknown tool {}", call.name);
            return json!({ "error": format!("Tool not found: {}", call.name) });
        };

        debug!("Executing tool call {} {}", call.name, call.args);
        match tool.call(call.args.clone()).await {
            Ok(result) => json!({ "result": result }),
            Err(e) => {
                warn!("Tool {} failed: {:#}", call.name, e);
                json!({ "error": format!("{:#}", e) })
            }
        }
    }
}

#[async_trait]
impl Agent for GeminiAgent {
    async fn run(&self, prompt: &str, videos: &[RemoteFile]) -> Result<String> {
        let mut parts: Vec<Part> = videos.iter().map(Part::file).collect();
        parts.push(Part::text(prompt));

        let mut request = GenerateContentRequest {
            system_instruction: self.system_instruction(),
            contents: vec![Content::user(parts)],
            tools: self.tool_declarations(),
        };

        info!(
            "{} running on {} with {} video(s)",
            self.name,
            self.model,
            videos.len()
        );

        // Tool loop: feed function results back until the model answers in text.
        for turn in 1..=self.max_turns {
            let response = self.client.generate_content(&self.model, &request).await?;

            let candidate = response.candidates.into_iter().next().ok_or_else(|| {
                let reason = response
                    .prompt_feedback
                    .and_then(|f| f.block_reason)
                    .unwrap_or_else(|| "no candidates returned".to_string());
                anyhow!("Gemini returned no answer: {}", reason)
            })?;

            let content = candidate.content.unwrap_or_default();
            let calls = content.function_calls();
            if calls.is_empty() {
                debug!(
                    "Answer after {} turn(s), finish reason {:?}",
                    turn, candidate.finish_reason
                );
                return Ok(content.text());
            }

            request.contents.push(Content {
                role: Some("model".to_string()),
                parts: content.parts,
            });

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                results.push(Part::function_response(&call.name, self.call_tool(call).await));
            }
            request.contents.push(Content::user(results));
        }

        Err(anyhow!("Max turns ({}) exceeded", self.max_turns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FileState;
    use crate::test_support::serve;
    use actix_web::{web, HttpResponse};
    use std::sync::Mutex;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes its input"
        }
        fn parameters(&self) -> Value {
            json!({ "type": "object", "properties": { "text": { "type": "string" } } })
        }
        async fn call(&self, args: Value) -> Result<Value> {
            Ok(args["text"].clone())
        }
    }

    fn video() -> RemoteFile {
        RemoteFile {
            name: "files/v1".into(),
            uri: "https://example.invalid/files/v1".into(),
            mime_type: "video/mp4".into(),
            state: FileState::Active,
            error: None,
            expiration_time: None,
        }
    }

    type Requests = web::Data<Mutex<Vec<Value>>>;

    async fn scripted(requests: Requests, body: web::Json<Value>) -> HttpResponse {
        let mut seen = requests.lock().unwrap();
        seen.push(body.into_inner());
        if seen.len() == 1 {
            HttpResponse::Ok().json(json!({
                "candidates": [{ "content": { "role": "model", "parts": [
                    { "functionCall": { "name": "echo", "args": { "text": "from tool" } } }
                ]}}]
            }))
        } else {
            HttpResponse::Ok().json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "**done**" }] },
                    "finishReason": "STOP"
                }]
            }))
        }
    }

    #[actix_web::test]
    async fn runs_tool_calls_then_returns_text() {
        let requests: Requests = web::Data::new(Mutex::new(Vec::new()));
        let shared = requests.clone();
        let base = serve(move |cfg| {
            cfg.app_data(shared.clone()).route(
                "/v1beta/models/test-model:generateContent",
                web::post().to(scripted),
            );
        });

        let agent = GeminiAgent::new("tester", GeminiClient::new("k").with_base_url(&base), "test-model")
            .tool(EchoTool)
            .markdown(true);

        let answer = agent.run("what happens?", &[video()]).await.unwrap();
        assert_eq!(answer, "**done**");

        let seen = requests.lock().unwrap();
        assert_eq!(seen.len(), 2);

        let first = &seen[0];
        assert_eq!(
            first["contents"][0]["parts"][0]["fileData"]["fileUri"],
            "https://example.invalid/files/v1"
        );
        assert_eq!(first["contents"][0]["parts"][1]["text"], "what happens?");
        assert_eq!(first["tools"][0]["functionDeclarations"][0]["name"], "echo");
        assert!(first["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("markdown"));

        let second = &seen[1];
        let reply = &second["contents"][2]["parts"][0]["functionResponse"];
        assert_eq!(reply["name"], "echo");
        assert_eq!(reply["response"]["result"], "from tool");
    }

    async fn blocked() -> HttpResponse {
        HttpResponse::Ok().json(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
    }

    #[actix_web::test]
    async fn blocked_prompt_is_an_error() {
        let base = serve(|cfg| {
            cfg.route("/v1beta/models/m:generateContent", web::post().to(blocked));
        });
        let agent = GeminiAgent::new("tester", GeminiClient::new("k").with_base_url(&base), "m");

        let err = agent.run("q", &[]).await.unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    async fn always_calls() -> HttpResponse {
        HttpResponse::Ok().json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [
                { "functionCall": { "name": "missing_tool", "args": {} } }
            ]}}]
        }))
    }

    #[actix_web::test]
    async fn stops_after_max_turns() {
        let base = serve(|cfg| {
            cfg.route("/v1beta/models/m:generateContent", web::post().to(always_calls));
        });
        let agent = GeminiAgent::new("tester", GeminiClient::new("k").with_base_url(&base), "m")
            .max_turns(2);

        let err = agent.run("q", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Max turns (2) exceeded");
    }

    async fn unauthorized() -> HttpResponse {
        HttpResponse::Forbidden().body("API key not valid")
    }

    #[actix_web::test]
    async fn http_errors_carry_status_and_body() {
        let base = serve(|cfg| {
            cfg.route("/v1beta/models/m:generateContent", web::post().to(unauthorized));
        });
        let agent = GeminiAgent::new("tester", GeminiClient::new("bad").with_base_url(&base), "m");

        let err = agent.run("q", &[]).await.unwrap_err().to_string();
        assert!(err.contains("403"), "{err}");
        assert!(err.contains("API key not valid"), "{err}");
    }
}
