//! Python execution in a SandboxFusion service (`POST <endpoint>/run_code`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use delve_core::types::Arguments;

use super::base::{require_string, Capability};

/// Environment variable consulted when no endpoint is configured.
pub const SANDBOX_ENDPOINT_ENV: &str = "SANDBOX_FUSION_ENDPOINT";

#[derive(Debug, Deserialize)]
struct RunCodeResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    run_result: Option<RunResult>,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    return_code: Option<i64>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    execution_time: Option<f64>,
}

// ─────────────────────────────────────────────
// SandboxTool
// ─────────────────────────────────────────────

/// Runs self-contained Python snippets and reports their output.
pub struct SandboxTool {
    endpoint: String,
    run_timeout: u64,
    client: Client,
}

impl SandboxTool {
    /// An empty `endpoint` falls back to `SANDBOX_FUSION_ENDPOINT`.
    pub fn new(endpoint: &str, run_timeout: u64) -> Self {
        let endpoint = if endpoint.is_empty() {
            std::env::var(SANDBOX_ENDPOINT_ENV).unwrap_or_default()
        } else {
            endpoint.to_string()
        };
        Self {
            endpoint,
            run_timeout,
            client: Client::builder()
                // leave headroom over the sandbox's own limit
                .timeout(Duration::from_secs(run_timeout + 10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Capability for SandboxTool {
    fn name(&self) -> &str {
        "python_sandbox"
    }

    fn description(&self) -> &str {
        "Execute Python code in a secure sandbox and return its output. The code must be \
         self-contained and use print() for anything it wants to report."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The Python code to execute"
                }
            },
            "required": ["code"]
        })
    }

    async fn invoke(&self, arguments: Arguments) -> anyhow::Result<String> {
        let code = require_string(&arguments, "code")?;
        if code.trim().is_empty() {
            anyhow::bail!("Code cannot be empty");
        }
        if self.endpoint.is_empty() {
            anyhow::bail!("No sandbox endpoint configured (set SANDBOX_FUSION_ENDPOINT env var)");
        }

        let url = format!("{}/run_code", self.endpoint.trim_end_matches('/'));
        debug!(url = %url, code_len = code.len(), "running code in sandbox");

        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "code": code,
                "language": "python",
                "run_timeout": self.run_timeout,
            }))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Sandbox request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Sandbox returned {status}: {body}");
        }

        let parsed: RunCodeResponse = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse sandbox response: {e}"))?;

        Ok(format_run(&code, &parsed))
    }
}

fn format_run(code: &str, response: &RunCodeResponse) -> String {
    let mut parts = vec!["Python Code Execution Result:".to_string()];

    match &response.run_result {
        Some(run) => {
            if let Some(out) = run.stdout.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                parts.push(format!("Output:\n{out}"));
            }
            if let Some(err) = run.stderr.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                parts.push(format!("Error/Stderr:\n{err}"));
            }
            match run.return_code {
                Some(0) => {}
                Some(code) => parts.push(format!("Exit Code: {code}")),
                None => {
                    let status = run.status.as_deref().unwrap_or("unknown");
                    parts.push(format!("Status: {status}"));
                }
            }
            if let Some(t) = run.execution_time.filter(|t| *t > 0.0) {
                parts.push(format!("Execution Time: {t:.3}s"));
            }
        }
        None => {
            let status = response.status.as_deref().unwrap_or("unknown");
            let message = response.message.as_deref().unwrap_or("no run result");
            parts.push(format!("Status: {status}\n{message}"));
        }
    }

    parts.push(format!("\nCode:\n```python\n{code}\n```"));
    parts.join("\n\n")
}
