//! Workflow REST Calls
//!
//! Create, inspect, run, cancel and clean up backend workflows, plus the
//! shortcut endpoints that start an argument analysis or a debate in one
//! call. Progress of a workflow is not polled here; it arrives on the
//! workflow channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check, ApiConfig, RequestError};
use crate::simulator::SimulationMode;

const WORKFLOWS_PATH: &str = "/api/workflows/";
const ANALYZE_PATH: &str = "/api/workflows/arguments/analyze";
const DEBATES_PATH: &str = "/api/workflows/debates/";

/// Default role for argument analysis
const DEFAULT_ROLE: &str = "prosecutor";

/// Default number of debate turns
const DEFAULT_MAX_TURNS: u32 = 3;

/// Body of a workflow creation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkflow {
    /// Single analysis or debate
    pub mode: SimulationMode,
    /// Case identifier
    pub case_id: String,
    /// Legal issue description
    pub issue_text: String,
    /// Optional lawyer identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lawyer_id: Option<String>,
    /// Optional jurisdiction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    /// Model override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A created workflow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    /// Workflow identifier, used to open the workflow channel
    pub workflow_id: String,
    /// Initial status
    pub status: String,
    /// Mode as echoed by the backend
    #[serde(default)]
    pub mode: Option<String>,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<String>,
    /// Backend metadata
    #[serde(default)]
    pub metadata: Value,
}

/// Body of an argument analysis request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeArgument {
    /// Argument to analyze
    pub argument: String,
    /// `prosecutor` or `defender`
    #[serde(default = "default_role")]
    pub role: String,
    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AnalyzeArgument {
    /// Analyze `argument` from the prosecutor's side
    #[must_use]
    pub fn new(argument: impl Into<String>) -> Self {
        Self {
            argument: argument.into(),
            role: DEFAULT_ROLE.to_string(),
            context: None,
        }
    }
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

/// Body of a debate creation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDebate {
    /// Case identifier
    pub case_id: String,
    /// Strategy the prosecutor opens with
    pub prosecution_strategy: String,
    /// Facts of the case
    pub case_facts: String,
    /// Maximum number of debate turns
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

/// A workflow started by one of the shortcut endpoints
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedWorkflow {
    /// Workflow identifier, used to open the workflow channel
    pub workflow_id: String,
    /// Debate identifier; the backend reuses the workflow id
    #[serde(default)]
    pub debate_id: Option<String>,
    /// Status right after starting (`started`)
    pub status: String,
    /// Human-readable note from the backend
    #[serde(default)]
    pub message: Option<String>,
}

/// Transcript of a debate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebateHistory {
    /// Debate identifier
    pub debate_id: String,
    /// Workflow status
    pub status: String,
    /// Turns taken so far
    #[serde(default)]
    pub turns: u32,
    /// Debate messages in order
    #[serde(default)]
    pub messages: Vec<Value>,
    /// Backend summary
    #[serde(default)]
    pub summary: Value,
    /// Final feedback, empty until the debate ends
    #[serde(default)]
    pub feedback: Value,
}

/// Client for the workflow endpoints
#[derive(Clone, Debug)]
pub struct WorkflowApi {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl WorkflowApi {
    /// Create a client sharing an existing connection pool
    #[must_use]
    pub fn new(config: ApiConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    fn workflow_url(&self, id: &str) -> String {
        self.config.url(&format!("{WORKFLOWS_PATH}{id}"))
    }

    fn debate_history_url(&self, id: &str) -> String {
        self.config.url(&format!("{DEBATES_PATH}{id}/history"))
    }

    /// `POST /api/workflows/`
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure or a non-2xx status.
    pub async fn create(&self, request: &CreateWorkflow) -> Result<WorkflowInfo, RequestError> {
        let response = self
            .http_client
            .post(self.config.url(WORKFLOWS_PATH))
            .timeout(self.config.request_timeout())
            .json(request)
            .send()
            .await?;

        let info: WorkflowInfo = check(WORKFLOWS_PATH, response).await?.json().await?;
        tracing::info!(workflow_id = %info.workflow_id, status = %info.status, "Workflow created");
        Ok(info)
    }

    /// `GET /api/workflows/{id}`
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure or a non-2xx status.
    pub async fn get(&self, id: &str) -> Result<Value, RequestError> {
        let response = self
            .http_client
            .get(self.workflow_url(id))
            .timeout(self.config.request_timeout())
            .send()
            .await?;

        Ok(check(WORKFLOWS_PATH, response).await?.json().await?)
    }

    /// `POST /api/workflows/{id}/execute`
    ///
    /// With `async_execution` the backend returns immediately and reports
    /// progress on the workflow channel.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure or a non-2xx status.
    pub async fn execute(&self, id: &str, async_execution: bool) -> Result<Value, RequestError> {
        let response = self
            .http_client
            .post(format!("{}/execute", self.workflow_url(id)))
            .timeout(self.config.request_timeout())
            .json(&serde_json::json!({ "async_execution": async_execution }))
            .send()
            .await?;

        Ok(check(WORKFLOWS_PATH, response).await?.json().await?)
    }

    /// `DELETE /api/workflows/{id}`
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure or a non-2xx status.
    pub async fn cancel(&self, id: &str) -> Result<Value, RequestError> {
        let response = self
            .http_client
            .delete(self.workflow_url(id))
            .timeout(self.config.request_timeout())
            .send()
            .await?;

        Ok(check(WORKFLOWS_PATH, response).await?.json().await?)
    }

    /// `POST /api/workflows/{id}/cleanup`
    ///
    /// Releases backend resources of a workflow that is no longer running.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure or a non-2xx status,
    /// including 400 when the workflow is still running.
    pub async fn cleanup(&self, id: &str) -> Result<Value, RequestError> {
        let response = self
            .http_client
            .post(format!("{}/cleanup", self.workflow_url(id)))
            .timeout(self.config.request_timeout())
            .send()
            .await?;

        Ok(check(WORKFLOWS_PATH, response).await?.json().await?)
    }

    /// `POST /api/workflows/arguments/analyze`
    ///
    /// Starts a single-analysis workflow for one argument.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure or a non-2xx status.
    pub async fn analyze_arguments(
        &self,
        request: &AnalyzeArgument,
    ) -> Result<StartedWorkflow, RequestError> {
        let response = self
            .http_client
            .post(self.config.url(ANALYZE_PATH))
            .timeout(self.config.request_timeout())
            .json(request)
            .send()
            .await?;

        let started: StartedWorkflow = check(ANALYZE_PATH, response).await?.json().await?;
        tracing::info!(workflow_id = %started.workflow_id, role = %request.role, "Argument analysis started");
        Ok(started)
    }

    /// `POST /api/workflows/debates/create`
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure or a non-2xx status.
    pub async fn create_debate(&self, request: &CreateDebate) -> Result<StartedWorkflow, RequestError> {
        let path = format!("{DEBATES_PATH}create");
        let response = self
            .http_client
            .post(self.config.url(&path))
            .timeout(self.config.request_timeout())
            .json(request)
            .send()
            .await?;

        let started: StartedWorkflow = check(&path, response).await?.json().await?;
        tracing::info!(
            workflow_id = %started.workflow_id,
            case_id = %request.case_id,
            max_turns = request.max_turns,
            "Debate started"
        );
        Ok(started)
    }

    /// `GET /api/workflows/debates/{id}/history`
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure or a non-2xx status.
    pub async fn debate_history(&self, id: &str) -> Result<DebateHistory, RequestError> {
        let response = self
            .http_client
            .get(self.debate_history_url(id))
            .timeout(self.config.request_timeout())
            .send()
            .await?;

        Ok(check(DEBATES_PATH, response).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_omits_unset_options() {
        let request = CreateWorkflow {
            mode: SimulationMode::Debate,
            case_id: "case-7".into(),
            issue_text: "Was the contract breached?".into(),
            lawyer_id: None,
            jurisdiction: Some("CA".into()),
            model: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mode"], "debate");
        assert_eq!(json["jurisdiction"], "CA");
        assert!(json.get("lawyer_id").is_none());
        assert!(json.get("model").is_none());
    }

    #[test]
    fn test_workflow_url() {
        let api = WorkflowApi::new(ApiConfig::default(), reqwest::Client::new());
        assert_eq!(
            api.workflow_url("wf-1"),
            "http://localhost:8000/api/workflows/wf-1"
        );
    }

    #[test]
    fn test_debate_history_url() {
        let api = WorkflowApi::new(ApiConfig::default(), reqwest::Client::new());
        assert_eq!(
            api.debate_history_url("wf-2"),
            "http://localhost:8000/api/workflows/debates/wf-2/history"
        );
    }

    #[test]
    fn test_analyze_request_defaults_to_prosecutor() {
        let request = AnalyzeArgument::new("The tenant was negligent");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"argument": "The tenant was negligent", "role": "prosecutor"})
        );

        let parsed: AnalyzeArgument =
            serde_json::from_str(r#"{"argument":"x","context":"lease"}"#).unwrap();
        assert_eq!(parsed.role, "prosecutor");
        assert_eq!(parsed.context.as_deref(), Some("lease"));
    }

    #[test]
    fn test_create_debate_max_turns_default() {
        let parsed: CreateDebate = serde_json::from_str(
            r#"{"case_id":"case-3","prosecution_strategy":"negligence","case_facts":"wet floor"}"#,
        )
        .unwrap();
        assert_eq!(parsed.max_turns, 3);
        assert_eq!(serde_json::to_value(&parsed).unwrap()["max_turns"], 3);
    }

    #[test]
    fn test_debate_history_tolerates_missing_fields() {
        let history: DebateHistory =
            serde_json::from_str(r#"{"debate_id":"wf-2","status":"pending"}"#).unwrap();
        assert_eq!(history.turns, 0);
        assert!(history.messages.is_empty());
        assert_eq!(history.feedback, Value::Null);
    }

    #[test]
    fn test_started_workflow_from_debate_response() {
        let started: StartedWorkflow = serde_json::from_str(
            r#"{"workflow_id":"wf-9","debate_id":"wf-9","status":"started","message":"Debate started."}"#,
        )
        .unwrap();
        assert_eq!(started.debate_id.as_deref(), Some("wf-9"));
        assert_eq!(started.status, "started");
    }
}
