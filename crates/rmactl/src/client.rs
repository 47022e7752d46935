//! HTTP client for communicating with rmad.

use anyhow::{anyhow, Context, Result};
use rma_common::{
    AssignRequest, CaseIntake, CommentRequest, CompletionRequest, DecisionRequest, ErrorBody,
    HealthResponse, ListCasesResponse, ReceiptRequest, ReturnConfirmationRequest, ReturnRequest,
    RmaCase, ShipmentRequest, SubmissionRequest, WorkflowRules,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:7171";

/// Client for the rmad case API
pub struct EngineClient {
    client: reqwest::Client,
    base_url: String,
}

impl EngineClient {
    /// An explicit --server beats $RMAD_URL beats the default
    pub fn new(server: Option<String>) -> Self {
        let base_url = server
            .or_else(|| std::env::var("RMAD_URL").ok())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/v1/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| connect_help(&self.base_url))?;
        decode(resp).await
    }

    pub async fn rules(&self) -> Result<WorkflowRules> {
        let url = format!("{}/v1/workflow/rules", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| connect_help(&self.base_url))?;
        decode(resp).await
    }

    pub async fn list(
        &self,
        stage: Option<&str>,
        assignee: Option<&str>,
        overdue: bool,
    ) -> Result<ListCasesResponse> {
        let url = format!("{}/v1/cases", self.base_url);
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(stage) = stage {
            query.push(("stage", stage.to_string()));
        }
        if let Some(assignee) = assignee {
            query.push(("assigned_to", assignee.to_string()));
        }
        if overdue {
            query.push(("overdue", "true".to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .with_context(|| connect_help(&self.base_url))?;
        decode(resp).await
    }

    /// Fetch one case by id or RMA number
    pub async fn show(&self, case: &str) -> Result<RmaCase> {
        let url = format!("{}/v1/cases/{}", self.base_url, case);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| connect_help(&self.base_url))?;
        decode(resp).await
    }

    pub async fn open(&self, intake: &CaseIntake) -> Result<RmaCase> {
        let url = format!("{}/v1/cases", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(intake)
            .send()
            .await
            .with_context(|| connect_help(&self.base_url))?;
        decode(resp).await
    }

    pub async fn submit(&self, case: &str, req: &SubmissionRequest) -> Result<RmaCase> {
        self.post_op(case, "cds-submission", req).await
    }

    pub async fn decide(&self, case: &str, req: &DecisionRequest) -> Result<RmaCase> {
        self.post_op(case, "cds-approval", req).await
    }

    pub async fn ship(&self, case: &str, req: &ShipmentRequest) -> Result<RmaCase> {
        self.post_op(case, "shipment", req).await
    }

    pub async fn receive(&self, case: &str, req: &ReceiptRequest) -> Result<RmaCase> {
        self.post_op(case, "replacement-receipt", req).await
    }

    pub async fn start_return(&self, case: &str, req: &ReturnRequest) -> Result<RmaCase> {
        self.post_op(case, "return", req).await
    }

    pub async fn confirm_return(
        &self,
        case: &str,
        req: &ReturnConfirmationRequest,
    ) -> Result<RmaCase> {
        self.post_op(case, "return-confirmation", req).await
    }

    pub async fn complete(&self, case: &str, req: &CompletionRequest) -> Result<RmaCase> {
        self.post_op(case, "complete", req).await
    }

    pub async fn assign(&self, case: &str, req: &AssignRequest) -> Result<RmaCase> {
        self.post_op(case, "assign", req).await
    }

    pub async fn comment(&self, case: &str, req: &CommentRequest) -> Result<RmaCase> {
        self.post_op(case, "comments", req).await
    }

    async fn post_op<B: Serialize>(&self, case: &str, op: &str, body: &B) -> Result<RmaCase> {
        let url = format!("{}/v1/cases/{}/{}", self.base_url, case, op);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| connect_help(&self.base_url))?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        return resp.json::<T>().await.context("failed to decode engine response");
    }

    let message = match resp.json::<ErrorBody>().await {
        Ok(body) if status == reqwest::StatusCode::CONFLICT => format!(
            "{}\nSomeone changed the case since it was read; re-run the command to retry.",
            body.message
        ),
        Ok(body) => body.message,
        Err(_) => format!("engine returned {}", status),
    };
    Err(anyhow!(message))
}

fn connect_help(base_url: &str) -> String {
    format!(
        "Cannot reach the RMA engine at {}.\n\n\
         Is rmad running? Check with:\n\
         systemctl status rmad",
        base_url
    )
}
