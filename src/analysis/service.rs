// Copyright 2026 Tobin Edwards
//
//    Licensed under the Apache License, Version 2.0 (the "License");
//    you may not use this file except in compliance with the License.
//    You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
//    Unless required by applicable law or agreed to in writing, software
//    distributed under the License is distributed on an "AS IS" BASIS,
//    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//    See the License for the specific language governing permissions and
//    limitations under the License.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::board::Color;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis service unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Analysis service returned status {0}")]
    Status(u16),
    #[error("Malformed analysis response: {0}")]
    Malformed(String),
    #[error("Analysis request timed out")]
    TimedOut,
    #[error("No async runtime to run the analysis request on")]
    NoRuntime,
    #[error("Analysis task ended without a result: {0}")]
    TaskLost(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionRequest {
    pub fen: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoachRequest {
    pub question: String,
    pub fen: String,
    pub player_color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BestMoveResponse {
    pub best_move: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalyzeResponse {
    pub analysis: String,
}

/// Answer to a coach request. The service puts its chat reply in
/// `best_move`, so it is renamed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachReply {
    #[serde(rename = "best_move")]
    pub reply: String,
    #[serde(default)]
    pub explanation: String,
}

/// Remote engine and coaching backend. One position per request, no state
/// kept between requests.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn best_move(&self, request: PositionRequest) -> Result<String, AnalysisError>;
    async fn analyze(&self, request: PositionRequest) -> Result<String, AnalysisError>;
    async fn coach(&self, request: CoachRequest) -> Result<CoachReply, AnalysisError>;
}

/// JSON-over-HTTP client for the analysis backend.
#[derive(Debug, Clone)]
pub struct HttpAnalysisService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalysisService {
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self, AnalysisError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(AnalysisError::Transport)?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, AnalysisError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.endpoint, path);
        debug!(%url, "Posting analysis request");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Status(status.as_u16()));
        }

        let text = response.text().await.map_err(transport)?;
        serde_json::from_str(&text).map_err(|e| AnalysisError::Malformed(e.to_string()))
    }
}

fn transport(err: reqwest::Error) -> AnalysisError {
    if err.is_timeout() {
        AnalysisError::TimedOut
    } else {
        AnalysisError::Transport(err)
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn best_move(&self, request: PositionRequest) -> Result<String, AnalysisError> {
        let response: BestMoveResponse = self.post("/best-move", &request).await?;
        Ok(response.best_move)
    }

    async fn analyze(&self, request: PositionRequest) -> Result<String, AnalysisError> {
        let response: AnalyzeResponse = self.post("/analyze", &request).await?;
        Ok(response.analysis)
    }

    async fn coach(&self, request: CoachRequest) -> Result<CoachReply, AnalysisError> {
        self.post("/coach", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_bodies() {
        let request = PositionRequest {
            fen: "8/8/8/8/8/8/8/8 w - - 0 1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "fen": "8/8/8/8/8/8/8/8 w - - 0 1" })
        );

        let request = CoachRequest {
            question: "What now?".to_string(),
            fen: "fen".to_string(),
            player_color: Color::Black,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "question": "What now?", "fen": "fen", "player_color": "black" })
        );
    }

    #[test]
    fn test_response_bodies() {
        let response: BestMoveResponse =
            serde_json::from_str(r#"{"best_move": "Nf3"}"#).unwrap();
        assert_eq!(response.best_move, "Nf3");

        let reply: CoachReply =
            serde_json::from_str(r#"{"best_move": "e2e4", "explanation": "Center."}"#).unwrap();
        assert_eq!(reply.reply, "e2e4");
        assert_eq!(reply.explanation, "Center.");

        assert!(serde_json::from_str::<AnalyzeResponse>(r#"{"reply": "x"}"#).is_err());
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let service = HttpAnalysisService::new("http://127.0.0.1:8000/", None).unwrap();
        assert_eq!(service.endpoint(), "http://127.0.0.1:8000");
    }
}
