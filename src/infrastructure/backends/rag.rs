#[cfg(test)]
#[path = "rag_test.rs"]
mod tests;

use std::path::Path;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::StreamExt;
use futures::stream::TryStreamExt;
use reqwest::multipart;
use reqwest::Method;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::Serialize;
use tokio::fs;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::ByteStream;
use crate::domain::models::Message;
use crate::domain::models::Session;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SessionListResponse {
    sessions: Vec<Session>,
    #[serde(default)]
    total: u64,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RegisterRequest {
    session_id: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    session_id: String,
    messages: Vec<Message>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChatRequest {
    message: String,
    session_id: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IngestTextRequest {
    text: String,
    filename: String,
}

/// Body of ingestion responses. Successes carry `message`, rejections carry
/// `detail`.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StatusResponse {
    message: Option<String>,
    detail: Option<String>,
}

pub struct RagBackend {
    url: String,
    api_key: String,
    timeout: String,
    client: reqwest::Client,
}

impl Default for RagBackend {
    fn default() -> RagBackend {
        return RagBackend::new(
            Config::get(ConfigKey::BackendURL),
            Config::get(ConfigKey::ApiKey),
            Config::get(ConfigKey::BackendHealthCheckTimeout),
        );
    }
}

impl RagBackend {
    pub fn new(url: String, api_key: String, timeout: String) -> RagBackend {
        return RagBackend {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            client: reqwest::Client::new(),
        };
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{url}{path}", url = self.url));

        if self.api_key.is_empty() {
            return req;
        }

        return req.bearer_auth(&self.api_key);
    }
}

#[async_trait]
impl Backend for RagBackend {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("Backend URL is not defined");
        }

        let res = self
            .request(Method::GET, "/health")
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        let res = match res {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(error = ?err, "Backend is not reachable");
                bail!("Backend is not reachable at {}", self.url);
            }
        };

        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Backend health check failed");
            bail!("Backend health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let res = self
            .request(Method::GET, "/sessions")
            .send()
            .await?
            .error_for_status()?
            .json::<SessionListResponse>()
            .await?;

        return Ok(res.sessions);
    }

    #[allow(clippy::implicit_return)]
    async fn register_session(&self, id: &str) -> Result<()> {
        let req = RegisterRequest {
            session_id: id.to_string(),
        };

        self.request(Method::POST, "/session")
            .json(&req)
            .send()
            .await?
            .error_for_status()?;

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn history(&self, id: &str) -> Result<Vec<Message>> {
        let res = self
            .request(Method::GET, &format!("/history/{id}"))
            .send()
            .await?
            .error_for_status()?
            .json::<HistoryResponse>()
            .await?;

        return Ok(res.messages);
    }

    #[allow(clippy::implicit_return)]
    async fn delete_session(&self, id: &str) -> Result<()> {
        let res = self
            .request(Method::DELETE, &format!("/session/{id}"))
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                session_id = id,
                "Failed to delete session"
            );
            bail!("Failed to delete session {id}: status {}", res.status().as_u16());
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn chat(&self, id: &str, text: &str) -> Result<ByteStream> {
        let req = ChatRequest {
            message: text.to_string(),
            session_id: id.to_string(),
        };

        let res = self.request(Method::POST, "/chat").json(&req).send().await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to make chat request to the backend"
            );
            bail!("Chat request failed with status {}", res.status().as_u16());
        }

        let stream = res
            .bytes_stream()
            .map_ok(|bytes| return bytes.to_vec())
            .map_err(anyhow::Error::from)
            .boxed();

        return Ok(stream);
    }

    #[allow(clippy::implicit_return)]
    async fn ingest_file(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .map(|name| return name.to_string_lossy().to_string())
            .unwrap_or_else(|| return "document.txt".to_string());
        let payload = fs::read(path).await?;

        let part = multipart::Part::bytes(payload).file_name(file_name);
        let form = multipart::Form::new().part("file", part);

        let res = self
            .request(Method::POST, "/ingest/file")
            .multipart(form)
            .send()
            .await?;

        return ingestion_status(res).await;
    }

    #[allow(clippy::implicit_return)]
    async fn ingest_text(&self, text: &str, filename: &str) -> Result<String> {
        let req = IngestTextRequest {
            text: text.to_string(),
            filename: filename.to_string(),
        };

        let res = self
            .request(Method::POST, "/ingest")
            .json(&req)
            .send()
            .await?;

        return ingestion_status(res).await;
    }
}

/// Maps an ingestion response to the server's message, or its `detail` as an
/// error.
async fn ingestion_status(res: reqwest::Response) -> Result<String> {
    let status = res.status();
    let body = res.json::<StatusResponse>().await.unwrap_or_default();
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), detail = ?body.detail, "Ingestion rejected");
        match body.detail {
            Some(detail) => bail!(detail),
            None => bail!("server responded with status {}", status.as_u16()),
        }
    }

    return Ok(body
        .message
        .unwrap_or_else(|| return "Upload complete.".to_string()));
}
