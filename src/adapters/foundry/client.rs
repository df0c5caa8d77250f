use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use super::auth::{AzureCliCredential, StaticToken, TokenCache, TokenSource};
use super::retry::RetryPolicy;
use super::types::{
    CreateAgentRequest, CreateMessageRequest, CreateRunRequest, CreateVectorStoreRequest,
    FileSearchResources, IdObject, ListResponse, ModifyThreadRequest, RunObject, ThreadMessage,
    ToolDefinition, ToolResources, VectorStoreObject,
};
use crate::domain::errors::WorkerError;
use crate::domain::models::config::{AuthMethod, WorkerConfig};
use crate::domain::models::{
    Artifact, JobSnapshot, JobStatus, MessageRole, TranscriptMessage, WorkerSession,
};
use crate::domain::ports::WorkerClient;

const PAGE_LIMIT: &str = "100";

/// HTTP client for the Azure AI Foundry agents API
///
/// A session is an agent plus a thread; artifacts become files indexed
/// by a vector store attached to the thread through its file search
/// tool resources. Transient failures (429, 5xx, network) are retried
/// with exponential backoff on every call. Every request carries the
/// current bearer token; a 401 drops the cached token.
pub struct FoundryAgentsClient {
    http_client: ReqwestClient,
    endpoint: String,
    api_version: String,
    tokens: TokenCache,
    model: String,
    agent_name: String,
    retry_policy: RetryPolicy,
}

impl fmt::Debug for FoundryAgentsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FoundryAgentsClient")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("tokens", &self.tokens)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl FoundryAgentsClient {
    /// Build a client from the worker configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or no token
    /// source matches the auth settings
    pub fn new(config: &WorkerConfig) -> Result<Self> {
        Self::with_token_source(config, token_source(config)?)
    }

    /// Build a client that takes its bearer tokens from `source`
    pub fn with_token_source(config: &WorkerConfig, source: Arc<dyn TokenSource>) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to build HTTP client")?;

        let client = Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            tokens: TokenCache::new(source, config.auth.refresh_margin_secs),
            model: config.model.clone(),
            agent_name: config.agent_name.clone(),
            retry_policy: RetryPolicy::from(&config.retry),
        };
        info!(
            endpoint = %client.endpoint,
            model = %client.model,
            auth = client.tokens.source_name(),
            "worker client configured"
        );
        Ok(client)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{path}", self.endpoint))
            .query(&[("api-version", self.api_version.as_str())])
    }

    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, WorkerError> {
        Ok(builder.bearer_auth(self.tokens.bearer().await?))
    }

    /// Send with retries and decode a JSON body
    async fn send<T, F>(&self, build: F) -> Result<T, WorkerError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder + Sync,
    {
        let build = &build;
        self.retry_policy
            .execute(move || async move {
                let response = self.authorized(build()).await?.send().await?;
                let response = self.check(response).await?;
                Ok(response.json::<T>().await?)
            })
            .await
    }

    /// DELETE a resource; an already missing resource counts as deleted
    async fn delete(&self, path: &str) -> Result<(), WorkerError> {
        let result = self
            .retry_policy
            .execute(move || async move {
                let response = self
                    .authorized(self.request(Method::DELETE, path))
                    .await?
                    .send()
                    .await?;
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(());
                }
                self.check(response).await.map(|_| ())
            })
            .await;
        if result.is_ok() {
            debug!(path, "deleted");
        }
        result
    }

    async fn check(&self, response: Response) -> Result<Response, WorkerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Err(WorkerError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Follow `after` cursors through a paged list
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<Vec<T>, WorkerError> {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page: ListResponse<T> = self
                .send(|| {
                    let mut builder = self
                        .request(Method::GET, path)
                        .query(&[("limit", PAGE_LIMIT)])
                        .query(extra);
                    if let Some(cursor) = &after {
                        builder = builder.query(&[("after", cursor.as_str())]);
                    }
                    builder
                })
                .await?;

            let done = !page.has_more || page.data.is_empty();
            after = page.last_id;
            items.extend(page.data);
            if done || after.is_none() {
                return Ok(items);
            }
        }
    }

    async fn purge_kind(&self, path: &str) -> Result<usize, WorkerError> {
        let ids: Vec<IdObject> = self.list_all(path, &[]).await?;
        let mut removed = 0;
        for IdObject { id } in ids {
            match self.delete(&format!("{path}/{id}")).await {
                Ok(()) => removed += 1,
                Err(err) => warn!(path, id = %id, error = %err, "failed to delete stale resource"),
            }
        }
        Ok(removed)
    }
}

/// Pick the token source the auth settings ask for.
fn token_source(config: &WorkerConfig) -> Result<Arc<dyn TokenSource>> {
    let key = config.api_key.as_deref().filter(|k| !k.trim().is_empty());
    let cli = || -> Arc<dyn TokenSource> {
        Arc::new(AzureCliCredential::new(
            config.auth.cli_program.clone(),
            config.auth.resource.clone(),
        ))
    };
    Ok(match (config.auth.method, key) {
        (AuthMethod::AzureCli, _) | (AuthMethod::Auto, None) => cli(),
        (AuthMethod::ApiKey | AuthMethod::Auto, Some(key)) => {
            Arc::new(StaticToken::new(key)) as Arc<dyn TokenSource>
        }
        (AuthMethod::ApiKey, None) => bail!("worker.auth.method is api_key but no api_key is set"),
    })
}

#[async_trait]
impl WorkerClient for FoundryAgentsClient {
    #[instrument(skip_all)]
    async fn create_session(&self, instructions: &str) -> Result<WorkerSession, WorkerError> {
        let agent: IdObject = self
            .send(|| {
                self.request(Method::POST, "assistants")
                    .json(&CreateAgentRequest {
                        model: &self.model,
                        name: &self.agent_name,
                        instructions,
                        tools: vec![ToolDefinition::file_search()],
                    })
            })
            .await?;

        let thread: IdObject = match self
            .send(|| self.request(Method::POST, "threads").json(&serde_json::json!({})))
            .await
        {
            Ok(thread) => thread,
            Err(err) => {
                if let Err(cleanup) = self.delete(&format!("assistants/{}", agent.id)).await {
                    warn!(
                        agent_id = %agent.id,
                        error = %cleanup,
                        "failed to delete orphaned agent"
                    );
                }
                return Err(err);
            }
        };

        debug!(agent_id = %agent.id, thread_id = %thread.id, "session created");
        Ok(WorkerSession {
            id: thread.id,
            agent_id: agent.id,
            index_id: None,
            file_ids: Vec::new(),
        })
    }

    #[instrument(skip_all, fields(name = %artifact.name))]
    async fn upload_artifact(&self, artifact: &Artifact) -> Result<String, WorkerError> {
        let bytes = tokio::fs::read(&artifact.path)
            .await
            .map_err(|source| WorkerError::Artifact {
                path: artifact.path.clone(),
                source,
            })?;

        let file: IdObject = self
            .send(|| {
                let part = Part::bytes(bytes.clone()).file_name(artifact.name.clone());
                let form = Form::new().text("purpose", "assistants").part("file", part);
                self.request(Method::POST, "files").multipart(form)
            })
            .await?;
        Ok(file.id)
    }

    async fn create_index(&self, name: &str, file_ids: &[String]) -> Result<String, WorkerError> {
        let store: VectorStoreObject = self
            .send(|| {
                self.request(Method::POST, "vector_stores")
                    .json(&CreateVectorStoreRequest { name, file_ids })
            })
            .await?;
        debug!(index_id = %store.id, status = %store.status, "vector store created");
        Ok(store.id)
    }

    async fn index_status(&self, index_id: &str) -> Result<JobSnapshot, WorkerError> {
        let store: VectorStoreObject = self
            .send(|| self.request(Method::GET, &format!("vector_stores/{index_id}")))
            .await?;
        let status = JobStatus::from_remote(&store.status).ok_or_else(|| {
            WorkerError::InvalidResponse(format!("unknown vector store status `{}`", store.status))
        })?;
        Ok(match status {
            JobStatus::Failed => JobSnapshot::failed(format!("vector store {}", store.status)),
            other => JobSnapshot::new(other),
        })
    }

    async fn attach_index(
        &self,
        session: &WorkerSession,
        index_id: &str,
    ) -> Result<(), WorkerError> {
        let _: IdObject = self
            .send(|| {
                self.request(Method::POST, &format!("threads/{}", session.id))
                    .json(&ModifyThreadRequest {
                        tool_resources: ToolResources {
                            file_search: FileSearchResources {
                                vector_store_ids: vec![index_id],
                            },
                        },
                    })
            })
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        session: &WorkerSession,
        text: &str,
    ) -> Result<String, WorkerError> {
        let message: IdObject = self
            .send(|| {
                self.request(Method::POST, &format!("threads/{}/messages", session.id))
                    .json(&CreateMessageRequest {
                        role: "user",
                        content: text,
                    })
            })
            .await?;
        Ok(message.id)
    }

    async fn start_job(&self, session: &WorkerSession) -> Result<String, WorkerError> {
        let run: RunObject = self
            .send(|| {
                self.request(Method::POST, &format!("threads/{}/runs", session.id))
                    .json(&CreateRunRequest {
                        assistant_id: &session.agent_id,
                    })
            })
            .await?;
        Ok(run.id)
    }

    async fn poll_job(
        &self,
        session: &WorkerSession,
        job_id: &str,
    ) -> Result<JobSnapshot, WorkerError> {
        let run: RunObject = self
            .send(|| self.request(Method::GET, &format!("threads/{}/runs/{job_id}", session.id)))
            .await?;
        let status = JobStatus::from_remote(&run.status).ok_or_else(|| {
            WorkerError::InvalidResponse(format!("unknown run status `{}`", run.status))
        })?;
        Ok(match status {
            JobStatus::Failed => JobSnapshot::failed(
                run.last_error
                    .map(|e| e.reason())
                    .unwrap_or_else(|| format!("run {}", run.status)),
            ),
            other => JobSnapshot::new(other),
        })
    }

    async fn read_transcript(
        &self,
        session: &WorkerSession,
    ) -> Result<Vec<TranscriptMessage>, WorkerError> {
        let messages: Vec<ThreadMessage> = self
            .list_all(&format!("threads/{}/messages", session.id), &[("order", "asc")])
            .await?;
        Ok(messages
            .into_iter()
            .map(|m| TranscriptMessage {
                text: m.text(),
                role: if m.role == "user" {
                    MessageRole::User
                } else {
                    MessageRole::Assistant
                },
                id: m.id,
            })
            .collect())
    }

    #[instrument(skip_all, fields(session_id = %session.id))]
    async fn teardown_session(&self, session: &WorkerSession) -> Result<(), WorkerError> {
        let mut paths = Vec::new();
        if !session.id.is_empty() {
            paths.push(format!("threads/{}", session.id));
        }
        if !session.agent_id.is_empty() {
            paths.push(format!("assistants/{}", session.agent_id));
        }
        if let Some(index_id) = &session.index_id {
            paths.push(format!("vector_stores/{index_id}"));
        }
        paths.extend(session.file_ids.iter().map(|id| format!("files/{id}")));

        let mut first_error = None;
        for path in &paths {
            if let Err(err) = self.delete(path).await {
                warn!(path = %path, error = %err, "teardown step failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn check_connection(&self) -> Result<(), WorkerError> {
        let thread: IdObject = self
            .send(|| self.request(Method::POST, "threads").json(&serde_json::json!({})))
            .await?;
        if let Err(err) = self.delete(&format!("threads/{}", thread.id)).await {
            warn!(thread_id = %thread.id, error = %err, "failed to delete connection check thread");
        }
        Ok(())
    }

    async fn purge_all(&self) -> Result<usize, WorkerError> {
        let mut removed = 0;
        for kind in ["threads", "assistants", "vector_stores", "files"] {
            removed += self.purge_kind(kind).await?;
        }
        Ok(removed)
    }
}
