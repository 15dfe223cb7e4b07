//! HTTP implementation of the thread service.
//!
//! Wire shape: a user entity is created per thread, threads are scoped to
//! their user, uploads go through multipart, and message submission returns
//! a `text/event-stream` body decoded by [`crate::sse`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::BackendError;
use crate::stream::StreamEvent;
use crate::thread::{AiThread, FilePayload, FileRef, ThreadService, TurnRequest};

pub struct HttpThreadService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpThreadService {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn create_resource(&self, url: String) -> Result<CreatedResource, BackendError> {
        let resp = with_auth(self.client.post(&url), &self.api_key)
            .send()
            .await?;
        Ok(ok_or_api_error(resp).await?.json().await?)
    }
}

#[async_trait]
impl ThreadService for HttpThreadService {
    async fn create_thread(&self) -> Result<Arc<dyn AiThread>, BackendError> {
        let user = self
            .create_resource(format!("{}/v1/users", self.base_url))
            .await?;
        let thread = self
            .create_resource(format!("{}/v1/users/{}/threads", self.base_url, user.id))
            .await?;
        info!(thread_id = %thread.id, "backend thread created");

        Ok(Arc::new(HttpThread {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            thread_id: thread.id,
        }))
    }
}

struct HttpThread {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    thread_id: String,
}

#[async_trait]
impl AiThread for HttpThread {
    async fn upload_file(&self, file: FilePayload) -> Result<FileRef, BackendError> {
        debug!(name = %file.name, bytes = file.bytes.len(), is_image = file.is_image, "uploading file");

        let part = multipart::Part::bytes(file.bytes).file_name(file.name);
        let form = multipart::Form::new()
            .part("file", part)
            .text("is_image", if file.is_image { "true" } else { "false" });

        let url = format!("{}/v1/threads/{}/files", self.base_url, self.thread_id);
        let resp = with_auth(self.client.post(&url), &self.api_key)
            .multipart(form)
            .send()
            .await?;
        Ok(ok_or_api_error(resp).await?.json().await?)
    }

    async fn stream_turn(
        &self,
        req: TurnRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError> {
        let url = format!("{}/v1/threads/{}/messages", self.base_url, self.thread_id);
        let resp = with_auth(self.client.post(&url), &self.api_key)
            .header(ACCEPT, "text/event-stream")
            .json(&req)
            .send()
            .await?;
        let resp = ok_or_api_error(resp).await?;

        crate::sse::process_stream(resp, tx).await;
        Ok(())
    }
}

#[derive(Deserialize)]
struct CreatedResource {
    id: String,
}

fn with_auth(builder: reqwest::RequestBuilder, api_key: &Option<String>) -> reqwest::RequestBuilder {
    match api_key {
        Some(key) => builder.bearer_auth(key),
        None => builder,
    }
}

async fn ok_or_api_error(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Api {
        status: status.as_u16(),
        body,
    })
}
