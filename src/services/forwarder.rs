use crate::api::error::AppError;
use crate::services::receiver::{AI_TYPE_FIELD, AUDIO_FIELD, BRIDGE_FIELD};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const CONVERTED_MIME: &str = "audio/mpeg";

/// What the downstream service answered.
#[derive(Debug, Clone)]
pub struct ForwardOutcome {
    pub status: StatusCode,
    pub body: String,
}

/// Delivers a converted file plus its metadata to the downstream service.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        file: &Path,
        bridge: &str,
        ai_type: &str,
    ) -> Result<ForwardOutcome, AppError>;
}

pub struct HttpForwarder {
    client: reqwest::Client,
    url: Url,
    timeout: Option<Duration>,
}

impl HttpForwarder {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self {
            client,
            url,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// `audio_file` (named after the local file), then `bridge`, then `ai_type`.
pub async fn build_form(file: &Path, bridge: &str, ai_type: &str) -> Result<Form, AppError> {
    let data = tokio::fs::read(file).await.map_err(|e| {
        AppError::Forward(format!("failed to read {}: {}", file.display(), e))
    })?;

    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Forward(format!("{} has no file name", file.display())))?;

    let part = Part::bytes(data)
        .file_name(filename)
        .mime_str(CONVERTED_MIME)
        .map_err(|e| AppError::Forward(e.to_string()))?;

    Ok(Form::new()
        .part(AUDIO_FIELD, part)
        .text(BRIDGE_FIELD, bridge.to_string())
        .text(AI_TYPE_FIELD, ai_type.to_string()))
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        file: &Path,
        bridge: &str,
        ai_type: &str,
    ) -> Result<ForwardOutcome, AppError> {
        let form = build_form(file, bridge, ai_type).await?;

        let mut request = self.client.post(self.url.clone()).multipart(form);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        debug!(url = %self.url, file = %file.display(), "Forwarding converted file");
        let response = request.send().await.map_err(|e| {
            AppError::Forward(format!("failed to reach {}: {}", self.url, e))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Forward(format!("failed to read downstream response: {}", e)))?;

        info!(status = status.as_u16(), "Downstream response body: {}", body);

        if status != StatusCode::OK {
            return Err(AppError::Forward(format!("failed to forward file: {}", status)));
        }

        Ok(ForwardOutcome { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        extract::{Multipart, State},
        http::StatusCode as AxumStatus,
        routing::post,
    };
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tracing_test::traced_test;

    #[derive(Debug, Default, Clone)]
    struct Captured {
        fields: Vec<(String, Option<String>, Vec<u8>)>,
    }

    #[derive(Clone)]
    struct Downstream {
        captured: Arc<Mutex<Vec<Captured>>>,
        status: AxumStatus,
        body: &'static str,
    }

    async fn receive(State(state): State<Downstream>, mut multipart: Multipart) -> (AxumStatus, &'static str) {
        let mut captured = Captured::default();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            let data = field.bytes().await.unwrap().to_vec();
            captured.fields.push((name, filename, data));
        }
        state.captured.lock().unwrap().push(captured);
        (state.status, state.body)
    }

    async fn spawn_downstream(status: AxumStatus, body: &'static str) -> (Url, Arc<Mutex<Vec<Captured>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route("/ingest", post(receive)).with_state(Downstream {
            captured: captured.clone(),
            status,
            body,
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (Url::parse(&format!("http://{}/ingest", addr)).unwrap(), captured)
    }

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn converted_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("upload-abc.m4a.mp3");
        std::fs::write(&path, vec![0xFFu8; 1024]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_forwards_file_and_metadata() {
        let dir = TempDir::new().unwrap();
        let file = converted_file(&dir);
        let (url, captured) = spawn_downstream(AxumStatus::OK, "queued").await;

        let outcome = HttpForwarder::new(local_client(), url)
            .forward(&file, "slackbot", "transcribe")
            .await
            .unwrap();

        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.body, "queued");

        let calls = captured.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let fields = &calls[0].fields;
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].0, "audio_file");
        assert_eq!(fields[0].1.as_deref(), Some("upload-abc.m4a.mp3"));
        assert_eq!(fields[0].2, vec![0xFFu8; 1024]);
        assert_eq!(fields[1], ("bridge".to_string(), None, b"slackbot".to_vec()));
        assert_eq!(fields[2], ("ai_type".to_string(), None, b"transcribe".to_vec()));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_non_200_is_forward_error_and_body_is_logged() {
        let dir = TempDir::new().unwrap();
        let file = converted_file(&dir);
        let (url, captured) =
            spawn_downstream(AxumStatus::SERVICE_UNAVAILABLE, "transcriber overloaded, try later").await;

        let err = HttpForwarder::new(local_client(), url)
            .forward(&file, "", "")
            .await
            .unwrap_err();

        assert!(
            matches!(&err, AppError::Forward(msg) if msg == "failed to forward file: 503 Service Unavailable")
        );
        assert_eq!(captured.lock().unwrap().len(), 1);
        assert!(logs_contain("transcriber overloaded, try later"));
    }

    #[tokio::test]
    async fn test_other_2xx_is_still_an_error() {
        let dir = TempDir::new().unwrap();
        let file = converted_file(&dir);
        let (url, _captured) = spawn_downstream(AxumStatus::ACCEPTED, "").await;

        let err = HttpForwarder::new(local_client(), url)
            .forward(&file, "b", "a")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forward(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_forward_error_without_call() {
        let dir = TempDir::new().unwrap();
        let (url, captured) = spawn_downstream(AxumStatus::OK, "ok").await;

        let err = HttpForwarder::new(local_client(), url)
            .forward(&dir.path().join("gone.mp3"), "b", "a")
            .await
            .unwrap_err();

        assert!(matches!(&err, AppError::Forward(msg) if msg.starts_with("failed to read")));
        assert!(captured.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_downstream_is_forward_error() {
        let dir = TempDir::new().unwrap();
        let file = converted_file(&dir);
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpForwarder::new(
            local_client(),
            Url::parse(&format!("http://{}/ingest", addr)).unwrap(),
        )
        .forward(&file, "b", "a")
        .await
        .unwrap_err();

        assert!(matches!(&err, AppError::Forward(msg) if msg.starts_with("failed to reach")));
    }
}
