//! Pull side of the dashboard: the tentacle preview HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tp_core::{
    BuildLogEntry, BuildLogsResponse, LogKind, StartLogsResponse, SystemLogEntry,
    SystemLogsResponse, WorkerRecord, WorkersResponse,
};
use url::Url;

use crate::error::ApiError;

#[async_trait]
pub trait PullApi: Send + Sync {
    async fn list_workers(&self) -> Result<Vec<WorkerRecord>, ApiError>;
    async fn build_logs(&self, worker: &str) -> Result<Vec<BuildLogEntry>, ApiError>;
    async fn start_logs(&self, worker: &str) -> Result<Vec<String>, ApiError>;
    async fn restart(&self, worker: &str, clean: bool) -> Result<Value, ApiError>;
    async fn system_logs(&self) -> Result<Vec<SystemLogEntry>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
}

impl HttpApi {
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| ApiError::Network(format!("failed to create HTTP client: {err}")))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::Url(err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

pub fn logs_path(worker: &str, kind: LogKind) -> String {
    format!(
        "api/tentacles/{}/logs/{}",
        urlencoding::encode(worker),
        kind.as_str()
    )
}

pub fn restart_path(worker: &str, clean: bool) -> String {
    format!("api/tentacles/{}/restart/{clean}", urlencoding::encode(worker))
}

#[async_trait]
impl PullApi for HttpApi {
    async fn list_workers(&self) -> Result<Vec<WorkerRecord>, ApiError> {
        let response: WorkersResponse = self.get_json("api/tentacles").await?;
        Ok(response.tentacles)
    }

    async fn build_logs(&self, worker: &str) -> Result<Vec<BuildLogEntry>, ApiError> {
        let response: BuildLogsResponse = self.get_json(&logs_path(worker, LogKind::Build)).await?;
        Ok(response.logs)
    }

    async fn start_logs(&self, worker: &str) -> Result<Vec<String>, ApiError> {
        let response: StartLogsResponse = self.get_json(&logs_path(worker, LogKind::Start)).await?;
        Ok(response.logs)
    }

    async fn restart(&self, worker: &str, clean: bool) -> Result<Value, ApiError> {
        self.get_json(&restart_path(worker, clean)).await
    }

    async fn system_logs(&self) -> Result<Vec<SystemLogEntry>, ApiError> {
        let response: SystemLogsResponse = self.get_json("api/tentacles/system-logs").await?;
        Ok(response.logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tp_core::{Outcome, SystemLogLevel};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> HttpApi {
        let base = Url::parse(&format!("{}/", server.uri())).expect("base url");
        HttpApi::new(base, None).expect("client")
    }

    #[test]
    fn worker_names_are_percent_encoded_in_paths() {
        assert_eq!(
            logs_path("feature/login page", LogKind::Build),
            "api/tentacles/feature%2Flogin%20page/logs/build"
        );
        assert_eq!(restart_path("a&b", true), "api/tentacles/a%26b/restart/true");
    }

    #[tokio::test]
    async fn list_workers_decodes_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tentacles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tentacles": [
                    {"name": "main", "url": "127.0.0.1:4100", "is_build_success": true,
                     "is_start_success": null, "last_commit": "fix login"}
                ]
            })))
            .mount(&server)
            .await;

        let workers = api_for(&server).list_workers().await.expect("workers");
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].name, "main");
        assert_eq!(workers[0].is_build_success, Outcome::Success);
        assert_eq!(workers[0].is_start_success, Outcome::Pending);
    }

    #[tokio::test]
    async fn logs_use_encoded_worker_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tentacles/feature%2Fx/logs/start"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"logs": ["booting", "ready"]})),
            )
            .mount(&server)
            .await;

        let lines = api_for(&server).start_logs("feature/x").await.expect("logs");
        assert_eq!(lines, vec!["booting".to_string(), "ready".to_string()]);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tentacles/system-logs"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = api_for(&server).system_logs().await.unwrap_err();
        assert_eq!(err, ApiError::Status { status: 503 });
        assert_eq!(err.to_string(), "HTTP 503");
    }

    #[tokio::test]
    async fn system_logs_keep_server_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tentacles/system-logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "logs": [
                    {"message": "Updating", "log_type": "header"},
                    {"message": "fetched", "log_type": "success"}
                ]
            })))
            .mount(&server)
            .await;

        let logs = api_for(&server).system_logs().await.expect("logs");
        assert_eq!(logs[0].log_type, SystemLogLevel::Header);
        assert_eq!(logs[1].message, "fetched");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let base = Url::parse("http://127.0.0.1:9/").expect("url");
        let api = HttpApi::new(base, Some(Duration::from_secs(2))).expect("client");
        let err = api.list_workers().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
    }
}
