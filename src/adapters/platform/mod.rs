// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! REST client for the managed compute platform.

mod error;

pub use error::PlatformError;

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::ClusterClientPort;
use crate::app::types::{InstancePool, RunOutput, RunSnapshot, Workflow};

/// Object-store uploads are streamed in blocks of this size.
pub const BLOCK_SIZE: usize = 1024 * 1024;
const OBJECT_SCHEME: &str = "dbfs:";

#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(rename = "userName")]
    user_name: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    run_id: i64,
}

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    #[serde(default)]
    instance_pools: Vec<InstancePool>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    handle: i64,
}

#[derive(Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    host: String,
    token: String,
}

impl PlatformClient {
    pub fn new(host: &str, token: &str, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("testjob/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| AppError::local(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            host: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.host)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        decode(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, PlatformError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PlatformError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(PlatformError::from_response(status, &text));
    }
    let body = if text.trim().is_empty() { "{}" } else { text.as_str() };
    serde_json::from_str(body).map_err(|err| PlatformError::Decode(err.to_string()))
}

fn object_api_path(path: &str) -> &str {
    path.strip_prefix(OBJECT_SCHEME).unwrap_or(path)
}

fn mkdirs_result(result: Result<IgnoredAny, PlatformError>, operation: &str) -> AppResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.is_already_exists() => Ok(()),
        Err(err) => Err(err.into_app_error(operation)),
    }
}

#[async_trait]
impl ClusterClientPort for PlatformClient {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn current_user(&self) -> AppResult<String> {
        let me: MeResponse = self
            .get("/api/2.0/preview/scim/v2/Me", &[])
            .await
            .map_err(|err| err.into_app_error("identity lookup"))?;
        Ok(me.user_name)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(run_name = %workflow.run_name, tasks = workflow.tasks.len()))]
    async fn submit_run(&self, workflow: &Workflow) -> AppResult<i64> {
        let submitted: SubmitResponse = self
            .post("/api/2.1/jobs/runs/submit", workflow)
            .await
            .map_err(|err| err.into_app_error("submit run"))?;
        Ok(submitted.run_id)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn cancel_run(&self, run_id: i64) -> AppResult<()> {
        let _: IgnoredAny = self
            .post("/api/2.1/jobs/runs/cancel", &json!({ "run_id": run_id }))
            .await
            .map_err(|err| err.into_app_error("cancel run"))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_run(&self, run_id: i64) -> AppResult<RunSnapshot> {
        self.get("/api/2.1/jobs/runs/get", &[("run_id", run_id.to_string())])
            .await
            .map_err(|err| err.into_app_error("get run"))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_run_output(&self, task_run_id: i64) -> AppResult<RunOutput> {
        self.get(
            "/api/2.1/jobs/runs/get-output",
            &[("run_id", task_run_id.to_string())],
        )
        .await
        .map_err(|err| err.into_app_error("get run output"))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_instance_pools(&self) -> AppResult<Vec<InstancePool>> {
        let listed: PoolsResponse = self
            .get("/api/2.0/instance-pools/list", &[])
            .await
            .map_err(|err| err.into_app_error("list instance pools"))?;
        Ok(listed.instance_pools)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn workspace_mkdirs(&self, path: &str) -> AppResult<()> {
        let result = self
            .post("/api/2.0/workspace/mkdirs", &json!({ "path": path }))
            .await;
        mkdirs_result(result, "workspace mkdirs")
    }

    #[tracing::instrument(level = "debug", skip(self, content), fields(bytes = content.len()))]
    async fn workspace_import(&self, path: &str, content: &[u8]) -> AppResult<()> {
        let body = json!({
            "path": path,
            "format": "AUTO",
            "content": STANDARD.encode(content),
            "overwrite": true,
        });
        let _: IgnoredAny = self
            .post("/api/2.0/workspace/import", &body)
            .await
            .map_err(|err| err.into_app_error(&format!("workspace import of {path}")))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn object_mkdirs(&self, path: &str) -> AppResult<()> {
        let result = self
            .post(
                "/api/2.0/dbfs/mkdirs",
                &json!({ "path": object_api_path(path) }),
            )
            .await;
        mkdirs_result(result, "object mkdirs")
    }

    #[tracing::instrument(level = "debug", skip(self, content), fields(bytes = content.len()))]
    async fn object_upload(&self, path: &str, content: &[u8]) -> AppResult<()> {
        let upload_error = |err: PlatformError| err.into_app_error(&format!("object upload of {path}"));
        let created: CreateResponse = self
            .post(
                "/api/2.0/dbfs/create",
                &json!({ "path": object_api_path(path), "overwrite": true }),
            )
            .await
            .map_err(upload_error)?;
        for block in content.chunks(BLOCK_SIZE) {
            let _: IgnoredAny = self
                .post(
                    "/api/2.0/dbfs/add-block",
                    &json!({ "handle": created.handle, "data": STANDARD.encode(block) }),
                )
                .await
                .map_err(upload_error)?;
        }
        let _: IgnoredAny = self
            .post("/api/2.0/dbfs/close", &json!({ "handle": created.handle }))
            .await
            .map_err(upload_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::errors::codes;
    use crate::app::types::{DEFAULT_RUN_NAME, MULTI_TASK_FORMAT};
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> PlatformClient {
        PlatformClient::new(&server.url(), "dapi-token", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn identity_uses_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/2.0/preview/scim/v2/Me")
            .match_header("authorization", "Bearer dapi-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"userName":"me@example.com","id":"123"}"#)
            .create_async()
            .await;

        assert_eq!(client(&server).current_user().await.unwrap(), "me@example.com");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_pool_list_means_no_pools() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/2.0/instance-pools/list")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        assert!(client(&server).list_instance_pools().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_posts_the_job_document() {
        let mut server = mockito::Server::new_async().await;
        let workflow = Workflow {
            run_name: DEFAULT_RUN_NAME.to_string(),
            format: MULTI_TASK_FORMAT.to_string(),
            tasks: vec![],
        };
        let mock = server
            .mock("POST", "/api/2.1/jobs/runs/submit")
            .match_body(Matcher::Json(
                json!({"run_name": "Testing Run", "format": "MULTI_TASK", "tasks": []}),
            ))
            .with_status(200)
            .with_body(r#"{"run_id": 4242}"#)
            .create_async()
            .await;

        assert_eq!(client(&server).submit_run(&workflow).await.unwrap(), 4242);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_run_maps_missing_runs_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/2.1/jobs/runs/get")
            .match_query(Matcher::UrlEncoded("run_id".into(), "7".into()))
            .with_status(400)
            .with_body(r#"{"error_code":"RESOURCE_DOES_NOT_EXIST","message":"Run 7 does not exist."}"#)
            .create_async()
            .await;

        let err = client(&server).get_run(7).await.unwrap_err();
        assert_eq!(err.code(), codes::NOT_FOUND);
        assert!(err.to_string().contains("Run 7 does not exist."));
    }

    #[tokio::test]
    async fn run_output_decodes_logs() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/2.1/jobs/runs/get-output")
            .match_query(Matcher::UrlEncoded("run_id".into(), "8".into()))
            .with_status(200)
            .with_body(r#"{"logs":"hello\n","metadata":{"run_id":8}}"#)
            .create_async()
            .await;

        let output = client(&server).get_run_output(8).await.unwrap();
        assert_eq!(output.logs.as_deref(), Some("hello\n"));
    }

    #[tokio::test]
    async fn existing_directories_are_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/2.0/workspace/mkdirs")
            .with_status(400)
            .with_body(r#"{"error_code":"RESOURCE_ALREADY_EXISTS","message":"exists"}"#)
            .create_async()
            .await;

        client(&server)
            .workspace_mkdirs("/Workspace/Users/me/.testjob")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn workspace_import_sends_base64_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/2.0/workspace/import")
            .match_body(Matcher::Json(json!({
                "path": "/Workspace/Users/me/main.py",
                "format": "AUTO",
                "content": "cHJpbnQoKQ==",
                "overwrite": true
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        client(&server)
            .workspace_import("/Workspace/Users/me/main.py", b"print()")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn object_upload_streams_blocks_without_scheme() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/api/2.0/dbfs/create")
            .match_body(Matcher::Json(
                json!({"path": "/testjob/test/me/KEY/tests.archive", "overwrite": true}),
            ))
            .with_status(200)
            .with_body(r#"{"handle": 99}"#)
            .create_async()
            .await;
        let add = server
            .mock("POST", "/api/2.0/dbfs/add-block")
            .match_body(Matcher::PartialJson(json!({"handle": 99})))
            .with_status(200)
            .with_body("{}")
            .expect(3)
            .create_async()
            .await;
        let close = server
            .mock("POST", "/api/2.0/dbfs/close")
            .match_body(Matcher::Json(json!({"handle": 99})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let content = vec![7u8; 2 * BLOCK_SIZE + 1];
        client(&server)
            .object_upload("dbfs:/testjob/test/me/KEY/tests.archive", &content)
            .await
            .unwrap();

        create.assert_async().await;
        add.assert_async().await;
        close.assert_async().await;
    }

    #[tokio::test]
    async fn api_errors_carry_the_platform_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/2.1/jobs/runs/cancel")
            .with_status(403)
            .with_body(r#"{"error_code":"PERMISSION_DENIED","message":"not yours"}"#)
            .create_async()
            .await;

        let err = client(&server).cancel_run(1).await.unwrap_err();
        assert_eq!(err.code(), codes::REMOTE_ERROR);
        assert!(err.to_string().contains("PERMISSION_DENIED: not yours"));
    }
}
