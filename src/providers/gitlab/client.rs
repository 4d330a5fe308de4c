use std::time::Duration;

use log::debug;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{PipedashError, Result};
use crate::providers::ForgeApi;

use super::types::{Job, Pipeline, Project};

pub(super) const PROJECTS_PAGE_SIZE: usize = 100;

/// Thin REST client for the GitLab v4 API.
pub struct GitLabClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: Option<Token>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pipedash/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| PipedashError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut base = Url::parse(base_url)
            .map_err(|e| PipedashError::Config(format!("Invalid base URL: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let api_url = base
            .join("api/v4/")
            .map_err(|e| PipedashError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// Helper to build authenticated requests
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| PipedashError::Config(format!("Invalid endpoint URL: {e}")))
    }

    /// Sends a request and decodes the JSON body, mapping non-2xx responses to
    /// [`PipedashError::ApiError`].
    async fn send_json<T: DeserializeOwned>(&self, method: Method, url: Url) -> Result<T> {
        debug!("{method} {url}");

        let response = self
            .auth_request(self.client.request(method, url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(PipedashError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl ForgeApi for GitLabClient {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut url = self.endpoint("projects")?;
        url.query_pairs_mut()
            .append_pair("membership", "true")
            .append_pair("per_page", &PROJECTS_PAGE_SIZE.to_string());

        self.send_json(Method::GET, url).await
    }

    async fn latest_pipeline(&self, project_id: u64) -> Result<Option<Pipeline>> {
        let mut url = self.endpoint(&format!("projects/{project_id}/pipelines"))?;
        url.query_pairs_mut().append_pair("per_page", "1");

        let pipelines: Vec<Pipeline> = self.send_json(Method::GET, url).await?;
        Ok(pipelines.into_iter().next())
    }

    async fn retry_pipeline(&self, project_id: u64, pipeline_id: u64) -> Result<Pipeline> {
        let url = self.endpoint(&format!(
            "projects/{project_id}/pipelines/{pipeline_id}/retry"
        ))?;

        self.send_json(Method::POST, url).await
    }

    async fn list_jobs(&self, project_id: u64, pipeline_id: u64) -> Result<Vec<Job>> {
        let url = self.endpoint(&format!(
            "projects/{project_id}/pipelines/{pipeline_id}/jobs"
        ))?;

        self.send_json(Method::GET, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::gitlab::types::PipelineStatus;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server, token: Option<&str>) -> GitLabClient {
        GitLabClient::new(
            &server.url(),
            token.map(Token::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    const PIPELINE_JSON: &str = r#"{
        "id": 901,
        "status": "failed",
        "ref": "main",
        "sha": "abc123",
        "web_url": "https://gitlab.example.com/g/p/-/pipelines/901",
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:05:00Z"
    }"#;

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let result = GitLabClient::new("not a url", None, Duration::from_secs(5));
        assert!(matches!(result, Err(PipedashError::Config(_))));
    }

    #[test]
    fn test_base_url_with_path_keeps_prefix() {
        let client =
            GitLabClient::new("https://example.com/gitlab", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.api_url.as_str(), "https://example.com/gitlab/api/v4/");
    }

    #[tokio::test]
    async fn test_list_projects_sends_membership_query_and_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v4/projects")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("membership".into(), "true".into()),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .match_header("authorization", "Bearer glpat-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id": 1, "name": "api", "path_with_namespace": "g/api",
                     "web_url": "https://gitlab.example.com/g/api", "star_count": 3}]"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, Some("glpat-test"));
        let projects = client.list_projects().await.unwrap();

        mock.assert_async().await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].path_with_namespace, "g/api");
    }

    #[tokio::test]
    async fn test_latest_pipeline_returns_first_entry() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/projects/7/pipelines")
            .match_query(Matcher::UrlEncoded("per_page".into(), "1".into()))
            .with_status(200)
            .with_body(format!("[{PIPELINE_JSON}]"))
            .create_async()
            .await;

        let client = client_for(&server, None);
        let pipeline = client.latest_pipeline(7).await.unwrap().unwrap();

        assert_eq!(pipeline.id, 901);
        assert_eq!(pipeline.status, PipelineStatus::Failed);
    }

    #[tokio::test]
    async fn test_latest_pipeline_none_when_project_has_no_pipelines() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/projects/7/pipelines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = client_for(&server, None);
        assert!(client.latest_pipeline(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retry_pipeline_posts_and_decodes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v4/projects/7/pipelines/900/retry")
            .with_status(201)
            .with_body(PIPELINE_JSON)
            .create_async()
            .await;

        let client = client_for(&server, Some("glpat-test"));
        let pipeline = client.retry_pipeline(7, 900).await.unwrap();

        mock.assert_async().await;
        assert_eq!(pipeline.id, 901);
    }

    #[tokio::test]
    async fn test_http_error_maps_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/projects")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"401 Unauthorized"}"#)
            .create_async()
            .await;

        let client = client_for(&server, Some("bad"));
        let err = client.list_projects().await.unwrap_err();

        match err {
            PipedashError::ApiError { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Unauthorized"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v4/projects/7/pipelines/900/retry")
            .with_status(201)
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.retry_pipeline(7, 900).await.unwrap_err();
        assert!(matches!(err, PipedashError::Network(_)));
    }

    #[tokio::test]
    async fn test_list_jobs() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/projects/7/pipelines/901/jobs")
            .with_status(200)
            .with_body(
                r#"[{"id": 1, "status": "success", "name": "build", "stage": "build"},
                    {"id": 2, "status": "failed", "name": "rspec", "stage": "test"}]"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, None);
        let jobs = client.list_jobs(7, 901).await.unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].name, "rspec");
        assert_eq!(jobs[1].status, PipelineStatus::Failed);
    }

    #[tokio::test]
    async fn test_jobs_or_empty_degrades_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/projects/7/pipelines/901/jobs")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let client = client_for(&server, None);
        assert!(crate::providers::jobs_or_empty(&client, 7, 901).await.is_empty());
    }

    #[tokio::test]
    async fn test_canceling_pipeline_is_not_dropped() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/projects/3/pipelines")
            .match_query(Matcher::UrlEncoded("per_page".into(), "1".into()))
            .with_status(200)
            .with_body(
                r#"[{"id": 12, "status": "canceling", "ref": "main", "sha": "abc",
                     "web_url": "https://gitlab.example.com/-/pipelines/12"}]"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, None);
        let pipeline = client.latest_pipeline(3).await.unwrap().unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Canceling);
    }
}
