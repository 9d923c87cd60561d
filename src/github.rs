use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
    config::RepoRef,
    contributors::{Contributor, ContributorDirectory, DirectoryError},
};

const PER_PAGE: usize = 100;
const USER_AGENT: &str = concat!("butler/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GithubContributor {
    login: Option<String>,
    #[serde(default)]
    contributions: u64,
}

/// Minimal GitHub REST client for repository contributor listings.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn contributors_page(
        &self,
        repo: &RepoRef,
        page: usize,
    ) -> Result<Vec<GithubContributor>, DirectoryError> {
        let url = format!(
            "{}/repos/{}/{}/contributors",
            self.base_url,
            repo.owner(),
            repo.name()
        );
        let mut request = self
            .http
            .get(url)
            .query(&[("per_page", PER_PAGE), ("page", page)])
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, USER_AGENT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            // GitHub answers 204 for empty repositories
            StatusCode::NO_CONTENT => Ok(Vec::new()),
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(repo.clone())),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(DirectoryError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl ContributorDirectory for GithubClient {
    async fn list_contributors(&self, repo: &RepoRef) -> Result<Vec<Contributor>, DirectoryError> {
        let mut contributors = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.contributors_page(repo, page).await?;
            let last_page = batch.len() < PER_PAGE;
            trace!("Fetched page {} of {} with {} contributors", page, repo, batch.len());
            contributors.extend(batch.into_iter().filter_map(|c| {
                c.login
                    .map(|login| Contributor::new(login, c.contributions))
            }));
            if last_page {
                break;
            }
            page += 1;
        }
        debug!("Fetched {} contributors of {}", contributors.len(), repo);
        Ok(contributors)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    use super::*;

    fn repo() -> RepoRef {
        "org/a".parse().unwrap()
    }

    #[tokio::test]
    async fn follows_pages_and_skips_anonymous_contributors() {
        let server = MockServer::start().await;
        let full_page: Vec<Value> = (0..PER_PAGE)
            .map(|i| json!({"login": format!("user{i}"), "contributions": 1}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/repos/org/a/contributors"))
            .and(query_param("page", "1"))
            .and(header("authorization", "Bearer gh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(full_page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/org/a/contributors"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"login": "alice", "contributions": 5},
                {"email": "anon@example.com", "contributions": 3, "type": "Anonymous"}
            ])))
            .mount(&server)
            .await;

        let client = GithubClient::new(reqwest::Client::new(), server.uri(), Some("gh-token".into()));
        let contributors = client.list_contributors(&repo()).await.unwrap();

        assert_eq!(contributors.len(), PER_PAGE + 1);
        assert_eq!(contributors[0], Contributor::new("user0", 1));
        assert_eq!(contributors.last(), Some(&Contributor::new("alice", 5)));
    }

    #[tokio::test]
    async fn empty_repository_has_no_contributors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/org/a/contributors"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = GithubClient::new(reqwest::Client::new(), server.uri(), None);
        assert!(client.list_contributors(&repo()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reports_missing_repository() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let client = GithubClient::new(reqwest::Client::new(), server.uri(), None);
        let err = client.list_contributors(&repo()).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(r) if r == repo()));
    }

    #[tokio::test]
    async fn reports_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = GithubClient::new(reqwest::Client::new(), server.uri(), None);
        let err = client.list_contributors(&repo()).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Api { status: 403, .. }));
    }
}
