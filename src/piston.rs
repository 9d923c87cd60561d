/*!

Client for the Piston code execution engine.

*/

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum PistonError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Runtime {
    pub language: String,
    pub version: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Runtime {
    /// Case-insensitive match against the language name or any alias.
    pub fn matches(&self, tag: &str) -> bool {
        self.language.eq_ignore_ascii_case(tag)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(tag))
    }
}

/// Finds the runtime a code block language tag refers to.
pub fn resolve_runtime<'a>(runtimes: &'a [Runtime], tag: &str) -> Option<&'a Runtime> {
    runtimes
        .iter()
        .find(|runtime| runtime.language.eq_ignore_ascii_case(tag))
        .or_else(|| runtimes.iter().find(|runtime| runtime.matches(tag)))
}

#[derive(Debug, Serialize)]
struct ExecuteFile<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<ExecuteFile<'a>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StageOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub output: String,
    pub code: Option<i32>,
    pub signal: Option<String>,
}

impl StageOutput {
    fn failed(&self) -> bool {
        self.code.is_some_and(|code| code != 0) || self.signal.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Execution {
    pub language: String,
    pub version: String,
    pub run: StageOutput,
    pub compile: Option<StageOutput>,
}

impl Execution {
    /// Combined output of the failing compile stage, or of the run stage otherwise.
    pub fn output(&self) -> &str {
        match &self.compile {
            Some(compile) if compile.failed() => &compile.output,
            _ => &self.run.output,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Clone)]
pub struct PistonClient {
    http: reqwest::Client,
    base_url: String,
}

impl PistonClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PistonError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiMessage>(&body)
            .map(|m| m.message)
            .unwrap_or(body);
        Err(PistonError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn runtimes(&self) -> Result<Vec<Runtime>, PistonError> {
        let response = self
            .http
            .get(format!("{}/runtimes", self.base_url))
            .send()
            .await?;
        let runtimes: Vec<Runtime> = Self::check(response).await?.json().await?;
        trace!("Piston offers {} runtimes", runtimes.len());
        Ok(runtimes)
    }

    /// Runs `code` with the latest installed version of `language`.
    pub async fn execute(&self, language: &str, code: &str) -> Result<Execution, PistonError> {
        debug!("Executing {} bytes of {}", code.len(), language);
        let response = self
            .http
            .post(format!("{}/execute", self.base_url))
            .json(&ExecuteRequest {
                language,
                version: "*",
                files: vec![ExecuteFile { content: code }],
            })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    use super::*;

    fn runtime(language: &str, aliases: &[&str]) -> Runtime {
        Runtime {
            language: language.into(),
            version: "1.0.0".into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn resolves_languages_and_aliases_case_insensitively() {
        let runtimes = vec![
            runtime("python", &["py", "py3"]),
            runtime("go", &["golang"]),
        ];
        assert_eq!(resolve_runtime(&runtimes, "Python").unwrap().language, "python");
        assert_eq!(resolve_runtime(&runtimes, "PY3").unwrap().language, "python");
        assert_eq!(resolve_runtime(&runtimes, "golang").unwrap().language, "go");
        assert!(resolve_runtime(&runtimes, "brainfuck").is_none());
        assert!(resolve_runtime(&runtimes, "pyth").is_none());
    }

    #[test]
    fn language_names_win_over_aliases() {
        let runtimes = vec![runtime("javascript", &["node"]), runtime("node", &[])];
        assert_eq!(resolve_runtime(&runtimes, "node").unwrap().language, "node");
    }

    #[test]
    fn prefers_failed_compile_output() {
        let execution = Execution {
            language: "rust".into(),
            version: "1.68.2".into(),
            run: StageOutput::default(),
            compile: Some(StageOutput {
                output: "error[E0425]".into(),
                code: Some(1),
                ..Default::default()
            }),
        };
        assert_eq!(execution.output(), "error[E0425]");
    }

    #[tokio::test]
    async fn lists_runtimes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/runtimes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"language": "go", "version": "1.16.2", "aliases": ["go", "golang"]}
            ])))
            .mount(&server)
            .await;

        let client = PistonClient::new(reqwest::Client::new(), server.uri());
        assert_eq!(
            client.runtimes().await.unwrap(),
            vec![runtime("go", &["go", "golang"]).with_version("1.16.2")]
        );
    }

    #[tokio::test]
    async fn executes_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .and(body_json(json!({
                "language": "go",
                "version": "*",
                "files": [{"content": "package main"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "language": "go",
                "version": "1.16.2",
                "run": {"stdout": "hi\n", "stderr": "", "output": "hi\n", "code": 0, "signal": null}
            })))
            .mount(&server)
            .await;

        let client = PistonClient::new(reqwest::Client::new(), server.uri());
        let execution = client.execute("go", "package main").await.unwrap();
        assert_eq!(execution.output(), "hi\n");
    }

    #[tokio::test]
    async fn surfaces_api_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"message": "go-* runtime is unknown"})),
            )
            .mount(&server)
            .await;

        let client = PistonClient::new(reqwest::Client::new(), server.uri());
        let err = client.execute("go", "").await.unwrap_err();
        assert_eq!(err.to_string(), "go-* runtime is unknown");
    }

    impl Runtime {
        fn with_version(mut self, version: &str) -> Self {
            self.version = version.into();
            self
        }
    }
}
