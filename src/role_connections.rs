/*!

Discord application role connections ("linked roles").

The metadata schema is registered with the bot token, per-user metadata is pushed with the user's
own OAuth2 bearer token.

*/

use async_trait::async_trait;
use poise::serenity_prelude::ApplicationId;
use reqwest::RequestBuilder;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    contributors::{RoleMetadata, RoleMetadataSchemaEntry},
    linked_accounts::OAuthSession,
};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Discord rejected the request with {status}: {message}")]
    Rejected { status: u16, message: String },
}

#[async_trait]
pub trait RoleConnectionPublisher: Send + Sync {
    /// Replaces the role connection metadata of the user owning `session`.
    async fn update_role_connection(
        &self,
        session: &OAuthSession,
        metadata: &RoleMetadata,
    ) -> Result<(), PublishError>;

    /// Replaces the application's metadata schema. Idempotent.
    async fn register_metadata_schema(
        &self,
        entries: &[RoleMetadataSchemaEntry],
    ) -> Result<(), PublishError>;
}

#[derive(Serialize)]
struct RoleConnectionUpdate<'a> {
    metadata: &'a RoleMetadata,
}

pub struct DiscordRoleConnections {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    application_id: ApplicationId,
}

impl DiscordRoleConnections {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        application_id: ApplicationId,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            application_id,
        }
    }

    async fn send(request: RequestBuilder) -> Result<(), PublishError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(PublishError::Rejected {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.to_string()
            } else {
                message
            },
        })
    }
}

#[async_trait]
impl RoleConnectionPublisher for DiscordRoleConnections {
    async fn update_role_connection(
        &self,
        session: &OAuthSession,
        metadata: &RoleMetadata,
    ) -> Result<(), PublishError> {
        let url = format!(
            "{}/users/@me/applications/{}/role-connection",
            self.base_url, self.application_id
        );
        trace!("Updating role connection with {:?}", metadata);
        let request = self
            .http
            .put(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("{} {}", session.token_type, session.access_token),
            )
            .json(&RoleConnectionUpdate { metadata });
        Self::send(request).await
    }

    async fn register_metadata_schema(
        &self,
        entries: &[RoleMetadataSchemaEntry],
    ) -> Result<(), PublishError> {
        let url = format!(
            "{}/applications/{}/role-connections/metadata",
            self.base_url, self.application_id
        );
        debug!("Registering {} role connection metadata records", entries.len());
        let request = self
            .http
            .put(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bot {}", self.bot_token),
            )
            .json(entries);
        Self::send(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path},
    };

    use super::*;
    use crate::contributors::schema_entries;

    fn session(token: &str) -> OAuthSession {
        OAuthSession {
            access_token: token.into(),
            refresh_token: "refresh".into(),
            scopes: BTreeSet::from(["role_connections.write".to_string()]),
            token_type: "Bearer".into(),
            expiration: Utc::now(),
        }
    }

    fn client(server: &MockServer) -> DiscordRoleConnections {
        DiscordRoleConnections::new(
            reqwest::Client::new(),
            server.uri(),
            "bot-token",
            ApplicationId::new(42),
        )
    }

    #[tokio::test]
    async fn pushes_metadata_with_user_token() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/users/@me/applications/42/role-connection"))
            .and(header("authorization", "Bearer user-token"))
            .and(body_json(json!({"metadata": {"org_a_contributions": "5"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let metadata = RoleMetadata::from([("org_a_contributions".into(), "5".into())]);
        client(&server)
            .update_role_connection(&session("user-token"), &metadata)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn registers_schema_with_bot_token() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/applications/42/role-connections/metadata"))
            .and(header("authorization", "Bot bot-token"))
            .and(body_json(json!([{
                "type": 2,
                "key": "org_a_contributions",
                "name": "Contributions to org/a",
                "description": "The amount of contributions you have made to org/a project"
            }])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let entries = schema_entries(&["org/a".parse().unwrap()]);
        client(&server).register_metadata_schema(&entries).await.unwrap();
    }

    #[tokio::test]
    async fn surfaces_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(401).set_body_string("401: Unauthorized"))
            .mount(&server)
            .await;

        let err = client(&server)
            .update_role_connection(&session("expired"), &RoleMetadata::new())
            .await
            .unwrap_err();
        match err {
            PublishError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "401: Unauthorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
