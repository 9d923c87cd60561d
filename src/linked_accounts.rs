/*!

Users who linked their GitHub account through the role connection OAuth2 flow.

The linking flow itself writes rows into `linked_account`; the contributor sync only reads them.

*/

use std::{collections::BTreeSet, fmt};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::UserId;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, QueryOrder};
use tracing::{trace, warn};

use crate::{entities::linked_account, infrastructure::ids::id_from_string};

/// Discord OAuth2 session for a linked user.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub scopes: BTreeSet<String>,
    pub token_type: String,
    pub expiration: DateTime<Utc>,
}

impl OAuthSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

impl fmt::Debug for OAuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSession")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("token_type", &self.token_type)
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredUser {
    pub user_id: UserId,
    /// GitHub login
    pub username: String,
    pub session: OAuthSession,
}

#[async_trait]
pub trait RegisteredUserSource: Send + Sync {
    async fn list_all_registered_users(&self) -> Result<Vec<RegisteredUser>, DbErr>;
}

fn split_scopes(scopes: &str) -> BTreeSet<String> {
    scopes.split_whitespace().map(str::to_string).collect()
}

fn from_model(model: linked_account::Model) -> Option<RegisteredUser> {
    let user_id = match id_from_string::<UserId>(&model.user_id) {
        Ok(id) => id,
        Err(e) => {
            warn!("Skipping linked account with invalid user id {:?}: {}", model.user_id, e);
            return None;
        }
    };
    Some(RegisteredUser {
        user_id,
        username: model.username,
        session: OAuthSession {
            scopes: split_scopes(&model.scopes),
            access_token: model.access_token,
            refresh_token: model.refresh_token,
            token_type: model.token_type,
            expiration: model.expiration,
        },
    })
}

#[async_trait]
impl RegisteredUserSource for DatabaseConnection {
    async fn list_all_registered_users(&self) -> Result<Vec<RegisteredUser>, DbErr> {
        let models = linked_account::Entity::find()
            .order_by_asc(linked_account::Column::UserId)
            .all(self)
            .await?;
        trace!("Loaded {} linked accounts", models.len());
        Ok(models.into_iter().filter_map(from_model).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveValue::Set, ConnectOptions, Database};

    use super::*;

    /// Writes a row the way the linking flow does.
    async fn insert_linked_account(db: &DatabaseConnection, user: &RegisteredUser) {
        linked_account::Entity::insert(linked_account::ActiveModel {
            user_id: Set(user.user_id.to_string()),
            username: Set(user.username.clone()),
            access_token: Set(user.session.access_token.clone()),
            refresh_token: Set(user.session.refresh_token.clone()),
            scopes: Set(user.session.scopes.iter().cloned().collect::<Vec<_>>().join(" ")),
            token_type: Set(user.session.token_type.clone()),
            expiration: Set(user.session.expiration),
        })
        .exec(db)
        .await
        .unwrap();
    }

    async fn memory_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1);
        let db = Database::connect(opt).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn user(id: u64, username: &str, token: &str) -> RegisteredUser {
        RegisteredUser {
            user_id: UserId::new(id),
            username: username.into(),
            session: OAuthSession {
                access_token: token.into(),
                refresh_token: format!("{token}-refresh"),
                scopes: split_scopes("identify role_connections.write"),
                token_type: "Bearer".into(),
                expiration: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            },
        }
    }

    #[tokio::test]
    async fn round_trips_linked_accounts() {
        let db = memory_db().await;
        let alice = user(1, "alice", "a1");
        let bob = user(2, "bob", "b1");
        insert_linked_account(&db, &bob).await;
        insert_linked_account(&db, &alice).await;

        let users = db.list_all_registered_users().await.unwrap();
        assert_eq!(users, vec![alice, bob]);
    }

    #[tokio::test]
    async fn restores_scopes_and_skips_invalid_ids() {
        let db = memory_db().await;
        insert_linked_account(&db, &user(1, "alice", "a1")).await;
        linked_account::Entity::insert(linked_account::ActiveModel {
            user_id: Set("not-a-snowflake".into()),
            username: Set("mallory".into()),
            access_token: Set("m1".into()),
            refresh_token: Set("m1-refresh".into()),
            scopes: Set(String::new()),
            token_type: Set("Bearer".into()),
            expiration: Set(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
        })
        .exec(&db)
        .await
        .unwrap();

        let users = db.list_all_registered_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");
        assert!(users[0].session.scopes.contains("role_connections.write"));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let rendered = format!("{:?}", user(1, "alice", "secret-token").session);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("role_connections.write"));
    }

    #[test]
    fn expiry_is_inclusive() {
        let session = user(1, "alice", "a").session;
        assert!(session.is_expired_at(session.expiration));
        assert!(!session.is_expired_at(Utc.with_ymd_and_hms(2029, 12, 31, 0, 0, 0).unwrap()));
    }
}
