use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LinkedAccount::Table)
                    .col(string(LinkedAccount::UserId).primary_key())
                    .col(string(LinkedAccount::Username))
                    .col(text(LinkedAccount::AccessToken))
                    .col(text(LinkedAccount::RefreshToken))
                    .col(text(LinkedAccount::Scopes).default(""))
                    .col(string(LinkedAccount::TokenType).default("Bearer"))
                    .col(timestamp_with_time_zone(LinkedAccount::Expiration))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_linked_account_username")
                    .table(LinkedAccount::Table)
                    .col(LinkedAccount::Username)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LinkedAccount::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum LinkedAccount {
    Table,
    UserId,
    Username,
    AccessToken,
    RefreshToken,
    Scopes,
    TokenType,
    Expiration,
}
