//! Create `user_account` table.
//!
//! One row per username; the UNIQUE constraint on `username` is what makes
//! concurrent registrations of the same name collapse to a single winner.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserAccount::Table)
                    .if_not_exists()
                    .col(uuid(UserAccount::Id).primary_key())
                    .col(string_len(UserAccount::Username, 64).unique_key().not_null())
                    .col(string_len(UserAccount::PasswordHash, 255).not_null())
                    .col(string_len(UserAccount::PasswordAlgorithm, 32).not_null())
                    .col(string_len(UserAccount::Email, 255).not_null())
                    .col(timestamp_with_time_zone(UserAccount::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(UserAccount::UpdatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserAccount::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserAccount {
    Table,
    Id,
    Username,
    PasswordHash,
    PasswordAlgorithm,
    Email,
    CreatedAt,
    UpdatedAt,
}
