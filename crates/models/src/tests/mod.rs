//! Database-backed tests. They skip when `SKIP_DB_TESTS` is set or no
//! PostgreSQL instance is reachable at `DATABASE_URL`.

use migration::MigratorTrait;
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::{db, user_account};

async fn migrated_db() -> Option<DatabaseConnection> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return None;
    }
    let db = match db::connect().await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("skip: cannot connect to db: {}", e);
            return None;
        }
    };
    if let Err(e) = migration::Migrator::up(&db, None).await {
        eprintln!("skip: migrate up failed: {}", e);
        return None;
    }
    Some(db)
}

fn unique_name(prefix: &str) -> String {
    format!("{prefix}_{}", &Uuid::new_v4().simple().to_string()[..12])
}

#[tokio::test]
async fn create_then_find_by_username_and_id() -> anyhow::Result<()> {
    let Some(db) = migrated_db().await else { return Ok(()) };
    let username = unique_name("alice");

    let created = user_account::create(&db, &username, "$argon2id$v=19$stub", "argon2id", "a@x.com").await?;
    assert_eq!(created.username, username);
    assert_eq!(created.created_at, created.updated_at);

    let by_name = user_account::find_by_username(&db, &username).await?.expect("row by username");
    assert_eq!(by_name.id, created.id);
    let by_id = user_account::find_by_id(&db, created.id).await?.expect("row by id");
    assert_eq!(by_id.username, username);

    user_account::Entity::delete_by_id(created.id).exec(&db).await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_username_maps_to_duplicate_error() -> anyhow::Result<()> {
    let Some(db) = migrated_db().await else { return Ok(()) };
    let username = unique_name("dup");

    let first = user_account::create(&db, &username, "$argon2id$v=19$a", "argon2id", "a@x.com").await?;
    let second = user_account::create(&db, &username, "$argon2id$v=19$b", "argon2id", "b@x.com").await;
    assert!(matches!(second, Err(ModelError::Duplicate(_))), "got {second:?}");

    user_account::Entity::delete_by_id(first.id).exec(&db).await?;
    Ok(())
}

#[tokio::test]
async fn missing_username_is_none() -> anyhow::Result<()> {
    let Some(db) = migrated_db().await else { return Ok(()) };
    let found = user_account::find_by_username(&db, &unique_name("ghost")).await?;
    assert!(found.is_none());
    Ok(())
}

#[tokio::test]
async fn create_rejects_blank_fields_before_touching_db() {
    // Validation runs before the insert, so a lazy connection is enough.
    let db = sea_orm::DatabaseConnection::Disconnected;
    let res = user_account::create(&db, "  ", "hash", "argon2id", "a@x.com").await;
    assert!(matches!(res, Err(ModelError::Validation(_))));
    let res = user_account::create(&db, "bob", "", "argon2id", "a@x.com").await;
    assert!(matches!(res, Err(ModelError::Validation(_))));
}
