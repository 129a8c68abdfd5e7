use sqlx::PgPool;

use crate::errors::AppError;
pub use crate::users::repo_types::{User, UserChanges};

const USER_COLUMNS: &str = "id, name, email, is_active, created_at, updated_at";

fn email_conflict(err: sqlx::Error, email: &str) -> AppError {
    match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict(format!("Email {} is already registered", email)),
        other => other,
    }
}

impl User {
    /// Insert a new user; a duplicate email surfaces as `Conflict`.
    pub async fn create(db: &PgPool, name: &str, email: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .fetch_one(db)
        .await
        .map_err(|e| email_conflict(e, email))
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn list(db: &PgPool, skip: i64, limit: i64) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Partial update in a single statement. `None` when no row has `id`.
    pub async fn update(
        db: &PgPool,
        id: i64,
        changes: &UserChanges,
    ) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   is_active = COALESCE($4, is_active),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.is_active)
        .fetch_optional(db)
        .await
        .map_err(|e| email_conflict(e, changes.email.as_deref().unwrap_or_default()))
    }

    /// Idempotent; reports whether a row was removed.
    pub async fn delete(db: &PgPool, id: i64) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}


#[cfg(test)]
mod pg_tests {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL pointing at a postgres server"]
    async fn crud_round(pool: PgPool) {
        let ada = User::create(&pool, "Ada", "ada@example.com").await.unwrap();
        assert!(ada.is_active);
        assert!(ada.updated_at.is_none());

        let found = User::find_by_email(&pool, "ada@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, ada.id);

        let changed = User::update(
            &pool,
            ada.id,
            &UserChanges {
                name: Some("Ada L.".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(changed.name, "Ada L.");
        assert_eq!(changed.email, "ada@example.com");
        assert!(changed.updated_at.is_some());

        assert!(User::delete(&pool, ada.id).await.unwrap());
        assert!(!User::delete(&pool, ada.id).await.unwrap());
        assert!(User::find_by_id(&pool, ada.id).await.unwrap().is_none());
        assert!(User::update(&pool, ada.id, &UserChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL pointing at a postgres server"]
    async fn duplicate_email_conflicts_and_keeps_original(pool: PgPool) {
        let first = User::create(&pool, "Grace", "grace@example.com").await.unwrap();
        let other = User::create(&pool, "Linus", "linus@example.com").await.unwrap();

        let err = User::create(&pool, "Imposter", "grace@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = User::update(
            &pool,
            other.id,
            &UserChanges {
                email: Some("grace@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let all = User::list(&pool, 0, 100).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|u| u.id == first.id && u.name == "Grace"));

        let page = User::list(&pool, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, other.id);
    }
}
