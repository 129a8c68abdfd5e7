use anyhow::Context;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::DatabaseConfig;

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(cfg.pool_size)
        .max_connections((cfg.pool_size + cfg.max_overflow).max(1))
        .test_before_acquire(cfg.pre_ping)
        .max_lifetime(cfg.recycle)
        .connect(&cfg.url)
        .await
        .context("connect to database")
}

pub async fn run_migrations(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

#[derive(Debug, Serialize)]
pub struct TableInfo {
    pub table_name: String,
    pub column_count: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseReport {
    pub version: String,
    pub tables: Vec<TableInfo>,
}

/// Server version plus the public tables and their columns.
pub async fn describe(db: &PgPool) -> anyhow::Result<DatabaseReport> {
    let (version,): (String,) = sqlx::query_as("SELECT version()")
        .fetch_one(db)
        .await
        .context("select version")?;

    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT c.table_name::text, c.column_name::text
          FROM information_schema.columns c
          JOIN information_schema.tables t
            ON t.table_schema = c.table_schema AND t.table_name = c.table_name
         WHERE c.table_schema = 'public' AND t.table_type = 'BASE TABLE'
         ORDER BY c.table_name, c.ordinal_position
        "#,
    )
    .fetch_all(db)
    .await
    .context("list tables")?;

    let mut tables: Vec<TableInfo> = Vec::new();
    for (table, column) in rows {
        match tables.last_mut() {
            Some(t) if t.table_name == table => t.columns.push(column),
            _ => tables.push(TableInfo {
                table_name: table,
                column_count: 0,
                columns: vec![column],
            }),
        }
    }
    for t in &mut tables {
        t.column_count = t.columns.len();
    }

    Ok(DatabaseReport {
        version: version.split(',').next().unwrap_or_default().to_string(),
        tables,
    })
}
