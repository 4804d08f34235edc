use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use super::{IdentifierSource, ProductStore, RecipientSource};
use crate::config::DatabaseConfig;
use crate::models::{Identifier, ProductState, Recipient};
use crate::utils::error::{AppError, Result};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS tracked_products (
        identifier TEXT PRIMARY KEY NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS recipients (
        email TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS products (
        identifier TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        image_url TEXT NOT NULL,
        url TEXT NOT NULL,
        current_price TEXT NOT NULL,
        previous_price TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
];

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        ensure_parent_dir(&config.url)?;

        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::info!(url = %config.url, "database ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn decode_decimal(text: &str) -> Result<Decimal> {
    Decimal::from_str(text).map_err(|e| AppError::Persistence(sqlx::Error::Decode(Box::new(e))))
}

fn product_from_row(row: &SqliteRow) -> Result<ProductState> {
    let current: String = row.try_get("current_price")?;
    let previous: Option<String> = row.try_get("previous_price")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(ProductState {
        identifier: row.try_get("identifier")?,
        name: row.try_get("name")?,
        image_url: row.try_get("image_url")?,
        url: row.try_get("url")?,
        current_price: decode_decimal(&current)?,
        previous_price: previous.as_deref().map(decode_decimal).transpose()?,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl ProductStore for SqliteStore {
    async fn get(&self, identifier: &str) -> Result<Option<ProductState>> {
        let row = sqlx::query("SELECT * FROM products WHERE identifier = ?")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn upsert(&self, product: &ProductState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products
                (identifier, name, image_url, url, current_price, previous_price, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(identifier) DO UPDATE SET
                name = excluded.name,
                image_url = excluded.image_url,
                url = excluded.url,
                current_price = excluded.current_price,
                previous_price = excluded.previous_price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.identifier)
        .bind(&product.name)
        .bind(&product.image_url)
        .bind(&product.url)
        .bind(product.current_price.to_string())
        .bind(product.previous_price.map(|p| p.to_string()))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ProductState>> {
        let rows = sqlx::query("SELECT * FROM products ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(product_from_row).collect()
    }
}

#[async_trait]
impl IdentifierSource for SqliteStore {
    async fn identifiers(&self) -> Result<Vec<Identifier>> {
        let rows = sqlx::query("SELECT identifier FROM tracked_products ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("identifier").map_err(AppError::from))
            .collect()
    }

    async fn track(&self, identifier: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO tracked_products (identifier, created_at) VALUES (?, ?) ON CONFLICT(identifier) DO NOTHING",
        )
        .bind(identifier)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl RecipientSource for SqliteStore {
    async fn recipients(&self) -> Result<Vec<Recipient>> {
        let rows = sqlx::query("SELECT email, name FROM recipients ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<Recipient> {
                Ok(Recipient {
                    email: row.try_get("email")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn add_recipient(&self, recipient: &Recipient) -> Result<()> {
        sqlx::query(
            "INSERT INTO recipients (email, name) VALUES (?, ?) ON CONFLICT(email) DO UPDATE SET name = excluded.name",
        )
        .bind(&recipient.email)
        .bind(&recipient.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
