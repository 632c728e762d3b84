//! Persistence for users, stored onboarding PDFs and form progress

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::RwLock;

use crate::models::{DbProgress, DbUser, DbUserPdf, UserPdfUpsert};

pub type StoreResult<T> = std::result::Result<T, sqlx::Error>;

#[async_trait]
pub trait OnboardStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> StoreResult<Option<DbUser>>;

    /// Display name from the user's profile, if one was filled in
    async fn profile_name(&self, user_id: &str) -> StoreResult<Option<String>>;

    async fn find_user_pdf(&self, user_id: &str) -> StoreResult<Option<DbUserPdf>>;

    /// Insert or update the user's record. Payloads left as `None` keep
    /// their stored value.
    async fn upsert_user_pdf(&self, upsert: UserPdfUpsert) -> StoreResult<DbUserPdf>;

    async fn upsert_progress(
        &self,
        user_id: &str,
        form_name: &str,
        pdf_data: Vec<u8>,
    ) -> StoreResult<DbProgress>;

    async fn find_progress(&self, user_id: &str, form_name: &str)
        -> StoreResult<Option<DbProgress>>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        tracing::info!(max_connections, "Connecting to database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &PgPool) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT,
                name TEXT,
                role TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                full_name TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_pdfs (
                user_id TEXT PRIMARY KEY,
                pdf_data BYTEA,
                waiver_pdf_data BYTEA,
                disclosure_pdf_data BYTEA,
                addon_pdf_data BYTEA,
                signature TEXT,
                signature_type TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS onboarding_progress (
                user_id TEXT NOT NULL,
                form_name TEXT NOT NULL,
                pdf_data BYTEA NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (user_id, form_name)
            )
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }
}

#[async_trait]
impl OnboardStore for PgStore {
    async fn find_user(&self, user_id: &str) -> StoreResult<Option<DbUser>> {
        sqlx::query_as::<_, DbUser>("SELECT id, email, name, role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn profile_name(&self, user_id: &str) -> StoreResult<Option<String>> {
        let name: Option<Option<String>> =
            sqlx::query_scalar("SELECT full_name FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(name.flatten())
    }

    async fn find_user_pdf(&self, user_id: &str) -> StoreResult<Option<DbUserPdf>> {
        sqlx::query_as::<_, DbUserPdf>("SELECT * FROM user_pdfs WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn upsert_user_pdf(&self, upsert: UserPdfUpsert) -> StoreResult<DbUserPdf> {
        sqlx::query_as::<_, DbUserPdf>(
            r#"
            INSERT INTO user_pdfs (
                user_id, pdf_data, waiver_pdf_data, disclosure_pdf_data,
                addon_pdf_data, signature, signature_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                pdf_data = COALESCE(EXCLUDED.pdf_data, user_pdfs.pdf_data),
                waiver_pdf_data = COALESCE(EXCLUDED.waiver_pdf_data, user_pdfs.waiver_pdf_data),
                disclosure_pdf_data = COALESCE(EXCLUDED.disclosure_pdf_data, user_pdfs.disclosure_pdf_data),
                addon_pdf_data = COALESCE(EXCLUDED.addon_pdf_data, user_pdfs.addon_pdf_data),
                signature = COALESCE(EXCLUDED.signature, user_pdfs.signature),
                signature_type = CASE
                    WHEN EXCLUDED.signature IS NULL THEN user_pdfs.signature_type
                    ELSE EXCLUDED.signature_type
                END,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(&upsert.user_id)
        .bind(&upsert.pdf_data)
        .bind(&upsert.waiver_pdf_data)
        .bind(&upsert.disclosure_pdf_data)
        .bind(&upsert.addon_pdf_data)
        .bind(&upsert.signature)
        .bind(&upsert.signature_type)
        .fetch_one(&self.pool)
        .await
    }

    async fn upsert_progress(
        &self,
        user_id: &str,
        form_name: &str,
        pdf_data: Vec<u8>,
    ) -> StoreResult<DbProgress> {
        sqlx::query_as::<_, DbProgress>(
            r#"
            INSERT INTO onboarding_progress (user_id, form_name, pdf_data)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, form_name) DO UPDATE SET
                pdf_data = EXCLUDED.pdf_data,
                updated_at = now()
            RETURNING user_id, form_name, pdf_data, updated_at
            "#,
        )
        .bind(user_id)
        .bind(form_name)
        .bind(pdf_data)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_progress(
        &self,
        user_id: &str,
        form_name: &str,
    ) -> StoreResult<Option<DbProgress>> {
        sqlx::query_as::<_, DbProgress>(
            "SELECT user_id, form_name, pdf_data, updated_at FROM onboarding_progress \
             WHERE user_id = $1 AND form_name = $2",
        )
        .bind(user_id)
        .bind(form_name)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Default)]
struct MemoryTables {
    users: HashMap<String, DbUser>,
    profiles: HashMap<String, String>,
    user_pdfs: HashMap<String, DbUserPdf>,
    progress: HashMap<(String, String), DbProgress>,
}

/// Process-local store used when no database is configured
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn insert_user(&self, user: DbUser) {
        self.tables.write().await.users.insert(user.id.clone(), user);
    }

    #[cfg(test)]
    pub async fn set_profile_name(&self, user_id: &str, full_name: &str) {
        self.tables
            .write()
            .await
            .profiles
            .insert(user_id.to_string(), full_name.to_string());
    }
}

#[async_trait]
impl OnboardStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> StoreResult<Option<DbUser>> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn profile_name(&self, user_id: &str) -> StoreResult<Option<String>> {
        Ok(self.tables.read().await.profiles.get(user_id).cloned())
    }

    async fn find_user_pdf(&self, user_id: &str) -> StoreResult<Option<DbUserPdf>> {
        Ok(self.tables.read().await.user_pdfs.get(user_id).cloned())
    }

    async fn upsert_user_pdf(&self, upsert: UserPdfUpsert) -> StoreResult<DbUserPdf> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let row = tables
            .user_pdfs
            .entry(upsert.user_id.clone())
            .or_insert_with(|| DbUserPdf {
                user_id: upsert.user_id.clone(),
                pdf_data: None,
                waiver_pdf_data: None,
                disclosure_pdf_data: None,
                addon_pdf_data: None,
                signature: None,
                signature_type: None,
                created_at: now,
                updated_at: now,
            });

        fn keep_or_replace<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        keep_or_replace(&mut row.pdf_data, upsert.pdf_data);
        keep_or_replace(&mut row.waiver_pdf_data, upsert.waiver_pdf_data);
        keep_or_replace(&mut row.disclosure_pdf_data, upsert.disclosure_pdf_data);
        keep_or_replace(&mut row.addon_pdf_data, upsert.addon_pdf_data);
        // Signature and its type tag are replaced together
        if upsert.signature.is_some() {
            row.signature = upsert.signature;
            row.signature_type = upsert.signature_type;
        }
        row.updated_at = now;

        Ok(row.clone())
    }

    async fn upsert_progress(
        &self,
        user_id: &str,
        form_name: &str,
        pdf_data: Vec<u8>,
    ) -> StoreResult<DbProgress> {
        let row = DbProgress {
            user_id: user_id.to_string(),
            form_name: form_name.to_string(),
            pdf_data,
            updated_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .progress
            .insert((user_id.to_string(), form_name.to_string()), row.clone());
        Ok(row)
    }

    async fn find_progress(
        &self,
        user_id: &str,
        form_name: &str,
    ) -> StoreResult<Option<DbProgress>> {
        let key = (user_id.to_string(), form_name.to_string());
        Ok(self.tables.read().await.progress.get(&key).cloned())
    }
}
