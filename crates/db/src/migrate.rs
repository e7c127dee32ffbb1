use anyhow::Context;

use crate::Database;

const LEDGER_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
        PRIMARY KEY (module, id)
    );
"#;

/// Migration definition contributed by a module.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

impl Database {
    /// Apply every migration not yet recorded in `schema_migrations`.
    ///
    /// Migrations run in the order given, each inside its own transaction.
    /// Returns how many were applied.
    pub async fn apply_migrations(
        &self,
        migrations: &[(String, Migration)],
    ) -> anyhow::Result<usize> {
        sqlx::raw_sql(LEDGER_DDL)
            .execute(self.pool())
            .await
            .context("failed to create migration ledger")?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let seen: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM schema_migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(self.pool())
                    .await
                    .context("failed to read migration ledger")?;
            if seen.is_some() {
                tracing::debug!(target: "shelf-db", %module, id = migration.id, "migration already applied");
                continue;
            }

            let mut tx = self.pool().begin().await?;
            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {module}/{} failed", migration.id))?;
            sqlx::query("INSERT INTO schema_migrations (module, id) VALUES (?, ?)")
                .bind(module)
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            tracing::info!(target: "shelf-db", %module, id = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }
}
