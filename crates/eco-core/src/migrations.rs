use anyhow::Result;
use sqlx::{migrate::Migrator, Pool, Sqlite};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run(pool: &Pool<Sqlite>) -> Result<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn run_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("eco.db").display());
        let pool = crate::db::connect(&url).await.unwrap();

        run(&pool).await.unwrap();
        run(&pool).await.unwrap();

        sqlx::query("SELECT id FROM impact")
            .fetch_all(&pool)
            .await
            .unwrap();
    }
}
