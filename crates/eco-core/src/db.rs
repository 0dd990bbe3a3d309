use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

pub async fn connect(database_url: &str) -> Result<Pool<Sqlite>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn check_ready(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn connect_creates_database_and_answers_ping() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("eco.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let pool = connect(&url).await.unwrap();
        check_ready(&pool).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn check_ready_fails_on_closed_pool() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("eco.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let pool = connect(&url).await.unwrap();
        pool.close().await;
        assert!(check_ready(&pool).await.is_err());
    }
}
