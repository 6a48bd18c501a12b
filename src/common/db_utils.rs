use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::common::error::AppError;

// ---
// Conexão com o banco local (SQLite)
// ---
/// Abre a pool, criando o arquivo (e a pasta) se ainda não existirem.
pub async fn connect_pool(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("DATABASE_URL inválida: {database_url}"))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    // Garante a pasta do arquivo (ex: ./data/crm.db)
    if let Some(parent) = database_file(database_url)
        .as_deref()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
    {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("falha ao criar a pasta do banco em {:?}", parent))?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
        .context("falha ao conectar ao banco SQLite")?;

    Ok(pool)
}

/// Caminho do arquivo a partir da URL (`sqlite://data/crm.db?mode=rwc` -> `data/crm.db`).
fn database_file(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!().run(pool).await?;
    Ok(())
}

/// Pool migrada num arquivo novo dentro de `dir`. Usado pelos testes.
pub async fn connect_fresh(dir: &Path) -> anyhow::Result<SqlitePool> {
    let url = format!("sqlite://{}", dir.join("crm-test.db").display());
    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
