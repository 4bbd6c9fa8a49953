//! Providers, installations, users, repos.

use rusqlite::{OptionalExtension, params};

use crate::errors::{StoreError, StoreResult};
use crate::models::Repo;
use crate::Store;

/// Upsert shape for a repo row.
#[derive(Debug, Clone)]
pub struct RepoUpsert {
    pub provider_id: i64,
    pub external_id: String,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
}

impl Store {
    pub fn upsert_provider(&self, kind: &str, base_url: &str) -> StoreResult<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO providers (kind, base_url) VALUES (?1, ?2)
             ON CONFLICT (kind, base_url) DO NOTHING",
            params![kind, base_url],
        )?;
        let id = conn.query_row(
            "SELECT id FROM providers WHERE kind = ?1 AND base_url = ?2",
            params![kind, base_url],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn upsert_installation(&self, provider_id: i64, external_id: &str) -> StoreResult<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO installations (provider_id, external_id) VALUES (?1, ?2)
             ON CONFLICT (provider_id, external_id) DO NOTHING",
            params![provider_id, external_id],
        )?;
        let id = conn.query_row(
            "SELECT id FROM installations WHERE provider_id = ?1 AND external_id = ?2",
            params![provider_id, external_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn upsert_user(&self, provider_id: i64, external_id: &str, login: &str) -> StoreResult<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO users (provider_id, external_id, login) VALUES (?1, ?2, ?3)
             ON CONFLICT (provider_id, external_id) DO UPDATE SET login = excluded.login",
            params![provider_id, external_id, login],
        )?;
        let id = conn.query_row(
            "SELECT id FROM users WHERE provider_id = ?1 AND external_id = ?2",
            params![provider_id, external_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn upsert_repo(&self, up: &RepoUpsert) -> StoreResult<Repo> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO repos (provider_id, external_id, owner, name, full_name, default_branch)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (provider_id, external_id) DO UPDATE SET
                owner = excluded.owner,
                name = excluded.name,
                full_name = excluded.full_name,
                default_branch = excluded.default_branch",
            params![
                up.provider_id,
                up.external_id,
                up.owner,
                up.name,
                up.full_name,
                up.default_branch
            ],
        )?;
        let repo = conn.query_row(
            "SELECT id, provider_id, external_id, owner, name, full_name, default_branch
             FROM repos WHERE provider_id = ?1 AND external_id = ?2",
            params![up.provider_id, up.external_id],
            map_repo,
        )?;
        Ok(repo)
    }

    pub fn get_repo(&self, id: i64) -> StoreResult<Repo> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, provider_id, external_id, owner, name, full_name, default_branch
             FROM repos WHERE id = ?1",
            params![id],
            map_repo,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("repo {id}")))
    }

    pub fn link_repo_installation(&self, repo_id: i64, installation_id: i64) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO repo_installations (repo_id, installation_id) VALUES (?1, ?2)
             ON CONFLICT (repo_id, installation_id) DO NOTHING",
            params![repo_id, installation_id],
        )?;
        Ok(())
    }
}

fn map_repo(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repo> {
    Ok(Repo {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        external_id: row.get(2)?,
        owner: row.get(3)?,
        name: row.get(4)?,
        full_name: row.get(5)?,
        default_branch: row.get(6)?,
    })
}
