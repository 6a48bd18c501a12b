// src/db/invite_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};
use uuid::Uuid;

use crate::{common::error::AppError, models::invite::FormInvite};

#[derive(Clone, Default)]
pub struct InviteRepository;

impl InviteRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert_invite<'e, E>(&self, executor: E, invite: &FormInvite) -> Result<FormInvite, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let saved = sqlx::query_as::<_, FormInvite>(
            r#"
            INSERT INTO form_invites (id, customer_id, token, expires_at, is_active, used_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id, customer_id, token, expires_at, is_active, used_at, created_at
            "#,
        )
        .bind(invite.id)
        .bind(invite.customer_id)
        .bind(&invite.token)
        .bind(invite.expires_at)
        .bind(invite.is_active)
        .bind(invite.used_at)
        .bind(invite.created_at)
        .fetch_one(executor)
        .await?;

        Ok(saved)
    }

    pub async fn find_by_token<'e, E>(&self, executor: E, token: &str) -> Result<Option<FormInvite>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let invite = sqlx::query_as::<_, FormInvite>(
            r#"
            SELECT id, customer_id, token, expires_at, is_active, used_at, created_at
            FROM form_invites
            WHERE token = ?1
            "#,
        )
        .bind(token)
        .fetch_optional(executor)
        .await?;

        Ok(invite)
    }

    /// Mais recentes primeiro.
    pub async fn list_for_customer<'e, E>(&self, executor: E, customer_id: Uuid) -> Result<Vec<FormInvite>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let invites = sqlx::query_as::<_, FormInvite>(
            r#"
            SELECT id, customer_id, token, expires_at, is_active, used_at, created_at
            FROM form_invites
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;

        Ok(invites)
    }

    pub async fn deactivate<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<FormInvite>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let invite = sqlx::query_as::<_, FormInvite>(
            r#"
            UPDATE form_invites SET is_active = 0
            WHERE id = ?1
            RETURNING id, customer_id, token, expires_at, is_active, used_at, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(invite)
    }

    /// Marca como usado só se ainda estiver aberto. `false` = outro pedido chegou antes.
    pub async fn mark_used<'e, E>(&self, executor: E, id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE form_invites SET used_at = ?2
            WHERE id = ?1 AND used_at IS NULL AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
