// src/db/crm_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, Sqlite};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::crm::{Customer, CustomerFilter, CustomerStatus, StatusHistoryEntry},
};

macro_rules! customer_columns {
    () => {
        "id, name, source_channel, city, age_band, education, children_count, \
         children_education, asset_tier, occupation, job_title, core_needs, \
         target_countries, timeline, notes, birthday, next_follow_up, related_contacts, \
         kyc_data, form_version, status, status_changed_at, created_at, updated_at"
    };
}

#[derive(Clone, Default)]
pub struct CrmRepository;

impl CrmRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  CLIENTES
    // =========================================================================

    pub async fn insert_customer<'e, E>(
        &self,
        executor: E,
        customer: &Customer,
    ) -> Result<Customer, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let saved = sqlx::query_as::<_, Customer>(concat!(
            "INSERT INTO customers (",
            customer_columns!(),
            ") VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, \
             ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24) RETURNING ",
            customer_columns!()
        ))
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.source_channel)
        .bind(&customer.city)
        .bind(&customer.age_band)
        .bind(&customer.education)
        .bind(customer.children_count)
        .bind(&customer.children_education)
        .bind(&customer.asset_tier)
        .bind(&customer.occupation)
        .bind(&customer.job_title)
        .bind(&customer.core_needs)
        .bind(&customer.target_countries)
        .bind(&customer.timeline)
        .bind(&customer.notes)
        .bind(customer.birthday)
        .bind(customer.next_follow_up)
        .bind(&customer.related_contacts)
        .bind(&customer.kyc_data)
        .bind(&customer.form_version)
        .bind(customer.status)
        .bind(customer.status_changed_at)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .fetch_one(executor)
        .await?;

        Ok(saved)
    }

    /// Regrava os campos de perfil. Status tem caminho próprio (`update_status`).
    pub async fn update_customer<'e, E>(
        &self,
        executor: E,
        customer: &Customer,
    ) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let saved = sqlx::query_as::<_, Customer>(concat!(
            "UPDATE customers SET \
                name = ?2, source_channel = ?3, city = ?4, age_band = ?5, education = ?6, \
                children_count = ?7, children_education = ?8, asset_tier = ?9, \
                occupation = ?10, job_title = ?11, core_needs = ?12, target_countries = ?13, \
                timeline = ?14, notes = ?15, birthday = ?16, next_follow_up = ?17, \
                related_contacts = ?18, kyc_data = ?19, form_version = ?20, updated_at = ?21 \
             WHERE id = ?1 RETURNING ",
            customer_columns!()
        ))
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.source_channel)
        .bind(&customer.city)
        .bind(&customer.age_band)
        .bind(&customer.education)
        .bind(customer.children_count)
        .bind(&customer.children_education)
        .bind(&customer.asset_tier)
        .bind(&customer.occupation)
        .bind(&customer.job_title)
        .bind(&customer.core_needs)
        .bind(&customer.target_countries)
        .bind(&customer.timeline)
        .bind(&customer.notes)
        .bind(customer.birthday)
        .bind(customer.next_follow_up)
        .bind(&customer.related_contacts)
        .bind(&customer.kyc_data)
        .bind(&customer.form_version)
        .bind(customer.updated_at)
        .fetch_optional(executor)
        .await?;

        Ok(saved)
    }

    pub async fn update_birthday<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        birthday: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let saved = sqlx::query_as::<_, Customer>(concat!(
            "UPDATE customers SET birthday = ?2, updated_at = ?3 WHERE id = ?1 RETURNING ",
            customer_columns!()
        ))
        .bind(id)
        .bind(birthday)
        .bind(now)
        .fetch_optional(executor)
        .await?;

        Ok(saved)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: CustomerStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let saved = sqlx::query_as::<_, Customer>(concat!(
            "UPDATE customers SET status = ?2, status_changed_at = ?3, updated_at = ?3 \
             WHERE id = ?1 RETURNING ",
            customer_columns!()
        ))
        .bind(id)
        .bind(status)
        .bind(now)
        .fetch_optional(executor)
        .await?;

        Ok(saved)
    }

    pub async fn find_customer<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let customer = sqlx::query_as::<_, Customer>(concat!(
            "SELECT ",
            customer_columns!(),
            " FROM customers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(customer)
    }

    /// Lista paginada, mais recentes primeiro, com filtro opcional de status.
    pub async fn list_customers<'e, E>(
        &self,
        executor: E,
        filter: &CustomerFilter,
    ) -> Result<Vec<Customer>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let customers = sqlx::query_as::<_, Customer>(concat!(
            "SELECT ",
            customer_columns!(),
            " FROM customers \
             WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(executor)
        .await?;

        Ok(customers)
    }

    pub async fn count_customers<'e, E>(
        &self,
        executor: E,
        status: Option<CustomerStatus>,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE (?1 IS NULL OR status = ?1)")
                .bind(status)
                .fetch_one(executor)
                .await?;

        Ok(total)
    }

    /// Todos os clientes, para o cálculo de lembretes.
    pub async fn all_customers<'e, E>(&self, executor: E) -> Result<Vec<Customer>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let customers = sqlx::query_as::<_, Customer>(concat!(
            "SELECT ",
            customer_columns!(),
            " FROM customers ORDER BY created_at ASC"
        ))
        .fetch_all(executor)
        .await?;

        Ok(customers)
    }

    pub async fn count_by_status<'e, E>(
        &self,
        executor: E,
    ) -> Result<Vec<(CustomerStatus, i64)>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, (CustomerStatus, i64)>(
            "SELECT status, COUNT(*) FROM customers GROUP BY status",
        )
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    //  HISTÓRICO DE STATUS (somente inserção)
    // =========================================================================

    pub async fn insert_status_history<'e, E>(
        &self,
        executor: E,
        entry: &StatusHistoryEntry,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO customer_status_history (id, customer_id, from_status, to_status, source, changed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.customer_id)
        .bind(entry.from_status)
        .bind(entry.to_status)
        .bind(entry.source)
        .bind(entry.changed_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn list_status_history<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
    ) -> Result<Vec<StatusHistoryEntry>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let entries = sqlx::query_as::<_, StatusHistoryEntry>(
            r#"
            SELECT id, customer_id, from_status, to_status, source, changed_at
            FROM customer_status_history
            WHERE customer_id = ?1
            ORDER BY changed_at ASC, rowid ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }
}
