use crate::db::models::{Contact, ContactInput, UserId};
use crate::db::sqlite::{Storage, contains_pattern};
use crate::error::AppError;
use crate::types::ContactType;
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFilter {
    #[serde(rename = "type")]
    pub contact_type: Option<ContactType>,
    /// Substring match on names, company, email and phone.
    pub q: Option<String>,
}

pub(crate) async fn insert_contact_row(
    conn: &mut SqliteConnection,
    user_id: UserId,
    c: &ContactInput,
) -> Result<i64, AppError> {
    let now = Utc::now();
    let id = sqlx::query(
        r#"INSERT INTO contacts (
            user_id, first_name, last_name, company, email, phone, contact_type,
            address_line1, address_line2, city, state, postal_code, country, notes,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(user_id)
    .bind(&c.first_name)
    .bind(&c.last_name)
    .bind(&c.company)
    .bind(&c.email)
    .bind(&c.phone)
    .bind(c.contact_type.unwrap_or(ContactType::Customer))
    .bind(&c.address_line1)
    .bind(&c.address_line2)
    .bind(&c.city)
    .bind(&c.state)
    .bind(&c.postal_code)
    .bind(&c.country)
    .bind(&c.notes)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

impl Storage {
    pub async fn insert_contact(
        &self,
        user_id: UserId,
        input: &ContactInput,
    ) -> Result<Contact, AppError> {
        let mut conn = self.pool().acquire().await?;
        let id = insert_contact_row(&mut *conn, user_id, input).await?;
        drop(conn);
        self.get_contact(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Contact"))
    }

    pub async fn insert_contacts(
        &self,
        user_id: UserId,
        inputs: &[ContactInput],
    ) -> Result<Vec<i64>, AppError> {
        let mut tx = self.pool().begin().await?;
        let mut ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            ids.push(insert_contact_row(&mut *tx, user_id, input).await?);
        }
        tx.commit().await?;
        Ok(ids)
    }

    pub async fn get_contact(&self, user_id: UserId, id: i64) -> Result<Option<Contact>, AppError> {
        let contact =
            sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(contact)
    }

    pub async fn contact_exists(&self, user_id: UserId, id: i64) -> Result<bool, AppError> {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM contacts WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(found.is_some())
    }

    pub async fn list_contacts(
        &self,
        user_id: UserId,
        filter: &ContactFilter,
    ) -> Result<Vec<Contact>, AppError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM contacts WHERE user_id = ");
        qb.push_bind(user_id);
        if let Some(kind) = filter.contact_type {
            qb.push(" AND contact_type = ").push_bind(kind);
        }
        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = contains_pattern(q);
            qb.push(" AND (");
            let mut sep = qb.separated(" OR ");
            for col in ["first_name", "last_name", "company", "email", "phone"] {
                sep.push(format!("{col} LIKE "));
                sep.push_bind_unseparated(pattern.clone());
                sep.push_unseparated(r" ESCAPE '\'");
            }
            qb.push(")");
        }
        qb.push(" ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE, id");
        let contacts = qb.build_query_as::<Contact>().fetch_all(self.pool()).await?;
        Ok(contacts)
    }

    pub async fn update_contact(
        &self,
        user_id: UserId,
        id: i64,
        c: &ContactInput,
    ) -> Result<bool, AppError> {
        let res = sqlx::query(
            r#"UPDATE contacts SET
                first_name = ?, last_name = ?, company = ?, email = ?, phone = ?,
                contact_type = COALESCE(?, contact_type), address_line1 = ?, address_line2 = ?,
                city = ?, state = ?, postal_code = ?, country = ?, notes = ?, updated_at = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(&c.first_name)
        .bind(&c.last_name)
        .bind(&c.company)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(c.contact_type)
        .bind(&c.address_line1)
        .bind(&c.address_line2)
        .bind(&c.city)
        .bind(&c.state)
        .bind(&c.postal_code)
        .bind(&c.country)
        .bind(&c.notes)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete_contact(&self, user_id: UserId, id: i64) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM contacts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn set_contact_stripe_customer(
        &self,
        id: i64,
        customer_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE contacts SET stripe_customer_id = ?, updated_at = ? WHERE id = ?")
            .bind(customer_id)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn set_contact_square_customer(
        &self,
        id: i64,
        customer_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE contacts SET square_customer_id = ?, updated_at = ? WHERE id = ?")
            .bind(customer_id)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
