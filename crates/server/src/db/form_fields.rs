//! Custom checkout form field repository.

use cod_form_core::{FieldType, FormFieldId, ShopDomain};
use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;

/// A merchant-defined form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: FormFieldId,
    pub field_type: FieldType,
    pub name: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub is_required: bool,
    pub sort_order: i32,
}

/// Fields accepted by the form builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFieldInput {
    pub field_type: FieldType,
    pub name: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub is_required: bool,
    pub sort_order: i32,
}

/// Repository for form field operations.
pub struct FormFieldRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FormFieldRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All fields for a shop in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, shop: &ShopDomain) -> Result<Vec<FormField>, RepositoryError> {
        let rows = sqlx::query_as::<_, FormField>(
            r"
            SELECT id, field_type, name, label, placeholder, is_required, sort_order
            FROM form_fields
            WHERE shop = $1
            ORDER BY sort_order, id
            ",
        )
        .bind(shop)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        shop: &ShopDomain,
        input: &FormFieldInput,
    ) -> Result<FormFieldId, RepositoryError> {
        let id = sqlx::query_scalar::<_, FormFieldId>(
            r"
            INSERT INTO form_fields (shop, field_type, name, label, placeholder, is_required, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(shop)
        .bind(input.field_type)
        .bind(&input.name)
        .bind(&input.label)
        .bind(&input.placeholder)
        .bind(input.is_required)
        .bind(input.sort_order)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Update a field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the field does not belong to
    /// this shop, or `RepositoryError::Database` if the query fails.
    pub async fn update(
        &self,
        shop: &ShopDomain,
        id: FormFieldId,
        input: &FormFieldInput,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE form_fields SET
                field_type = $3,
                name = $4,
                label = $5,
                placeholder = $6,
                is_required = $7,
                sort_order = $8
            WHERE shop = $1 AND id = $2
            ",
        )
        .bind(shop)
        .bind(id)
        .bind(input.field_type)
        .bind(&input.name)
        .bind(&input.label)
        .bind(&input.placeholder)
        .bind(input.is_required)
        .bind(input.sort_order)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a field. Returns `false` if it did not exist for this shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, shop: &ShopDomain, id: FormFieldId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM form_fields WHERE shop = $1 AND id = $2")
            .bind(shop)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
