//! Form builder: merchant-defined checkout fields.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use cod_form_core::{FieldType, FormFieldId};
use serde::Deserialize;
use tracing::instrument;

use super::{NoticeQuery, checkbox, parse_i32, redirect_error, redirect_success, text};
use crate::db::{FormField, FormFieldInput, FormFieldRepository, RepositoryError};
use crate::error::AppError;
use crate::middleware::RequireShop;
use crate::state::AppState;

const PATH: &str = "/app/form-builder";

#[derive(Template, WebTemplate)]
#[template(path = "admin/form_builder.html")]
pub struct FormBuilderTemplate {
    pub shop: String,
    pub current_path: &'static str,
    pub notice: NoticeQuery,
    pub fields: Vec<FormField>,
    pub field_types: [FieldType; 4],
}

/// Form builder form. `_action` is `save_field` or `delete_field`; a
/// `save_field` with an `id` updates that field.
#[derive(Debug, Default, Deserialize)]
pub struct FieldForm {
    #[serde(rename = "_action")]
    pub action: String,
    pub id: Option<String>,
    pub field_type: Option<String>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub is_required: Option<String>,
    pub sort_order: Option<String>,
}

impl FieldForm {
    fn to_input(&self) -> Result<FormFieldInput, &'static str> {
        let field_type = self
            .field_type
            .as_deref()
            .unwrap_or_default()
            .parse::<FieldType>()
            .map_err(|_| "Unknown field type.")?;
        let name = text(self.name.as_deref()).ok_or("Field name is required.")?;
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err("Field name may only contain letters, digits, '_' and '-'.");
        }
        let label = text(self.label.as_deref()).ok_or("Field label is required.")?;

        Ok(FormFieldInput {
            field_type,
            name,
            label,
            placeholder: text(self.placeholder.as_deref()),
            is_required: checkbox(self.is_required.as_deref()),
            sort_order: parse_i32(self.sort_order.as_deref()).unwrap_or(0),
        })
    }
}

#[instrument(skip_all, fields(shop = %current.shop))]
pub async fn index(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Query(notice): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let fields = FormFieldRepository::new(state.pool())
        .list(&current.shop)
        .await?;

    Ok(FormBuilderTemplate {
        shop: current.shop.to_string(),
        current_path: PATH,
        notice,
        fields,
        field_types: FieldType::ALL,
    })
}

#[instrument(skip_all, fields(shop = %current.shop, action = %form.action))]
pub async fn action(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Form(form): Form<FieldForm>,
) -> Result<Redirect, AppError> {
    let repo = FormFieldRepository::new(state.pool());

    match form.action.as_str() {
        "save_field" => {
            let input = match form.to_input() {
                Ok(input) => input,
                Err(message) => return Ok(redirect_error(PATH, message)),
            };
            match parse_i32(form.id.as_deref()) {
                Some(id) => match repo.update(&current.shop, FormFieldId::new(id), &input).await {
                    Ok(()) => {}
                    Err(RepositoryError::NotFound) => {
                        return Err(AppError::NotFound(format!("form field {id}")));
                    }
                    Err(e) => return Err(e.into()),
                },
                None => {
                    repo.create(&current.shop, &input).await?;
                }
            }
            Ok(redirect_success(PATH, "Field saved."))
        }
        "delete_field" => {
            let Some(id) = parse_i32(form.id.as_deref()) else {
                return Err(AppError::BadRequest("Missing field id".to_string()));
            };
            if !repo.delete(&current.shop, FormFieldId::new(id)).await? {
                return Err(AppError::NotFound(format!("form field {id}")));
            }
            Ok(redirect_success(PATH, "Field deleted."))
        }
        other => Err(AppError::BadRequest(format!("Unknown action: {other}"))),
    }
}
