//! Form designer: checkout form text and colors.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use super::{NoticeQuery, redirect_error, redirect_success, text};
use crate::db::{FormDesign, SettingsRepository};
use crate::error::AppError;
use crate::middleware::RequireShop;
use crate::state::AppState;

const PATH: &str = "/app/form-designer";

#[derive(Template, WebTemplate)]
#[template(path = "admin/form_designer.html")]
pub struct FormDesignerTemplate {
    pub shop: String,
    pub current_path: &'static str,
    pub notice: NoticeQuery,
    pub design: FormDesign,
}

#[derive(Debug, Default, Deserialize)]
pub struct DesignForm {
    pub form_title: Option<String>,
    pub form_subtitle: Option<String>,
    pub button_text: Option<String>,
    pub form_bg_color: Option<String>,
    pub form_text_color: Option<String>,
    pub form_label_color: Option<String>,
    pub button_color: Option<String>,
    pub button_text_color: Option<String>,
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl DesignForm {
    /// Blank fields fall back to the defaults.
    fn to_design(&self) -> Result<FormDesign, &'static str> {
        let defaults = FormDesign::default();
        let or = |value: &Option<String>, fallback: String| text(value.as_deref()).unwrap_or(fallback);

        let design = FormDesign {
            form_title: or(&self.form_title, defaults.form_title),
            form_subtitle: or(&self.form_subtitle, defaults.form_subtitle),
            button_text: or(&self.button_text, defaults.button_text),
            form_bg_color: or(&self.form_bg_color, defaults.form_bg_color),
            form_text_color: or(&self.form_text_color, defaults.form_text_color),
            form_label_color: or(&self.form_label_color, defaults.form_label_color),
            button_color: or(&self.button_color, defaults.button_color),
            button_text_color: or(&self.button_text_color, defaults.button_text_color),
        };

        let colors = [
            &design.form_bg_color,
            &design.form_text_color,
            &design.form_label_color,
            &design.button_color,
            &design.button_text_color,
        ];
        if !colors.iter().all(|c| is_hex_color(c)) {
            return Err("Colors must be #RRGGBB values.");
        }
        Ok(design)
    }
}

#[instrument(skip_all, fields(shop = %current.shop))]
pub async fn index(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Query(notice): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let design = SettingsRepository::new(state.pool())
        .get_or_default(&current.shop)
        .await?
        .design;

    Ok(FormDesignerTemplate {
        shop: current.shop.to_string(),
        current_path: PATH,
        notice,
        design,
    })
}

#[instrument(skip_all, fields(shop = %current.shop))]
pub async fn update(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Form(form): Form<DesignForm>,
) -> Result<Redirect, AppError> {
    let design = match form.to_design() {
        Ok(design) => design,
        Err(message) => return Ok(redirect_error(PATH, message)),
    };

    SettingsRepository::new(state.pool())
        .save_design(&current.shop, &design)
        .await?;
    Ok(redirect_success(PATH, "Design saved."))
}
