//! Google Sheets export guide.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;

use crate::middleware::RequireShop;

/// Column headers the Apps Script appends rows under.
pub const SHEET_HEADERS: &str =
    "Timestamp,Order ID,Customer Name,Phone,Address,City,Country,Products,Total Amount";

/// Apps Script web app that receives the order webhook.
pub const APPS_SCRIPT: &str = r"function doPost(e) {
  try {
    var sheet = SpreadsheetApp.getActiveSpreadsheet().getActiveSheet();
    var data = JSON.parse(e.postData.contents);
    var timestamp = new Date();
    var orderId = data.orderId || 'N/A';
    var customerName = data.customer.name;
    var phone = data.customer.phone;
    var address = data.customer.address;
    var city = data.customer.city;
    var country = data.customer.country;
    var products = data.products.join('\n');
    var totalAmount = data.total;
    sheet.appendRow([timestamp, orderId, customerName, phone, address, city, country, products, totalAmount]);
    return ContentService.createTextOutput(JSON.stringify({ status: 'success' }))
      .setMimeType(ContentService.MimeType.JSON);
  } catch (error) {
    return ContentService.createTextOutput(JSON.stringify({ status: 'error', message: error.toString() }))
      .setMimeType(ContentService.MimeType.JSON);
  }
}";

#[derive(Template, WebTemplate)]
#[template(path = "admin/gsheets_guide.html")]
pub struct GsheetsGuideTemplate {
    pub shop: String,
    pub current_path: &'static str,
    pub headers: &'static str,
    pub script: &'static str,
}

pub async fn index(RequireShop(current): RequireShop) -> impl IntoResponse {
    GsheetsGuideTemplate {
        shop: current.shop.to_string(),
        current_path: "/app/gsheets-guide",
        headers: SHEET_HEADERS,
        script: APPS_SCRIPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_reads_webhook_fields() {
        for field in ["data.orderId", "data.customer.phone", "data.products", "data.total"] {
            assert!(APPS_SCRIPT.contains(field), "missing {field}");
        }
        assert_eq!(SHEET_HEADERS.split(',').count(), 9);
    }
}
