//! Admin API input and result types for draft orders.

use serde::{Deserialize, Serialize};

/// A field-level error from a mutation's `userErrors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    pub field: Option<Vec<String>>,
    pub message: String,
}

/// Join user error messages the way they are shown to customers.
#[must_use]
pub fn join_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build a global ID from a numeric resource id.
///
/// Values that are already global IDs are returned unchanged.
#[must_use]
pub fn to_gid(resource: &str, id: &str) -> String {
    if id.starts_with("gid://") {
        id.to_string()
    } else {
        format!("gid://shopify/{resource}/{id}")
    }
}

/// `DraftOrderInput`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftOrderInput {
    pub line_items: Vec<DraftOrderLineItemInput>,
    pub shipping_line: ShippingLineInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_discount: Option<AppliedDiscountInput>,
    pub email: String,
    pub phone: Option<String>,
    pub shipping_address: MailingAddressInput,
    pub tags: Vec<String>,
    pub custom_attributes: Vec<AttributeInput>,
    pub presentment_currency_code: String,
}

/// `DraftOrderLineItemInput`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftOrderLineItemInput {
    pub variant_id: String,
    pub quantity: u32,
}

/// `MoneyInput`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyInput {
    pub amount: String,
    pub currency_code: String,
}

/// `ShippingLineInput`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingLineInput {
    pub title: String,
    pub price_with_currency: MoneyInput,
}

/// `DraftOrderAppliedDiscountType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppliedDiscountType {
    FixedAmount,
    Percentage,
}

/// `DraftOrderAppliedDiscountInput`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscountInput {
    pub title: String,
    pub value: f64,
    pub value_type: AppliedDiscountType,
    pub amount_with_currency: MoneyInput,
}

/// `MailingAddressInput`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailingAddressInput {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub city: String,
    pub province: Option<String>,
    pub country: String,
    pub phone: String,
}

/// `AttributeInput`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeInput {
    pub key: String,
    pub value: String,
}

/// A created draft order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftOrderRef {
    pub id: String,
}

/// The order a completed draft turned into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedOrder {
    pub id: String,
    pub legacy_resource_id: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_gid() {
        assert_eq!(to_gid("ProductVariant", "42"), "gid://shopify/ProductVariant/42");
        assert_eq!(
            to_gid("ProductVariant", "gid://shopify/ProductVariant/42"),
            "gid://shopify/ProductVariant/42"
        );
    }

    #[test]
    fn test_join_user_errors() {
        let errors = vec![
            UserError {
                field: None,
                message: "a".to_string(),
            },
            UserError {
                field: None,
                message: "b".to_string(),
            },
        ];
        assert_eq!(join_user_errors(&errors), "a, b");
        assert_eq!(join_user_errors(&[]), "");
    }

    #[test]
    fn test_discount_type_wire_name() {
        let json = serde_json::to_string(&AppliedDiscountType::FixedAmount).unwrap();
        assert_eq!(json, "\"FIXED_AMOUNT\"");
    }
}
