//! GraphQL operations used against the Shopify Admin API.
//!
//! Each operation follows the layout `graphql_client` generates: a marker
//! type implementing [`GraphQLQuery`] and a module holding the query text,
//! `Variables` and `ResponseData`.

use graphql_client::{GraphQLQuery, QueryBody};

// =============================================================================
// Draft orders
// =============================================================================

pub struct DraftOrderCreate;

pub mod draft_order_create {
    use serde::{Deserialize, Serialize};

    use crate::shopify::types::{DraftOrderInput, DraftOrderRef, UserError};

    pub const OPERATION_NAME: &str = "DraftOrderCreate";
    pub const QUERY: &str = r"
mutation DraftOrderCreate($input: DraftOrderInput!) {
  draftOrderCreate(input: $input) {
    draftOrder {
      id
    }
    userErrors {
      field
      message
    }
  }
}
";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub input: DraftOrderInput,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub draft_order_create: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub draft_order: Option<DraftOrderRef>,
        #[serde(default)]
        pub user_errors: Vec<UserError>,
    }
}

impl GraphQLQuery for DraftOrderCreate {
    type Variables = draft_order_create::Variables;
    type ResponseData = draft_order_create::ResponseData;

    fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
        QueryBody {
            variables,
            query: draft_order_create::QUERY,
            operation_name: draft_order_create::OPERATION_NAME,
        }
    }
}

pub struct DraftOrderComplete;

pub mod draft_order_complete {
    use serde::{Deserialize, Serialize};

    use crate::shopify::types::{CompletedOrder, UserError};

    pub const OPERATION_NAME: &str = "DraftOrderComplete";
    pub const QUERY: &str = r"
mutation DraftOrderComplete($id: ID!, $paymentPending: Boolean) {
  draftOrderComplete(id: $id, paymentPending: $paymentPending) {
    draftOrder {
      order {
        id
        legacyResourceId
      }
    }
    userErrors {
      field
      message
    }
  }
}
";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub id: String,
        pub payment_pending: bool,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub draft_order_complete: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub draft_order: Option<CompletedDraft>,
        #[serde(default)]
        pub user_errors: Vec<UserError>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CompletedDraft {
        pub order: Option<CompletedOrder>,
    }
}

impl GraphQLQuery for DraftOrderComplete {
    type Variables = draft_order_complete::Variables;
    type ResponseData = draft_order_complete::ResponseData;

    fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
        QueryBody {
            variables,
            query: draft_order_complete::QUERY,
            operation_name: draft_order_complete::OPERATION_NAME,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_body_envelope() {
        let body = DraftOrderComplete::build_query(draft_order_complete::Variables {
            id: "gid://shopify/DraftOrder/1".to_string(),
            payment_pending: true,
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["operationName"], "DraftOrderComplete");
        assert_eq!(json["variables"]["paymentPending"], true);
        assert!(json["query"].as_str().unwrap().contains("legacyResourceId"));
    }

    #[test]
    fn test_create_response_parses_user_errors() {
        let data: draft_order_create::ResponseData = serde_json::from_value(serde_json::json!({
            "draftOrderCreate": {
                "draftOrder": null,
                "userErrors": [{"field": ["lineItems"], "message": "Variant not found"}]
            }
        }))
        .unwrap();
        let payload = data.draft_order_create.unwrap();
        assert!(payload.draft_order.is_none());
        assert_eq!(payload.user_errors[0].message, "Variant not found");
    }
}
