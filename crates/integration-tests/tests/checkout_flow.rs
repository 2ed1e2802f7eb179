//! Order placement flow against in-memory fakes.
//!
//! Each fake counts its calls so the tests can assert which steps ran and,
//! more importantly, which did not.

#![allow(clippy::unwrap_used)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::http::StatusCode;
use cod_form_core::pricing::{QuantityTier, RateRule};
use cod_form_core::{CurrencyCode, DiscountType, Money, ShopDomain};
use cod_form_integration_tests::SHOP;
use cod_form_server::db::{AppSettings, AttemptOutcome, GeneralSettings, RepositoryError};
use cod_form_server::services::checkout::{
    MSG_INVALID_PRICE, MSG_OTP_INVALID, MSG_OTP_REQUIRED, MSG_RECENT_ORDER, MSG_TOO_MANY_ATTEMPTS,
};
use cod_form_server::services::{
    Checkout, CheckoutError, CheckoutRequest, CheckoutStore, OrderExporter, OrderPlatform,
    OrderWebhookPayload, PhoneVerifier,
};
use cod_form_server::shopify::{
    AdminShopifyError, CompletedOrder, DraftOrderInput, DraftOrderRef, UserError,
};
use cod_form_server::twilio::{TwilioError, VerificationStatus};
use rust_decimal::Decimal;

const CLIENT_IP: &str = "203.0.113.7";

fn pkr(amount: i64) -> Money {
    Money::new(Decimal::new(amount, 0), CurrencyCode::pkr())
}

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeStore {
    general: GeneralSettings,
    blocked: AtomicBool,
    recent_order: bool,
    fail_log_order: bool,
    rules: Vec<RateRule>,
    tiers: Vec<QuantityTier>,
    attempts: AtomicUsize,
    blocks_recorded: AtomicUsize,
    orders_logged: AtomicUsize,
}

#[async_trait]
impl CheckoutStore for FakeStore {
    async fn settings(&self, shop: &ShopDomain) -> Result<AppSettings, RepositoryError> {
        let mut settings = AppSettings::defaults(shop.clone());
        settings.general = self.general.clone();
        Ok(settings)
    }

    async fn is_ip_blocked(&self, _shop: &ShopDomain, _ip: &str) -> Result<bool, RepositoryError> {
        Ok(self.blocked.load(Ordering::SeqCst))
    }

    async fn record_ip_attempt(
        &self,
        _shop: &ShopDomain,
        _ip: &str,
        _window_minutes: i32,
        limit: i32,
    ) -> Result<AttemptOutcome, RepositoryError> {
        let attempts = i64::try_from(self.attempts.fetch_add(1, Ordering::SeqCst) + 1).unwrap();
        let outcome = AttemptOutcome::classify(attempts, limit);
        if outcome.is_blocked() {
            self.blocked.store(true, Ordering::SeqCst);
            self.blocks_recorded.fetch_add(1, Ordering::SeqCst);
        }
        Ok(outcome)
    }

    async fn recent_order_exists(
        &self,
        _shop: &ShopDomain,
        _phone: &str,
        _window_minutes: i32,
    ) -> Result<bool, RepositoryError> {
        Ok(self.recent_order)
    }

    async fn rate_candidates(
        &self,
        _shop: &ShopDomain,
        _country: &str,
        _city: &str,
    ) -> Result<Vec<RateRule>, RepositoryError> {
        Ok(self.rules.clone())
    }

    async fn offers_for(
        &self,
        _shop: &ShopDomain,
        product_ids: &[String],
    ) -> Result<Vec<QuantityTier>, RepositoryError> {
        Ok(self
            .tiers
            .iter()
            .filter(|t| product_ids.contains(&t.product_id))
            .cloned()
            .collect())
    }

    async fn log_order(&self, _shop: &ShopDomain, _phone: &str) -> Result<(), RepositoryError> {
        if self.fail_log_order {
            return Err(RepositoryError::NotFound);
        }
        self.orders_logged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CreateFailure {
    UserErrors,
    Transport,
}

#[derive(Default)]
struct FakePlatform {
    fail_create: Option<CreateFailure>,
    fail_completion: bool,
    completed_without_order: bool,
    drafts: Mutex<Vec<DraftOrderInput>>,
    completions: AtomicUsize,
}

#[async_trait]
impl OrderPlatform for FakePlatform {
    async fn create_draft_order(
        &self,
        input: &DraftOrderInput,
    ) -> Result<DraftOrderRef, AdminShopifyError> {
        match self.fail_create {
            Some(CreateFailure::UserErrors) => {
                return Err(AdminShopifyError::UserErrors(vec![UserError {
                    field: Some(vec!["lineItems".to_string()]),
                    message: "Variant does not exist".to_string(),
                }]));
            }
            Some(CreateFailure::Transport) => {
                // Nothing listens on the discard port.
                let err = reqwest::Client::new()
                    .post("http://127.0.0.1:9/admin/api/graphql.json")
                    .send()
                    .await
                    .unwrap_err();
                return Err(AdminShopifyError::Http(err));
            }
            None => {}
        }
        self.drafts.lock().unwrap().push(input.clone());
        Ok(DraftOrderRef {
            id: "gid://shopify/DraftOrder/1".to_string(),
        })
    }

    async fn complete_draft_order(
        &self,
        _id: &str,
    ) -> Result<Option<CompletedOrder>, AdminShopifyError> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        if self.fail_completion {
            return Err(AdminShopifyError::UserErrors(vec![UserError {
                field: None,
                message: "Variant is out of stock".to_string(),
            }]));
        }
        if self.completed_without_order {
            return Ok(None);
        }
        Ok(Some(CompletedOrder {
            id: "gid://shopify/Order/9".to_string(),
            legacy_resource_id: "9".to_string(),
        }))
    }
}

#[derive(Default)]
struct FakeVerifier {
    checks: AtomicUsize,
}

#[async_trait]
impl PhoneVerifier for FakeVerifier {
    async fn check(
        &self,
        _settings: &GeneralSettings,
        _phone: &str,
        code: &str,
    ) -> Result<VerificationStatus, TwilioError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        match code {
            "123456" => Ok(VerificationStatus::Approved),
            "999999" => Err(TwilioError::NotConfigured),
            _ => Ok(VerificationStatus::Pending),
        }
    }
}

#[derive(Default)]
struct FakeExporter {
    sent: Mutex<Vec<(String, OrderWebhookPayload)>>,
}

impl OrderExporter for FakeExporter {
    fn export(&self, url: &str, payload: OrderWebhookPayload) {
        self.sent.lock().unwrap().push((url.to_string(), payload));
    }
}

struct Harness {
    store: FakeStore,
    platform: FakePlatform,
    verifier: FakeVerifier,
    exporter: FakeExporter,
    fallback: Money,
}

impl Harness {
    fn new(store: FakeStore) -> Self {
        Self {
            store,
            platform: FakePlatform::default(),
            verifier: FakeVerifier::default(),
            exporter: FakeExporter::default(),
            fallback: pkr(250),
        }
    }

    async fn place(
        &self,
        request: CheckoutRequest,
    ) -> Result<cod_form_server::services::PlacedOrder, CheckoutError> {
        self.place_from(request, Some(CLIENT_IP)).await
    }

    async fn place_from(
        &self,
        request: CheckoutRequest,
        client_ip: Option<&str>,
    ) -> Result<cod_form_server::services::PlacedOrder, CheckoutError> {
        let checkout = Checkout {
            store: &self.store,
            platform: &self.platform,
            verifier: &self.verifier,
            exporter: &self.exporter,
            fallback_rate: &self.fallback,
        };
        checkout
            .place_order(&ShopDomain::parse(SHOP).unwrap(), request, client_ip)
            .await
    }

    fn drafts(&self) -> Vec<DraftOrderInput> {
        self.platform.drafts.lock().unwrap().clone()
    }
}

fn request(otp: Option<&str>) -> CheckoutRequest {
    serde_json::from_value(serde_json::json!({
        "cartItems": [
            {"productId": "111", "variantId": "222", "quantity": 5, "price": "100.00", "title": "Kurta"}
        ],
        "customer": {
            "name": "Ali Khan",
            "phone": "0300 1234567",
            "address": "House 1, Street 2"
        },
        "shipping": {"country": "Pakistan", "city": "Lahore"},
        "otp": otp
    }))
    .unwrap()
}

fn lahore_rules() -> Vec<RateRule> {
    vec![
        RateRule {
            country: "Pakistan".to_string(),
            city: "Lahore".to_string(),
            rate: pkr(150),
        },
        RateRule {
            country: "Pakistan".to_string(),
            city: String::new(),
            rate: pkr(200),
        },
    ]
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_places_order_with_city_rate_and_discount() {
    let harness = Harness::new(FakeStore {
        rules: lahore_rules(),
        tiers: vec![QuantityTier {
            product_id: "111".to_string(),
            min_quantity: 3,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::new(10, 0),
        }],
        ..FakeStore::default()
    });

    let placed = harness.place(request(None)).await.unwrap();
    assert!(placed.success);
    assert_eq!(placed.order_id.as_deref(), Some("9"));

    let drafts = harness.drafts();
    assert_eq!(drafts.len(), 1);
    let draft = &drafts[0];
    assert_eq!(draft.shipping_line.price_with_currency.amount, "150.00");
    assert_eq!(
        draft.applied_discount.as_ref().unwrap().amount_with_currency.amount,
        "50.00"
    );
    assert_eq!(draft.phone.as_deref(), Some("+923001234567"));
    assert_eq!(draft.email, "923001234567@example.com");

    // Toggles are off by default: no accounting, no OTP, no export.
    assert_eq!(harness.store.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(harness.store.orders_logged.load(Ordering::SeqCst), 0);
    assert_eq!(harness.verifier.checks.load(Ordering::SeqCst), 0);
    assert!(harness.exporter.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_destination_uses_fallback_rate() {
    let harness = Harness::new(FakeStore::default());
    let mut req = request(None);
    req.shipping.as_mut().unwrap().country = "Oman".to_string();

    harness.place(req).await.unwrap();

    let drafts = harness.drafts();
    assert_eq!(drafts[0].shipping_line.price_with_currency.amount, "250.00");
    assert!(drafts[0].applied_discount.is_none());
}

#[tokio::test]
async fn test_webhook_receives_order_total() {
    let harness = Harness::new(FakeStore {
        general: GeneralSettings {
            webhook_url: Some("https://script.google.com/macros/s/abc/exec".to_string()),
            order_spam_protection_enabled: true,
            ..GeneralSettings::default()
        },
        rules: lahore_rules(),
        ..FakeStore::default()
    });

    harness.place(request(None)).await.unwrap();

    let sent = harness.exporter.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (url, payload) = &sent[0];
    assert!(url.starts_with("https://script.google.com/"));
    assert_eq!(payload.order_id.as_deref(), Some("9"));
    assert_eq!(payload.products, vec!["Kurta x 5".to_string()]);
    // 5 x 100 + 150 shipping
    assert_eq!(payload.total, Decimal::new(65_000, 2));
    assert_eq!(harness.store.orders_logged.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Abuse checks
// =============================================================================

#[tokio::test]
async fn test_blocked_ip_is_rejected_before_anything_else() {
    let harness = Harness::new(FakeStore {
        blocked: AtomicBool::new(true),
        general: GeneralSettings {
            auto_ip_blocking_enabled: true,
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    });

    let err = harness.place(request(None)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Forbidden));
    assert_eq!(harness.store.attempts.load(Ordering::SeqCst), 0);
    assert!(harness.drafts().is_empty());
}

#[tokio::test]
async fn test_attempt_past_limit_is_blocked_on_the_same_request() {
    let harness = Harness::new(FakeStore {
        general: GeneralSettings {
            auto_ip_blocking_enabled: true,
            ip_attempt_limit: 3,
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    });

    for _ in 0..3 {
        harness.place(request(None)).await.unwrap();
    }
    assert_eq!(harness.store.blocks_recorded.load(Ordering::SeqCst), 0);

    match harness.place(request(None)).await.unwrap_err() {
        CheckoutError::RateLimited(msg) => assert_eq!(msg, MSG_TOO_MANY_ATTEMPTS),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(harness.store.attempts.load(Ordering::SeqCst), 4);
    assert_eq!(harness.store.blocks_recorded.load(Ordering::SeqCst), 1);
    assert_eq!(harness.drafts().len(), 3);

    // The block list now rejects the address before any accounting.
    let err = harness.place(request(None)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Forbidden));
    assert_eq!(harness.store.attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_unresolved_ip_skips_ip_checks() {
    let harness = Harness::new(FakeStore {
        blocked: AtomicBool::new(true),
        general: GeneralSettings {
            auto_ip_blocking_enabled: true,
            ip_attempt_limit: 1,
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    });

    harness.place_from(request(None), None).await.unwrap();
    harness.place_from(request(None), None).await.unwrap();
    assert_eq!(harness.store.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(harness.drafts().len(), 2);
}

#[tokio::test]
async fn test_attempts_are_counted_when_allowed() {
    let harness = Harness::new(FakeStore {
        general: GeneralSettings {
            auto_ip_blocking_enabled: true,
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    });

    harness.place(request(None)).await.unwrap();
    harness.place(request(None)).await.unwrap();
    assert_eq!(harness.store.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(harness.drafts().len(), 2);
}

#[tokio::test]
async fn test_repeat_phone_is_throttled() {
    let harness = Harness::new(FakeStore {
        recent_order: true,
        general: GeneralSettings {
            order_spam_protection_enabled: true,
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    });

    let err = harness.place(request(None)).await.unwrap_err();
    assert_eq!(err.to_string(), MSG_RECENT_ORDER);
    assert!(harness.drafts().is_empty());
}

// =============================================================================
// OTP
// =============================================================================

fn otp_store() -> FakeStore {
    FakeStore {
        general: GeneralSettings {
            otp_enabled: true,
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    }
}

#[tokio::test]
async fn test_otp_required_when_enabled() {
    let harness = Harness::new(otp_store());

    let err = harness.place(request(None)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Unauthorized(ref m) if m == MSG_OTP_REQUIRED));
    assert_eq!(harness.verifier.checks.load(Ordering::SeqCst), 0);

    let err = harness.place(request(Some("   "))).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Unauthorized(ref m) if m == MSG_OTP_REQUIRED));
}

#[tokio::test]
async fn test_wrong_or_unverifiable_otp_is_invalid() {
    let harness = Harness::new(otp_store());

    for code in ["000000", "999999"] {
        let err = harness.place(request(Some(code))).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Unauthorized(ref m) if m == MSG_OTP_INVALID));
    }
    assert_eq!(harness.verifier.checks.load(Ordering::SeqCst), 2);
    assert!(harness.drafts().is_empty());
}

#[tokio::test]
async fn test_approved_otp_places_order() {
    let harness = Harness::new(otp_store());
    let placed = harness.place(request(Some("123456"))).await.unwrap();
    assert_eq!(placed.order_id.as_deref(), Some("9"));
}

// =============================================================================
// Upstream failures
// =============================================================================

#[tokio::test]
async fn test_completion_failure_keeps_draft_and_skips_side_effects() {
    let mut harness = Harness::new(FakeStore {
        general: GeneralSettings {
            order_spam_protection_enabled: true,
            webhook_url: Some("https://example.com/hook".to_string()),
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    });
    harness.platform.fail_completion = true;

    let err = harness.place(request(None)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::UpstreamValidation(_)));
    assert!(err.public_message().contains("Variant is out of stock"));

    assert_eq!(harness.drafts().len(), 1);
    assert_eq!(harness.platform.completions.load(Ordering::SeqCst), 1);
    assert_eq!(harness.store.orders_logged.load(Ordering::SeqCst), 0);
    assert!(harness.exporter.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_request_touches_nothing() {
    let harness = Harness::new(FakeStore {
        general: GeneralSettings {
            auto_ip_blocking_enabled: true,
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    });
    let mut req = request(None);
    req.customer.as_mut().unwrap().phone = "call me".to_string();

    let err = harness.place(req).await.unwrap_err();
    assert!(matches!(err, CheckoutError::MissingField(_)));
    assert_eq!(harness.store.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_draft_user_errors_abort_before_completion() {
    let mut harness = Harness::new(FakeStore::default());
    harness.platform.fail_create = Some(CreateFailure::UserErrors);

    let err = harness.place(request(None)).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err.public_message().contains("Variant does not exist"));
    assert!(!err.public_message().contains("Draft order was created"));
    assert_eq!(harness.platform.completions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_shopify_is_bad_gateway() {
    let mut harness = Harness::new(FakeStore::default());
    harness.platform.fail_create = Some(CreateFailure::Transport);

    let err = harness.place(request(None)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::UpstreamUnavailable { .. }));
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    assert!(err.is_server_error());
    assert_eq!(harness.platform.completions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_order_log_failure_still_reports_the_order() {
    let harness = Harness::new(FakeStore {
        fail_log_order: true,
        general: GeneralSettings {
            order_spam_protection_enabled: true,
            webhook_url: Some("https://example.com/hook".to_string()),
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    });

    let placed = harness.place(request(None)).await.unwrap();
    assert!(placed.success);
    assert_eq!(placed.order_id.as_deref(), Some("9"));
    assert_eq!(harness.platform.completions.load(Ordering::SeqCst), 1);

    let sent = harness.exporter.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.order_id.as_deref(), Some("9"));
}

#[tokio::test]
async fn test_completion_without_order_still_exports() {
    let mut harness = Harness::new(FakeStore {
        general: GeneralSettings {
            webhook_url: Some("https://example.com/hook".to_string()),
            ..GeneralSettings::default()
        },
        ..FakeStore::default()
    });
    harness.platform.completed_without_order = true;

    let placed = harness.place(request(None)).await.unwrap();
    assert!(placed.success);
    assert_eq!(placed.order_id, None);
    assert_eq!(
        serde_json::to_value(&placed).unwrap()["orderId"],
        serde_json::Value::Null
    );

    let sent = harness.exporter.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.order_id, None);
}

#[tokio::test]
async fn test_overflowing_price_is_rejected() {
    let harness = Harness::new(FakeStore {
        general: GeneralSettings {
            webhook_url: Some("https://example.com/hook".to_string()),
            ..GeneralSettings::default()
        },
        tiers: vec![QuantityTier {
            product_id: "111".to_string(),
            min_quantity: 1,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::new(10, 0),
        }],
        ..FakeStore::default()
    });
    let mut req = request(None);
    if let Some(item) = req.cart_items.as_mut().and_then(|items| items.first_mut()) {
        item.price = Decimal::MAX;
        item.quantity = 2;
    }

    match harness.place(req).await.unwrap_err() {
        CheckoutError::MissingField(msg) => assert_eq!(msg, MSG_INVALID_PRICE),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(harness.drafts().is_empty());
}
