//! Cash on Delivery order placement.
//!
//! [`Checkout::place_order`] runs the storefront order flow as a sequence of
//! early returns:
//!
//! 1. Required fields and phone normalization
//! 2. IP block list
//! 3. IP attempt accounting and auto-block (when enabled)
//! 4. Per-phone spam throttle (when enabled)
//! 5. OTP check (when enabled)
//! 6. Shipping rate and quantity discount
//! 7. `draftOrderCreate` then `draftOrderComplete`
//! 8. Order log and webhook on success
//!
//! I/O sits behind four traits so the flow can run against in-memory fakes.
//! The production implementations are [`PgStore`], [`ShopAdmin`],
//! [`TwilioVerifier`] and [`WebhookClient`].

use async_trait::async_trait;
use axum::http::StatusCode;
use cod_form_core::pricing::{
    PricedLine, QuantityTier, RateRule, cart_discount, cart_subtotal, resolve_shipping_rate,
};
use cod_form_core::{Money, PhoneNumber, ShopDomain};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::db::{
    AbuseLogRepository, AppSettings, AttemptOutcome, BlockedIpRepository, GeneralSettings,
    QuantityOfferRepository, RepositoryError, SettingsRepository, ShippingRateRepository,
};
use crate::shopify::{
    AdminShopifyError, AppliedDiscountInput, AppliedDiscountType, AttributeInput, CompletedOrder,
    DraftOrderInput, DraftOrderLineItemInput, DraftOrderRef, MailingAddressInput, MoneyInput,
    ShippingLineInput, ShopAdmin, join_user_errors, to_gid,
};
use crate::twilio::{TwilioCredentials, TwilioError, VerificationStatus, VerifyClient};

use super::webhook::{OrderWebhookPayload, WebhookClient, WebhookCustomer};

pub const MSG_MISSING_DATA: &str = "Missing cart, customer or shipping data.";
pub const MSG_INVALID_PHONE: &str = "Please enter a valid phone number.";
pub const MSG_INVALID_PRICE: &str = "Invalid cart item price.";
pub const MSG_IP_BLOCKED: &str = "Your IP has been blocked due to suspicious activity.";
pub const MSG_TOO_MANY_ATTEMPTS: &str =
    "Too many order attempts from your network. Please try again later.";
pub const MSG_RECENT_ORDER: &str =
    "An order was already placed with this phone number recently. Please try again later.";
pub const MSG_OTP_REQUIRED: &str = "OTP is required.";
pub const MSG_OTP_INVALID: &str = "Invalid OTP.";
pub const MSG_UPSTREAM: &str = "Could not reach Shopify. Please try again.";
pub const MSG_INTERNAL: &str = "Something went wrong. Please try again.";

const DISCOUNT_TITLE: &str = "Quantity discount";
const SHIPPING_TITLE: &str = "Shipping";
const ORDER_TAGS: [&str; 2] = ["COD", "App Order"];

/// Highest unit price accepted from the widget, in the major unit.
pub const MAX_UNIT_PRICE: u32 = 1_000_000_000;

// =============================================================================
// Request
// =============================================================================

/// Body of `POST /proxy/create-order`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default, alias = "cart_items")]
    pub cart_items: Option<Vec<CartItem>>,
    #[serde(default)]
    pub customer: Option<CustomerInput>,
    #[serde(default)]
    pub shipping: Option<ShippingSelection>,
    #[serde(default)]
    pub otp: Option<String>,
}

/// One cart line as sent by the widget.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(alias = "product_id", deserialize_with = "id_string")]
    pub product_id: String,
    #[serde(alias = "variant_id", deserialize_with = "id_string")]
    pub variant_id: String,
    pub quantity: u32,
    /// Unit price in the shop currency's major unit.
    pub price: Decimal,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomerInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub province: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShippingSelection {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
}

/// Shopify ids arrive as numbers from `cart.js` and as strings elsewhere.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s.trim().to_string(),
        Id::Number(n) => n.to_string(),
    })
}

/// A request that passed field validation.
#[derive(Debug, Clone)]
struct ValidatedOrder {
    items: Vec<CartItem>,
    customer: CustomerInput,
    shipping: ShippingSelection,
    phone: PhoneNumber,
    otp: Option<String>,
    lines: Vec<PricedLine>,
    subtotal: Decimal,
}

impl CheckoutRequest {
    fn validate(self) -> Result<ValidatedOrder, CheckoutError> {
        let missing = || CheckoutError::MissingField(MSG_MISSING_DATA.to_string());

        let items = self
            .cart_items
            .filter(|items| !items.is_empty())
            .ok_or_else(missing)?;
        let customer = self.customer.ok_or_else(missing)?;
        let shipping = self.shipping.ok_or_else(missing)?;

        if customer.name.trim().is_empty()
            || customer.address.trim().is_empty()
            || shipping.country.trim().is_empty()
            || items
                .iter()
                .any(|i| i.variant_id.is_empty() || i.quantity == 0)
        {
            return Err(missing());
        }

        let invalid_price = || CheckoutError::MissingField(MSG_INVALID_PRICE.to_string());
        let max_price = Decimal::from(MAX_UNIT_PRICE);
        if items
            .iter()
            .any(|i| i.price.is_sign_negative() || i.price > max_price)
        {
            return Err(invalid_price());
        }
        let lines = priced_lines(&items);
        let subtotal = cart_subtotal(&lines).ok_or_else(invalid_price)?;

        let phone = PhoneNumber::normalize(&customer.phone)
            .map_err(|_| CheckoutError::MissingField(MSG_INVALID_PHONE.to_string()))?;

        Ok(ValidatedOrder {
            items,
            customer,
            shipping,
            phone,
            otp: self.otp.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            lines,
            subtotal,
        })
    }
}

/// Result of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub success: bool,
    /// Legacy numeric id, `None` if Shopify completed the draft without
    /// returning the order.
    pub order_id: Option<String>,
}

// =============================================================================
// Errors
// =============================================================================

/// Why an order was not placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    MissingField(String),

    #[error("Your IP has been blocked due to suspicious activity.")]
    Forbidden,

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Shopify rejected the order input.
    #[error("{0}")]
    UpstreamValidation(String),

    /// Shopify could not be reached or failed.
    #[error("{message}")]
    UpstreamUnavailable {
        message: String,
        #[source]
        source: AdminShopifyError,
    },

    #[error("database error: {0}")]
    Internal(#[from] RepositoryError),
}

impl CheckoutError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::UpstreamValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the customer.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => MSG_INTERNAL.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this failure is ours rather than the customer's.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::UpstreamUnavailable { .. })
    }

    fn upstream(source: AdminShopifyError, draft_id: Option<&str>) -> Self {
        match (source, draft_id) {
            (AdminShopifyError::UserErrors(errors), None) => {
                Self::UpstreamValidation(join_user_errors(&errors))
            }
            (AdminShopifyError::UserErrors(errors), Some(_)) => Self::UpstreamValidation(format!(
                "Draft order was created but could not be completed: {}",
                join_user_errors(&errors)
            )),
            (source, None) => Self::UpstreamUnavailable {
                message: MSG_UPSTREAM.to_string(),
                source,
            },
            (source, Some(_)) => Self::UpstreamUnavailable {
                message: "Draft order was created but could not be completed. Please contact the store."
                    .to_string(),
                source,
            },
        }
    }
}

// =============================================================================
// Seams
// =============================================================================

/// Persistence used by the checkout flow.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    async fn settings(&self, shop: &ShopDomain) -> Result<AppSettings, RepositoryError>;

    async fn is_ip_blocked(&self, shop: &ShopDomain, ip: &str) -> Result<bool, RepositoryError>;

    /// Record an attempt and block the IP once it exceeds `limit` within
    /// the window, atomically per `(shop, ip)`.
    async fn record_ip_attempt(
        &self,
        shop: &ShopDomain,
        ip: &str,
        window_minutes: i32,
        limit: i32,
    ) -> Result<AttemptOutcome, RepositoryError>;

    async fn recent_order_exists(
        &self,
        shop: &ShopDomain,
        phone: &str,
        window_minutes: i32,
    ) -> Result<bool, RepositoryError>;

    async fn rate_candidates(
        &self,
        shop: &ShopDomain,
        country: &str,
        city: &str,
    ) -> Result<Vec<RateRule>, RepositoryError>;

    async fn offers_for(
        &self,
        shop: &ShopDomain,
        product_ids: &[String],
    ) -> Result<Vec<QuantityTier>, RepositoryError>;

    async fn log_order(&self, shop: &ShopDomain, phone: &str) -> Result<(), RepositoryError>;
}

/// Remote order creation.
#[async_trait]
pub trait OrderPlatform: Send + Sync {
    async fn create_draft_order(
        &self,
        input: &DraftOrderInput,
    ) -> Result<DraftOrderRef, AdminShopifyError>;

    async fn complete_draft_order(
        &self,
        id: &str,
    ) -> Result<Option<CompletedOrder>, AdminShopifyError>;
}

/// OTP verification.
#[async_trait]
pub trait PhoneVerifier: Send + Sync {
    async fn check(
        &self,
        settings: &GeneralSettings,
        phone: &str,
        code: &str,
    ) -> Result<VerificationStatus, TwilioError>;
}

/// Order export after success. Must not block or fail the order.
pub trait OrderExporter: Send + Sync {
    fn export(&self, url: &str, payload: OrderWebhookPayload);
}

// =============================================================================
// Flow
// =============================================================================

/// The order flow wired to its dependencies.
pub struct Checkout<'a, S, P, V, E> {
    pub store: &'a S,
    pub platform: &'a P,
    pub verifier: &'a V,
    pub exporter: &'a E,
    pub fallback_rate: &'a Money,
}

impl<S, P, V, E> Checkout<'_, S, P, V, E>
where
    S: CheckoutStore,
    P: OrderPlatform,
    V: PhoneVerifier,
    E: OrderExporter,
{
    /// Place a COD order for `shop` on behalf of a customer at `client_ip`.
    ///
    /// The IP checks are skipped when the client address could not be
    /// resolved, so unresolvable customers never share a counter.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] for the first check that fails. Nothing
    /// is written before the IP attempt log; nothing is rolled back after
    /// a draft order exists.
    #[instrument(skip(self, request), fields(shop = %shop, client_ip = ?client_ip))]
    pub async fn place_order(
        &self,
        shop: &ShopDomain,
        request: CheckoutRequest,
        client_ip: Option<&str>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let order = request.validate()?;
        let settings = self.store.settings(shop).await?;

        if let Some(ip) = client_ip {
            if self.store.is_ip_blocked(shop, ip).await? {
                info!("Rejected order from blocked IP");
                return Err(CheckoutError::Forbidden);
            }

            if settings.general.auto_ip_blocking_enabled {
                let outcome = self
                    .store
                    .record_ip_attempt(
                        shop,
                        ip,
                        settings.ip_attempt_window_minutes(),
                        settings.ip_attempt_limit(),
                    )
                    .await?;
                if let AttemptOutcome::Blocked { attempts } = outcome {
                    warn!(attempts, "IP auto-blocked after repeated order attempts");
                    return Err(CheckoutError::RateLimited(MSG_TOO_MANY_ATTEMPTS.to_string()));
                }
            }
        } else {
            debug!("Client IP unresolved, skipping IP checks");
        }

        if settings.general.order_spam_protection_enabled
            && self
                .store
                .recent_order_exists(shop, order.phone.as_str(), settings.order_spam_window_minutes())
                .await?
        {
            info!("Rejected repeat order for phone within spam window");
            return Err(CheckoutError::RateLimited(MSG_RECENT_ORDER.to_string()));
        }

        if settings.general.otp_enabled {
            let Some(code) = order.otp.as_deref() else {
                return Err(CheckoutError::Unauthorized(MSG_OTP_REQUIRED.to_string()));
            };
            match self
                .verifier
                .check(&settings.general, order.phone.as_str(), code)
                .await
            {
                Ok(status) if status.is_approved() => {}
                Ok(status) => {
                    info!(status = ?status, "OTP not approved");
                    return Err(CheckoutError::Unauthorized(MSG_OTP_INVALID.to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "OTP verification failed");
                    return Err(CheckoutError::Unauthorized(MSG_OTP_INVALID.to_string()));
                }
            }
        }

        let rules = self
            .store
            .rate_candidates(shop, &order.shipping.country, &order.shipping.city)
            .await?;
        let rate = resolve_shipping_rate(
            &rules,
            &order.shipping.country,
            &order.shipping.city,
            self.fallback_rate,
        );

        let product_ids = unique_product_ids(&order.lines);
        let tiers = self.store.offers_for(shop, &product_ids).await?;
        let discount = cart_discount(&order.lines, &tiers);

        let input = build_draft_order(&order, &rate.rate, discount);

        let draft = self
            .platform
            .create_draft_order(&input)
            .await
            .map_err(|e| CheckoutError::upstream(e, None))?;

        let completed = match self.platform.complete_draft_order(&draft.id).await {
            Ok(completed) => completed,
            Err(e) => {
                warn!(draft_order_id = %draft.id, error = %e, "Draft order left incomplete");
                return Err(CheckoutError::upstream(e, Some(&draft.id)));
            }
        };

        let order_id = completed.map(|o| o.legacy_resource_id);
        info!(order_id = ?order_id, rate_source = ?rate.source, %discount, "COD order placed");

        // The order exists in Shopify from here on; later failures are logged only.
        if settings.general.order_spam_protection_enabled
            && let Err(e) = self.store.log_order(shop, order.phone.as_str()).await
        {
            let event_id = sentry::capture_error(&e);
            warn!(
                error = %e,
                order_id = ?order_id,
                sentry_event_id = %event_id,
                "Failed to record order for spam throttle"
            );
        }

        if let Some(url) = settings.webhook_url() {
            let total = order_total(order.subtotal, discount, rate.rate.amount);
            self.exporter
                .export(url, webhook_payload(&order, order_id.clone(), total));
        }

        Ok(PlacedOrder {
            success: true,
            order_id,
        })
    }
}

fn priced_lines(items: &[CartItem]) -> Vec<PricedLine> {
    items
        .iter()
        .map(|i| PricedLine {
            product_id: i.product_id.clone(),
            quantity: i.quantity,
            unit_price: i.price,
        })
        .collect()
}

/// `subtotal - discount + shipping`, never below zero. Saturates on overflow.
fn order_total(subtotal: Decimal, discount: Decimal, shipping: Decimal) -> Decimal {
    subtotal
        .checked_sub(discount)
        .and_then(|v| v.checked_add(shipping))
        .unwrap_or(Decimal::MAX)
        .max(Decimal::ZERO)
}

fn unique_product_ids(lines: &[PricedLine]) -> Vec<String> {
    let mut ids: Vec<String> = lines
        .iter()
        .map(|l| l.product_id.clone())
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Split a full name into first and last, defaulting to `Guest` / `User`.
#[must_use]
pub fn split_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let first = parts.next().unwrap_or("Guest").to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    let last = if rest.is_empty() {
        "User".to_string()
    } else {
        rest
    };
    (first, last)
}

/// Customer email, or a placeholder derived from the phone digits.
#[must_use]
pub fn order_email(email: Option<&str>, phone: &PhoneNumber) -> String {
    email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map_or_else(|| format!("{}@example.com", phone.digits()), String::from)
}

fn build_draft_order(order: &ValidatedOrder, shipping: &Money, discount: Decimal) -> DraftOrderInput {
    let currency = shipping.currency.as_str().to_string();
    let (first_name, last_name) = split_name(&order.customer.name);

    let applied_discount = (discount > Decimal::ZERO).then(|| AppliedDiscountInput {
        title: DISCOUNT_TITLE.to_string(),
        value: discount.to_f64().unwrap_or_default(),
        value_type: AppliedDiscountType::FixedAmount,
        amount_with_currency: MoneyInput {
            amount: format!("{discount:.2}"),
            currency_code: currency.clone(),
        },
    });

    DraftOrderInput {
        line_items: order
            .items
            .iter()
            .map(|i| DraftOrderLineItemInput {
                variant_id: to_gid("ProductVariant", &i.variant_id),
                quantity: i.quantity,
            })
            .collect(),
        shipping_line: ShippingLineInput {
            title: SHIPPING_TITLE.to_string(),
            price_with_currency: MoneyInput {
                amount: shipping.amount_string(),
                currency_code: currency.clone(),
            },
        },
        applied_discount,
        email: order_email(order.customer.email.as_deref(), &order.phone),
        phone: Some(order.phone.as_str().to_string()),
        shipping_address: MailingAddressInput {
            first_name,
            last_name,
            address1: order.customer.address.trim().to_string(),
            city: order.shipping.city.trim().to_string(),
            province: order
                .customer
                .province
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from),
            country: order.shipping.country.trim().to_string(),
            phone: order.phone.as_str().to_string(),
        },
        tags: ORDER_TAGS.iter().map(ToString::to_string).collect(),
        custom_attributes: vec![AttributeInput {
            key: "Payment Method".to_string(),
            value: "Cash on Delivery".to_string(),
        }],
        presentment_currency_code: currency,
    }
}

fn webhook_payload(order: &ValidatedOrder, order_id: Option<String>, total: Decimal) -> OrderWebhookPayload {
    OrderWebhookPayload {
        order_id,
        customer: WebhookCustomer {
            name: order.customer.name.trim().to_string(),
            phone: order.phone.as_str().to_string(),
            address: order.customer.address.trim().to_string(),
            city: order.shipping.city.trim().to_string(),
            country: order.shipping.country.trim().to_string(),
        },
        products: order
            .items
            .iter()
            .map(|i| {
                let title = if i.title.trim().is_empty() {
                    i.variant_id.as_str()
                } else {
                    i.title.trim()
                };
                format!("{title} x {}", i.quantity)
            })
            .collect(),
        total: total.round_dp(2),
    }
}

// =============================================================================
// Production implementations
// =============================================================================

/// Checkout and OTP persistence over the repositories.
#[derive(Debug, Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckoutStore for PgStore {
    async fn settings(&self, shop: &ShopDomain) -> Result<AppSettings, RepositoryError> {
        SettingsRepository::new(&self.pool).get_or_default(shop).await
    }

    async fn is_ip_blocked(&self, shop: &ShopDomain, ip: &str) -> Result<bool, RepositoryError> {
        BlockedIpRepository::new(&self.pool).is_blocked(shop, ip).await
    }

    async fn record_ip_attempt(
        &self,
        shop: &ShopDomain,
        ip: &str,
        window_minutes: i32,
        limit: i32,
    ) -> Result<AttemptOutcome, RepositoryError> {
        AbuseLogRepository::new(&self.pool)
            .record_ip_attempt(shop, ip, window_minutes, limit)
            .await
    }

    async fn recent_order_exists(
        &self,
        shop: &ShopDomain,
        phone: &str,
        window_minutes: i32,
    ) -> Result<bool, RepositoryError> {
        AbuseLogRepository::new(&self.pool)
            .recent_order_exists(shop, phone, window_minutes)
            .await
    }

    async fn rate_candidates(
        &self,
        shop: &ShopDomain,
        country: &str,
        city: &str,
    ) -> Result<Vec<RateRule>, RepositoryError> {
        ShippingRateRepository::new(&self.pool)
            .candidates(shop, country, city)
            .await
    }

    async fn offers_for(
        &self,
        shop: &ShopDomain,
        product_ids: &[String],
    ) -> Result<Vec<QuantityTier>, RepositoryError> {
        let offers = QuantityOfferRepository::new(&self.pool)
            .for_products(shop, product_ids)
            .await?;
        Ok(offers.iter().map(|o| o.to_tier()).collect())
    }

    async fn log_order(&self, shop: &ShopDomain, phone: &str) -> Result<(), RepositoryError> {
        AbuseLogRepository::new(&self.pool).log_order(shop, phone).await
    }
}

#[async_trait]
impl OrderPlatform for ShopAdmin {
    async fn create_draft_order(
        &self,
        input: &DraftOrderInput,
    ) -> Result<DraftOrderRef, AdminShopifyError> {
        Self::create_draft_order(self, input).await
    }

    async fn complete_draft_order(
        &self,
        id: &str,
    ) -> Result<Option<CompletedOrder>, AdminShopifyError> {
        Self::complete_draft_order(self, id).await
    }
}

/// [`PhoneVerifier`] backed by Twilio Verify with per-shop credentials.
#[derive(Debug, Clone)]
pub struct TwilioVerifier {
    client: VerifyClient,
}

impl TwilioVerifier {
    #[must_use]
    pub const fn new(client: VerifyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PhoneVerifier for TwilioVerifier {
    async fn check(
        &self,
        settings: &GeneralSettings,
        phone: &str,
        code: &str,
    ) -> Result<VerificationStatus, TwilioError> {
        let credentials = TwilioCredentials::from_settings(settings)?;
        self.client
            .check_verification(&credentials, phone, code)
            .await
    }
}

impl OrderExporter for WebhookClient {
    fn export(&self, url: &str, payload: OrderWebhookPayload) {
        self.spawn_delivery(url.to_string(), payload);
    }
}
