//! Shipping rate resolution and quantity discount selection.
//!
//! These are the two pieces of business logic in the checkout flow that do
//! not need I/O. The server loads the relevant rows and hands them here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DiscountType, Money};

/// Normalize a country or city name for rate lookups.
#[must_use]
pub fn location_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// A configured shipping rate row.
///
/// An empty `city` marks the country default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRule {
    pub country: String,
    pub city: String,
    pub rate: Money,
}

impl RateRule {
    /// Whether this row is the country-wide default.
    #[must_use]
    pub fn is_country_default(&self) -> bool {
        self.city.trim().is_empty()
    }
}

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    City,
    CountryDefault,
    Fallback,
}

/// The outcome of [`resolve_shipping_rate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRate {
    pub rate: Money,
    pub source: RateSource,
}

/// Resolve the shipping rate for a destination.
///
/// An exact `(country, city)` row wins over the `(country, "")` default,
/// which wins over `fallback`. Both sides are compared trimmed and
/// lowercased.
///
/// ```
/// use cod_form_core::pricing::{resolve_shipping_rate, RateRule, RateSource};
/// use cod_form_core::{CurrencyCode, Money};
/// use rust_decimal::Decimal;
///
/// let pkr = |n| Money::new(Decimal::new(n, 0), CurrencyCode::pkr());
/// let rules = vec![
///     RateRule { country: "Pakistan".into(), city: "Lahore".into(), rate: pkr(150) },
///     RateRule { country: "Pakistan".into(), city: String::new(), rate: pkr(250) },
/// ];
///
/// let resolved = resolve_shipping_rate(&rules, "pakistan", " LAHORE ", &pkr(300));
/// assert_eq!(resolved.rate, pkr(150));
/// assert_eq!(resolved.source, RateSource::City);
/// ```
#[must_use]
pub fn resolve_shipping_rate(
    rules: &[RateRule],
    country: &str,
    city: &str,
    fallback: &Money,
) -> ResolvedRate {
    let country = location_key(country);
    let city = location_key(city);

    let in_country = || rules.iter().filter(|r| location_key(&r.country) == country);

    if !city.is_empty()
        && let Some(rule) = in_country().find(|r| location_key(&r.city) == city)
    {
        return ResolvedRate {
            rate: rule.rate.clone(),
            source: RateSource::City,
        };
    }

    if let Some(rule) = in_country().find(|r| r.is_country_default()) {
        return ResolvedRate {
            rate: rule.rate.clone(),
            source: RateSource::CountryDefault,
        };
    }

    ResolvedRate {
        rate: fallback.clone(),
        source: RateSource::Fallback,
    }
}

/// One quantity discount tier for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityTier {
    pub product_id: String,
    pub min_quantity: u32,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
}

/// A cart line as far as discounting is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl PricedLine {
    /// `unit_price * quantity`, or `None` if it does not fit in a `Decimal`.
    #[must_use]
    pub fn total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Sum of all line totals, or `None` on overflow.
#[must_use]
pub fn cart_subtotal(lines: &[PricedLine]) -> Option<Decimal> {
    lines
        .iter()
        .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.total()?))
}

/// Select the tier with the highest `min_quantity` not above `quantity`.
///
/// Returns `None` when no tier for `product_id` qualifies.
#[must_use]
pub fn select_tier<'a>(
    tiers: &'a [QuantityTier],
    product_id: &str,
    quantity: u32,
) -> Option<&'a QuantityTier> {
    tiers
        .iter()
        .filter(|t| t.product_id == product_id && t.min_quantity <= quantity)
        .max_by_key(|t| t.min_quantity)
}

/// Discount for one line under one tier.
///
/// A percentage applies to the line total. A fixed amount is taken once per
/// line. The result is rounded to two places and clamped to `0..=total`.
/// A line whose total overflows gets no discount.
#[must_use]
pub fn line_discount(line: &PricedLine, tier: &QuantityTier) -> Decimal {
    let Some(total) = line.total() else {
        return Decimal::ZERO;
    };
    let raw = match tier.discount_type {
        DiscountType::Percentage => total
            .checked_mul(tier.discount_value)
            .map_or(Decimal::ZERO, |v| v / Decimal::ONE_HUNDRED),
        DiscountType::Fixed => tier.discount_value,
    };
    raw.round_dp(2).clamp(Decimal::ZERO, total.max(Decimal::ZERO))
}

/// Sum of the best-tier discount across all lines, saturating at
/// `Decimal::MAX`.
#[must_use]
pub fn cart_discount(lines: &[PricedLine], tiers: &[QuantityTier]) -> Decimal {
    lines
        .iter()
        .filter_map(|line| {
            select_tier(tiers, &line.product_id, line.quantity).map(|t| line_discount(line, t))
        })
        .fold(Decimal::ZERO, |acc, d| acc.checked_add(d).unwrap_or(Decimal::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::CurrencyCode;

    fn pkr(n: i64) -> Money {
        Money::new(Decimal::new(n, 0), CurrencyCode::pkr())
    }

    fn rule(country: &str, city: &str, n: i64) -> RateRule {
        RateRule {
            country: country.to_owned(),
            city: city.to_owned(),
            rate: pkr(n),
        }
    }

    fn tier(product: &str, min: u32, kind: DiscountType, value: i64) -> QuantityTier {
        QuantityTier {
            product_id: product.to_owned(),
            min_quantity: min,
            discount_type: kind,
            discount_value: Decimal::new(value, 0),
        }
    }

    fn line(product: &str, quantity: u32, price: i64) -> PricedLine {
        PricedLine {
            product_id: product.to_owned(),
            quantity,
            unit_price: Decimal::new(price, 0),
        }
    }

    #[test]
    fn test_city_rate_beats_country_default() {
        let rules = vec![rule("Pakistan", "", 250), rule("Pakistan", "Lahore", 150)];
        let r = resolve_shipping_rate(&rules, "Pakistan", "Lahore", &pkr(999));
        assert_eq!(r.rate, pkr(150));
        assert_eq!(r.source, RateSource::City);
    }

    #[test]
    fn test_country_default_when_city_missing() {
        let rules = vec![rule("Pakistan", "", 250), rule("Pakistan", "Lahore", 150)];
        let r = resolve_shipping_rate(&rules, "Pakistan", "Karachi", &pkr(999));
        assert_eq!(r.rate, pkr(250));
        assert_eq!(r.source, RateSource::CountryDefault);
    }

    #[test]
    fn test_fallback_when_country_missing() {
        let rules = vec![rule("Pakistan", "Lahore", 150)];
        let r = resolve_shipping_rate(&rules, "India", "Lahore", &pkr(250));
        assert_eq!(r.rate, pkr(250));
        assert_eq!(r.source, RateSource::Fallback);
    }

    #[test]
    fn test_city_rate_not_used_across_countries() {
        let rules = vec![rule("India", "Lahore", 99), rule("Pakistan", "", 250)];
        let r = resolve_shipping_rate(&rules, "Pakistan", "Lahore", &pkr(999));
        assert_eq!(r.rate, pkr(250));
    }

    #[test]
    fn test_keys_are_case_and_space_insensitive() {
        let rules = vec![rule(" PAKISTAN ", "lahore ", 150)];
        let r = resolve_shipping_rate(&rules, "pakistan", "  Lahore", &pkr(999));
        assert_eq!(r.source, RateSource::City);
    }

    #[test]
    fn test_empty_city_selects_default() {
        let rules = vec![rule("Pakistan", "", 250)];
        let r = resolve_shipping_rate(&rules, "Pakistan", "  ", &pkr(999));
        assert_eq!(r.source, RateSource::CountryDefault);
    }

    #[test]
    fn test_highest_qualifying_tier_wins() {
        let tiers = vec![
            tier("1", 3, DiscountType::Percentage, 10),
            tier("1", 5, DiscountType::Percentage, 20),
        ];
        let t = select_tier(&tiers, "1", 5).unwrap();
        assert_eq!(t.discount_value, Decimal::new(20, 0));

        let t = select_tier(&tiers, "1", 4).unwrap();
        assert_eq!(t.discount_value, Decimal::new(10, 0));
    }

    #[test]
    fn test_no_tier_when_none_qualifies() {
        let tiers = vec![tier("1", 3, DiscountType::Percentage, 10)];
        assert!(select_tier(&tiers, "1", 2).is_none());
        assert!(select_tier(&tiers, "2", 10).is_none());
    }

    #[test]
    fn test_selected_tier_is_max_qualifying_for_every_quantity() {
        let tiers = vec![
            tier("1", 2, DiscountType::Fixed, 5),
            tier("1", 7, DiscountType::Fixed, 15),
            tier("1", 4, DiscountType::Fixed, 10),
        ];
        for qty in 0..12 {
            let expected = tiers
                .iter()
                .map(|t| t.min_quantity)
                .filter(|m| *m <= qty)
                .max();
            assert_eq!(select_tier(&tiers, "1", qty).map(|t| t.min_quantity), expected);
        }
    }

    #[test]
    fn test_percentage_discount_on_line_total() {
        let t = tier("1", 5, DiscountType::Percentage, 20);
        assert_eq!(line_discount(&line("1", 5, 1000), &t), Decimal::new(1000, 0));
    }

    #[test]
    fn test_fixed_discount_once_per_line() {
        let t = tier("1", 2, DiscountType::Fixed, 100);
        assert_eq!(line_discount(&line("1", 4, 500), &t), Decimal::new(100, 0));
    }

    #[test]
    fn test_fixed_discount_capped_at_line_total() {
        let t = tier("1", 1, DiscountType::Fixed, 900);
        assert_eq!(line_discount(&line("1", 1, 300), &t), Decimal::new(300, 0));
    }

    #[test]
    fn test_cart_discount_sums_lines() {
        let tiers = vec![
            tier("1", 3, DiscountType::Percentage, 10),
            tier("1", 5, DiscountType::Percentage, 20),
            tier("2", 2, DiscountType::Fixed, 50),
        ];
        let lines = vec![line("1", 5, 100), line("2", 2, 300), line("3", 9, 10)];
        // 20% of 500 + 50 flat
        assert_eq!(cart_discount(&lines, &tiers), Decimal::new(150, 0));
    }

    #[test]
    fn test_overflowing_line_gets_no_discount() {
        let huge = PricedLine {
            product_id: "1".to_owned(),
            quantity: 2,
            unit_price: Decimal::MAX,
        };
        assert_eq!(huge.total(), None);

        let tiers = vec![tier("1", 1, DiscountType::Percentage, 10)];
        assert_eq!(cart_discount(&[huge.clone()], &tiers), Decimal::ZERO);
        assert_eq!(cart_subtotal(&[huge]), None);
    }

    #[test]
    fn test_subtotal_overflow_across_lines() {
        let big = PricedLine {
            product_id: "1".to_owned(),
            quantity: 1,
            unit_price: Decimal::MAX,
        };
        assert_eq!(cart_subtotal(&[big.clone()]), Some(Decimal::MAX));
        assert_eq!(cart_subtotal(&[big.clone(), big]), None);
        assert_eq!(
            cart_subtotal(&[line("1", 5, 100), line("2", 2, 300)]),
            Some(Decimal::new(1100, 0))
        );
    }
}
