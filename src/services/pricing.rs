use serde::{Deserialize, Serialize};

use crate::models::{BookableType, Money, Package};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepositSplit {
    pub deposit: Money,
    pub remaining: Money,
}

/// Splits `total` into the amount collected at booking time and the balance
/// due later. The deposit is the larger of the percentage-derived and the
/// fixed amount, capped at the total. A non-positive total owes nothing.
pub fn compute_deposit(total: Money, percentage: Option<f64>, fixed: Option<Money>) -> DepositSplit {
    if !total.is_positive() {
        return DepositSplit {
            deposit: Money::ZERO,
            remaining: Money::ZERO,
        };
    }

    let from_percentage = percentage
        .filter(|p| p.is_finite() && *p > 0.0)
        .map(|p| total.percent(p.min(100.0)))
        .unwrap_or(Money::ZERO);
    let fixed = fixed.unwrap_or(Money::ZERO).max(Money::ZERO);

    let deposit = from_percentage.max(fixed).min(total);
    DepositSplit {
        deposit,
        remaining: total.saturating_sub(deposit).max(Money::ZERO),
    }
}

/// What the customer is buying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Offering {
    Package {
        package_id: String,
        #[serde(default)]
        member_pricing: bool,
    },
    Hourly {
        bookable_type_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub subtotal: Money,
    pub total: Money,
    pub deposit: Money,
    pub balance_due: Money,
}

/// Price for a package, using the member price when asked for and defined.
pub fn package_price(package: &Package, member_pricing: bool) -> Money {
    match (member_pricing, package.member_price) {
        (true, Some(member)) => member,
        _ => package.price,
    }
}

/// Hourly rate times duration, rounded to the cent.
pub fn hourly_price(rate: Money, minutes: i64) -> Money {
    Money::from_cents((rate.cents() as f64 * minutes as f64 / 60.0).round() as i64)
}

pub fn quote(bookable_type: &BookableType, subtotal: Money) -> Quote {
    let total = subtotal;
    let split = compute_deposit(total, bookable_type.deposit_percentage, bookable_type.deposit_fixed);
    Quote {
        subtotal,
        total,
        deposit: split.deposit,
        balance_due: split.remaining,
    }
}
