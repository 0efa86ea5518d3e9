use serde::{Deserialize, Serialize};

use super::money::Money;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub kind: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookableType {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub deposit_percentage: Option<f64>,
    pub deposit_fixed: Option<Money>,
    pub hourly_rate: Option<Money>,
}

impl BookableType {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(pct) = self.deposit_percentage {
            if !(0.0..=100.0).contains(&pct) {
                return Err(format!("deposit percentage {pct} is outside 0..=100"));
            }
        }
        if self.deposit_fixed.is_some_and(|m| m.cents() < 0) {
            return Err("fixed deposit cannot be negative".to_string());
        }
        if self.hourly_rate.is_some_and(|m| m.cents() < 0) {
            return Err("hourly rate cannot be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub bookable_type_id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price: Money,
    pub member_price: Option<Money>,
    pub is_active: bool,
}
