use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::span::Span;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotHold {
    pub id: String,
    pub resource_id: String,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: HoldStatus,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

impl SlotHold {
    pub fn span(&self) -> Span {
        Span::new(self.start_at, self.end_at)
    }

    /// Active and not yet past its expiry. A hold whose expiry has passed is
    /// treated as expired even before the sweep flips its status.
    pub fn is_live(&self, now: NaiveDateTime) -> bool {
        self.status == HoldStatus::Active && self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    Active,
    Consumed,
    Expired,
    Released,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Active => "active",
            HoldStatus::Consumed => "consumed",
            HoldStatus::Expired => "expired",
            HoldStatus::Released => "released",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(HoldStatus::Active),
            "consumed" => Some(HoldStatus::Consumed),
            "expired" => Some(HoldStatus::Expired),
            "released" => Some(HoldStatus::Released),
            _ => None,
        }
    }
}
