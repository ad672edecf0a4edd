use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, GroupId};

pub type BillId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    /// Waiting for the member to submit proof
    Pending,
    /// Proof submitted (or bill opened by rollover), not yet settled in full
    Submitted,
    Verified,
    Rejected,
    Canceled,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Submitted => "submitted",
            BillStatus::Verified => "verified",
            BillStatus::Rejected => "rejected",
            BillStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(BillStatus::Pending),
            "submitted" => Some(BillStatus::Submitted),
            "verified" => Some(BillStatus::Verified),
            "rejected" => Some(BillStatus::Rejected),
            "canceled" => Some(BillStatus::Canceled),
            _ => None,
        }
    }

    /// Verified and canceled bills no longer accept proof.
    pub fn is_closed(&self) -> bool {
        matches!(self, BillStatus::Verified | BillStatus::Canceled)
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One billing period, e.g. March 2026.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cycle {
    pub year: i32,
    pub month: u32,
}

impl Cycle {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp.year(), timestamp.month())
    }
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A member's bill for one cycle of a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub group_id: GroupId,
    pub member_id: String,
    pub year: i32,
    pub month: u32,
    pub amount_due: Cents,
    pub amount_paid: Cents,
    pub currency: String,
    pub status: BillStatus,
    pub description: Option<String>,
    /// Raw oracle response attached on proof submission.
    pub proof: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Bill {
    /// Create a bill. The id must be issued by the store.
    pub fn new(
        id: BillId,
        group_id: GroupId,
        member_id: impl Into<String>,
        cycle: Cycle,
        amount_due: Cents,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            group_id,
            member_id: member_id.into(),
            year: cycle.year,
            month: cycle.month,
            amount_due,
            amount_paid: 0,
            currency: currency.into(),
            status: BillStatus::Pending,
            description: None,
            proof: None,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            verified_at: None,
            rejected_at: None,
        }
    }

    pub fn with_status(mut self, status: BillStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn cycle(&self) -> Cycle {
        Cycle::new(self.year, self.month)
    }

    /// Record what a slip says was paid.
    pub fn stamp_submission(&mut self, amount_paid: Cents, proof: Option<String>, now: DateTime<Utc>) {
        self.amount_paid = amount_paid;
        self.updated_at = now;
        self.submitted_at = Some(now);
        if let Some(proof) = proof.filter(|p| !p.is_empty()) {
            self.proof = Some(proof);
        }
    }

    pub fn mark_verified(&mut self, now: DateTime<Utc>) {
        self.status = BillStatus::Verified;
        self.verified_at = Some(now);
    }

    pub fn mark_rejected(&mut self, now: DateTime<Utc>) {
        self.status = BillStatus::Rejected;
        self.rejected_at = Some(now);
    }
}
