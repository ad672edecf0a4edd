use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, split_evenly};

pub type GroupId = i64;

/// Where a member stands in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    Invited,
    Active,
    Left,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Invited => "Invited",
            MemberStatus::Active => "Active",
            MemberStatus::Left => "Left",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "invited" => Some(MemberStatus::Invited),
            "active" => Some(MemberStatus::Active),
            "left" => Some(MemberStatus::Left),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "Not_Paid")]
    NotPaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::NotPaid => "Not_Paid",
            PaymentStatus::Paid => "Paid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// How a group receives money. The wire codes match the slip oracle's
/// account-type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "BANKAC")]
    BankAccount,
    #[serde(rename = "MSISDN")]
    PromptPay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankAccount => "BANKAC",
            PaymentMethod::PromptPay => "MSISDN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bankac" | "bank" | "bank-account" => Some(PaymentMethod::BankAccount),
            "msisdn" | "promptpay" => Some(PaymentMethod::PromptPay),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// The single receiving account that payment slips must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAccount {
    pub method: PaymentMethod,
    pub account: String,
}

impl PaymentAccount {
    pub fn new(method: PaymentMethod, account: impl Into<String>) -> Self {
        Self {
            method,
            account: account.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub member_id: String,
    /// Cumulative amount owed across unpaid cycles. Never negative.
    pub debt: Cents,
    pub status: MemberStatus,
    pub payment_status: PaymentStatus,
}

impl GroupMember {
    fn with_status(member_id: impl Into<String>, status: MemberStatus) -> Self {
        Self {
            member_id: member_id.into(),
            debt: 0,
            status,
            // Nothing owed yet, so nothing outstanding.
            payment_status: PaymentStatus::Paid,
        }
    }

    pub fn active(member_id: impl Into<String>) -> Self {
        Self::with_status(member_id, MemberStatus::Active)
    }

    pub fn invited(member_id: impl Into<String>) -> Self {
        Self::with_status(member_id, MemberStatus::Invited)
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Add a new cycle's share to the member's debt.
    pub fn accrue(&mut self, amount: Cents) {
        self.debt += amount.max(0);
        self.payment_status = if self.debt > 0 {
            PaymentStatus::NotPaid
        } else {
            PaymentStatus::Paid
        };
    }

    /// Reduce debt by `amount`, clamping at zero. Flips to Paid only when
    /// the debt reaches exactly zero.
    pub fn settle(&mut self, amount: Cents) {
        self.debt = (self.debt - amount.max(0)).max(0);
        if self.debt == 0 {
            self.payment_status = PaymentStatus::Paid;
        }
    }
}

/// A group of people sharing one recurring monthly charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// Total monthly charge.
    pub amount: Cents,
    /// `floor(amount / members.len())`, recomputed on membership changes.
    pub amount_per_member: Cents,
    /// Day of month (1-31) on which the group's cycle rolls over.
    pub due_day: u32,
    pub members: Vec<GroupMember>,
    pub discord_guild_id: String,
    pub owner_id: String,
    pub payment_account: PaymentAccount,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Create a group whose only member is its owner.
    pub fn new(
        id: GroupId,
        name: String,
        amount: Cents,
        due_day: u32,
        discord_guild_id: String,
        owner_id: String,
        payment_account: PaymentAccount,
    ) -> Self {
        let mut group = Self {
            id,
            name,
            amount,
            amount_per_member: 0,
            due_day,
            members: vec![GroupMember::active(owner_id.clone())],
            discord_guild_id,
            owner_id,
            payment_account,
            created_at: Utc::now(),
        };
        group.recompute_amount_per_member();
        group
    }

    pub fn is_owner(&self, member_id: &str) -> bool {
        self.owner_id == member_id
    }

    pub fn member(&self, member_id: &str) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.member_id == member_id)
    }

    pub fn member_mut(&mut self, member_id: &str) -> Option<&mut GroupMember> {
        self.members.iter_mut().find(|m| m.member_id == member_id)
    }

    /// Split the charge across every listed member, whatever their status.
    pub fn recompute_amount_per_member(&mut self) {
        self.amount_per_member = split_evenly(self.amount, self.members.len());
    }

    /// Charge one cycle to every member that has not left.
    pub fn accrue_cycle(&mut self) {
        let share = self.amount_per_member;
        for member in self.members.iter_mut() {
            if member.status != MemberStatus::Left {
                member.accrue(share);
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_active()).count()
    }
}

/// Returns true when `day` is a valid day-of-month anchor.
pub fn is_valid_due_day(day: u32) -> bool {
    (1..=31).contains(&day)
}
