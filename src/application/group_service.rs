use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::{
    Bill, BillStatus, Cents, Cycle, Group, GroupId, GroupMember, MemberStatus, PaymentAccount,
    format_cents, is_valid_due_day,
};
use crate::storage::GroupStore;

use super::error::not_found_as;
use super::{AppError, GroupLocks};

/// Request to create a group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub amount: Cents,
    pub due_day: u32,
    pub discord_guild_id: String,
    pub owner_id: String,
    pub payment_account: PaymentAccount,
}

/// Wholesale replacement of a group's editable fields.
#[derive(Debug, Clone)]
pub struct GroupUpdate {
    pub name: String,
    pub amount: Cents,
    pub due_day: u32,
    pub members: Vec<GroupMember>,
    pub discord_guild_id: String,
    pub owner_id: String,
    pub payment_account: PaymentAccount,
}

/// A group whose cycle could not be rolled over.
#[derive(Debug)]
pub struct RolloverFailure {
    pub group_id: GroupId,
    pub error: AppError,
}

/// Result of rolling over every group anchored on one due day.
#[derive(Debug)]
pub struct RolloverReport {
    pub due_day: u32,
    pub cycle: Cycle,
    pub groups: Vec<GroupId>,
    pub bills: Vec<Bill>,
    pub failures: Vec<RolloverFailure>,
}

impl RolloverReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns group lifecycle, membership and member debt.
pub struct GroupService<S> {
    store: S,
    locks: GroupLocks,
    currency: String,
}

fn validate_fields(
    name: &str,
    amount: Cents,
    due_day: u32,
    discord_guild_id: &str,
    owner_id: &str,
    payment_account: &PaymentAccount,
) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidInput("group name is required".to_string()));
    }
    if amount <= 0 {
        return Err(AppError::InvalidInput("amount must be > 0".to_string()));
    }
    if !is_valid_due_day(due_day) {
        return Err(AppError::InvalidInput(
            "due_day must be between 1 and 31".to_string(),
        ));
    }
    if discord_guild_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "discord_guild_id is required".to_string(),
        ));
    }
    if owner_id.trim().is_empty() {
        return Err(AppError::InvalidInput("owner_id is required".to_string()));
    }
    if payment_account.account.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "payment account is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_group_id(group_id: GroupId) -> Result<(), AppError> {
    if group_id <= 0 {
        return Err(AppError::InvalidInput("invalid group_id".to_string()));
    }
    Ok(())
}

fn validate_member_id(member_id: &str) -> Result<(), AppError> {
    if member_id.trim().is_empty() {
        return Err(AppError::InvalidInput("member_id is required".to_string()));
    }
    Ok(())
}

fn validate_members(members: &[GroupMember], owner_id: &str) -> Result<(), AppError> {
    if members.is_empty() {
        return Err(AppError::InvalidInput(
            "at least one member is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for member in members {
        validate_member_id(&member.member_id)?;
        if !seen.insert(member.member_id.as_str()) {
            return Err(AppError::InvalidInput(format!(
                "duplicate member: {}",
                member.member_id
            )));
        }
        if member.debt < 0 {
            return Err(AppError::InvalidInput(format!(
                "negative debt for member: {}",
                member.member_id
            )));
        }
        // Paid exactly when nothing is owed.
        if member.is_paid() != (member.debt == 0) {
            return Err(AppError::InvalidInput(format!(
                "payment status {} does not match debt {} for member: {}",
                member.payment_status,
                format_cents(member.debt),
                member.member_id
            )));
        }
    }
    if !members.iter().any(|m| m.member_id == owner_id) {
        return Err(AppError::InvalidInput(format!(
            "owner {} must be a member",
            owner_id
        )));
    }
    Ok(())
}

impl<S: GroupStore> GroupService<S> {
    pub fn new(store: S, locks: GroupLocks, currency: impl Into<String>) -> Self {
        Self {
            store,
            locks,
            currency: currency.into(),
        }
    }

    async fn load(&self, id: GroupId) -> Result<Group, AppError> {
        self.store
            .get_group(id)
            .await
            .map_err(|e| not_found_as(e, || AppError::GroupNotFound(id)))
    }

    async fn store_group(&self, group: &Group) -> Result<(), AppError> {
        self.store
            .update_group(group.id, group)
            .await
            .map_err(|e| not_found_as(e, || AppError::GroupNotFound(group.id)))
    }

    /// Create a group. The owner becomes its sole, active member.
    pub async fn create_group(&self, request: NewGroup) -> Result<Group, AppError> {
        validate_fields(
            &request.name,
            request.amount,
            request.due_day,
            &request.discord_guild_id,
            &request.owner_id,
            &request.payment_account,
        )?;

        let id = self.store.next_group_id().await?;
        let group = Group::new(
            id,
            request.name,
            request.amount,
            request.due_day,
            request.discord_guild_id,
            request.owner_id,
            request.payment_account,
        );

        self.store.save_group(&group).await?;
        info!(group_id = group.id, owner = %group.owner_id, "Created group");
        Ok(group)
    }

    pub async fn get_group(&self, id: GroupId) -> Result<Group, AppError> {
        validate_group_id(id)?;
        self.load(id).await
    }

    /// Replace a group's fields wholesale, keeping its id and creation time.
    pub async fn update_group(&self, id: GroupId, update: GroupUpdate) -> Result<Group, AppError> {
        validate_group_id(id)?;
        validate_fields(
            &update.name,
            update.amount,
            update.due_day,
            &update.discord_guild_id,
            &update.owner_id,
            &update.payment_account,
        )?;
        validate_members(&update.members, &update.owner_id)?;

        let _guard = self.locks.lock(id).await;
        let existing = self.load(id).await?;

        let mut group = Group {
            id: existing.id,
            name: update.name,
            amount: update.amount,
            amount_per_member: 0,
            due_day: update.due_day,
            members: update.members,
            discord_guild_id: update.discord_guild_id,
            owner_id: update.owner_id,
            payment_account: update.payment_account,
            created_at: existing.created_at,
        };
        group.recompute_amount_per_member();

        self.store_group(&group).await?;
        info!(group_id = id, "Updated group");
        Ok(group)
    }

    /// Hard delete. The group's bills stay in the store.
    pub async fn delete_group(&self, id: GroupId) -> Result<(), AppError> {
        validate_group_id(id)?;
        {
            let _guard = self.locks.lock(id).await;
            self.store
                .delete_group(id)
                .await
                .map_err(|e| not_found_as(e, || AppError::GroupNotFound(id)))?;
        }
        self.locks.forget(id);
        info!(group_id = id, "Deleted group");
        Ok(())
    }

    /// Invite members to a group. Only the owner may invite, and either every
    /// id is invited or none is.
    pub async fn invite_members(
        &self,
        group_id: GroupId,
        requester_id: &str,
        member_ids: &[String],
    ) -> Result<Group, AppError> {
        validate_group_id(group_id)?;
        validate_member_id(requester_id)?;
        if member_ids.is_empty() {
            return Err(AppError::InvalidInput(
                "at least one member is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for id in member_ids {
            validate_member_id(id)?;
            if !seen.insert(id.as_str()) {
                return Err(AppError::InvalidInput(format!("duplicate member: {}", id)));
            }
        }

        let _guard = self.locks.lock(group_id).await;
        let mut group = self.load(group_id).await?;

        if !group.is_owner(requester_id) {
            return Err(AppError::PermissionDenied(requester_id.to_string()));
        }

        // Check every target before touching the member list.
        for id in member_ids {
            match group.member(id).map(|m| m.status) {
                Some(MemberStatus::Active) => return Err(AppError::AlreadyMember(id.clone())),
                Some(MemberStatus::Invited) => return Err(AppError::AlreadyInvited(id.clone())),
                Some(MemberStatus::Left) | None => {}
            }
        }

        for id in member_ids {
            match group.member_mut(id) {
                // A member who left keeps their entry and debt history.
                Some(member) => member.status = MemberStatus::Invited,
                None => group.members.push(GroupMember::invited(id.clone())),
            }
        }

        self.store_group(&group).await?;
        info!(group_id, count = member_ids.len(), "Invited members");
        Ok(group)
    }

    /// Turn a pending invite into an active membership.
    pub async fn accept_invite(&self, group_id: GroupId, member_id: &str) -> Result<Group, AppError> {
        validate_group_id(group_id)?;
        validate_member_id(member_id)?;

        let _guard = self.locks.lock(group_id).await;
        let mut group = self.load(group_id).await?;

        let member = group
            .members
            .iter_mut()
            .find(|m| m.member_id == member_id && m.status == MemberStatus::Invited)
            .ok_or_else(|| AppError::NotInvited(member_id.to_string()))?;
        member.status = MemberStatus::Active;

        // Splits across every listed member, including pending invites and
        // members who left, not only active ones.
        group.recompute_amount_per_member();

        self.store_group(&group).await?;
        info!(
            group_id,
            member_id,
            amount_per_member = %format_cents(group.amount_per_member),
            "Member accepted invite"
        );
        Ok(group)
    }

    /// Open a new cycle for every group anchored on `due_day`.
    pub async fn rollover_cycle(&self, due_day: u32) -> Result<RolloverReport, AppError> {
        self.rollover_cycle_at(due_day, Utc::now()).await
    }

    /// Open a new cycle for every group anchored on `due_day`, billing the
    /// calendar month of `now`.
    ///
    /// Each non-left member accrues the per-member share as debt, and every
    /// listed member gets a new submitted bill. Each group is written as one
    /// atomic unit; a group that fails is reported and the others proceed.
    pub async fn rollover_cycle_at(
        &self,
        due_day: u32,
        now: DateTime<Utc>,
    ) -> Result<RolloverReport, AppError> {
        if !is_valid_due_day(due_day) {
            return Err(AppError::InvalidInput(
                "due_day must be between 1 and 31".to_string(),
            ));
        }

        let cycle = Cycle::of(now);
        let candidates = self.store.list_groups_by_due_day(due_day).await?;

        let mut report = RolloverReport {
            due_day,
            cycle,
            groups: Vec::new(),
            bills: Vec::new(),
            failures: Vec::new(),
        };

        for candidate in candidates {
            match self.rollover_group(candidate.id, due_day, cycle, now).await {
                Ok(Some(bills)) => {
                    report.groups.push(candidate.id);
                    report.bills.extend(bills);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(group_id = candidate.id, %error, "Rollover failed for group");
                    report.failures.push(RolloverFailure {
                        group_id: candidate.id,
                        error,
                    });
                }
            }
        }

        info!(
            due_day,
            %cycle,
            groups = report.groups.len(),
            bills = report.bills.len(),
            failures = report.failures.len(),
            "Cycle rollover finished"
        );
        Ok(report)
    }

    /// Returns `None` when the group moved to another due day meanwhile.
    async fn rollover_group(
        &self,
        group_id: GroupId,
        due_day: u32,
        cycle: Cycle,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<Bill>>, AppError> {
        let _guard = self.locks.lock(group_id).await;
        let mut group = self.load(group_id).await?;
        if group.due_day != due_day {
            return Ok(None);
        }

        group.accrue_cycle();

        // Left members still get a bill for the cycle.
        let bills = group
            .members
            .iter()
            .map(|member| {
                let mut bill = Bill::new(
                    0,
                    group.id,
                    member.member_id.clone(),
                    cycle,
                    group.amount_per_member,
                    self.currency.clone(),
                )
                .with_status(BillStatus::Submitted);
                bill.created_at = now;
                bill.updated_at = now;
                bill
            })
            .collect();

        let saved = self
            .store
            .save_rollover(&group, bills)
            .await
            .map_err(|e| not_found_as(e, || AppError::GroupNotFound(group_id)))?;
        Ok(Some(saved))
    }

    /// Reduce a member's debt by a paid amount, clamping at zero.
    pub async fn settle_member_payment(
        &self,
        group_id: GroupId,
        member_id: &str,
        amount: Cents,
    ) -> Result<GroupMember, AppError> {
        validate_group_id(group_id)?;
        validate_member_id(member_id)?;
        if amount < 0 {
            return Err(AppError::InvalidInput("amount must be >= 0".to_string()));
        }

        let _guard = self.locks.lock(group_id).await;
        let mut group = self.load(group_id).await?;

        let member = group
            .member_mut(member_id)
            .ok_or_else(|| AppError::MemberNotFound {
                group_id,
                member_id: member_id.to_string(),
            })?;

        if !member.is_active() {
            return Err(AppError::NotActiveMember(member_id.to_string()));
        }
        if member.is_paid() {
            return Err(AppError::AlreadyPaid(member_id.to_string()));
        }

        member.settle(amount);
        let settled = member.clone();

        self.store_group(&group).await?;
        info!(
            group_id,
            member_id,
            paid = %format_cents(amount),
            remaining = %format_cents(settled.debt),
            "Settled member payment"
        );
        Ok(settled)
    }
}
