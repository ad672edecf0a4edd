use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::Config;
use crate::domain::{Bill, BillId, Cents, Cycle, Group, GroupId, GroupMember};
use crate::oracle::{EasySlipClient, SlipVerifier};
use crate::storage::Repository;

use super::{
    AppError, BillService, GroupLocks, GroupService, GroupUpdate, NewBill, NewGroup,
    ProofSubmission, ReconciliationService, RolloverReport,
};

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, bot, API, etc.).
pub struct LedgerService<V = EasySlipClient> {
    groups: Arc<GroupService<Repository>>,
    bills: BillService<Repository>,
    reconciliation: ReconciliationService<Repository, V>,
}

/// Result of submitting a slip and applying it to the member's debt.
#[derive(Debug)]
pub struct SettledSubmission {
    pub submission: ProofSubmission,
    /// The member after settlement. An error here never undoes the bill write.
    pub settlement: Result<GroupMember, AppError>,
}

impl LedgerService<EasySlipClient> {
    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, config: &Config) -> Result<Self, AppError> {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Self::with_config(repo, config)
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, config: &Config) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Self::with_config(repo, config)
    }

    fn with_config(repo: Repository, config: &Config) -> Result<Self, AppError> {
        let verifier = EasySlipClient::new(&config.oracle)?;
        if !verifier.is_configured() {
            debug!("Slip oracle not configured, proof submissions will fail");
        }
        Ok(Self::new(repo, verifier, config.currency.clone()))
    }
}

impl<V: SlipVerifier> LedgerService<V> {
    /// Wire the services over one repository. `currency` is stamped on
    /// bills opened by a rollover.
    pub fn new(repo: Repository, verifier: V, currency: impl Into<String>) -> Self {
        let locks = GroupLocks::new();
        Self {
            groups: Arc::new(GroupService::new(repo.clone(), locks.clone(), currency)),
            bills: BillService::new(repo.clone()),
            reconciliation: ReconciliationService::new(repo, verifier, locks),
        }
    }

    /// Shared handle to the group service, for background tasks.
    pub fn group_service(&self) -> Arc<GroupService<Repository>> {
        Arc::clone(&self.groups)
    }

    // ========================
    // Group operations
    // ========================

    pub async fn create_group(&self, request: NewGroup) -> Result<Group, AppError> {
        self.groups.create_group(request).await
    }

    pub async fn get_group(&self, id: GroupId) -> Result<Group, AppError> {
        self.groups.get_group(id).await
    }

    pub async fn update_group(&self, id: GroupId, update: GroupUpdate) -> Result<Group, AppError> {
        self.groups.update_group(id, update).await
    }

    pub async fn delete_group(&self, id: GroupId) -> Result<(), AppError> {
        self.groups.delete_group(id).await
    }

    pub async fn invite_members(
        &self,
        group_id: GroupId,
        requester_id: &str,
        member_ids: &[String],
    ) -> Result<Group, AppError> {
        self.groups
            .invite_members(group_id, requester_id, member_ids)
            .await
    }

    pub async fn accept_invite(&self, group_id: GroupId, member_id: &str) -> Result<Group, AppError> {
        self.groups.accept_invite(group_id, member_id).await
    }

    pub async fn settle_member_payment(
        &self,
        group_id: GroupId,
        member_id: &str,
        amount: Cents,
    ) -> Result<GroupMember, AppError> {
        self.groups
            .settle_member_payment(group_id, member_id, amount)
            .await
    }

    pub async fn rollover_cycle(&self, due_day: u32) -> Result<RolloverReport, AppError> {
        self.groups.rollover_cycle(due_day).await
    }

    pub async fn rollover_cycle_at(
        &self,
        due_day: u32,
        now: DateTime<Utc>,
    ) -> Result<RolloverReport, AppError> {
        self.groups.rollover_cycle_at(due_day, now).await
    }

    // ========================
    // Bill operations
    // ========================

    pub async fn create_bill(&self, request: NewBill) -> Result<Bill, AppError> {
        self.bills.create_bill(request).await
    }

    pub async fn get_bill(&self, id: BillId) -> Result<Bill, AppError> {
        self.bills.get_bill(id).await
    }

    pub async fn list_bills_by_group(&self, group_id: GroupId) -> Result<Vec<Bill>, AppError> {
        self.bills.list_by_group(group_id).await
    }

    pub async fn list_bills_by_member(&self, member_id: &str) -> Result<Vec<Bill>, AppError> {
        self.bills.list_by_member(member_id).await
    }

    pub async fn list_bills_by_group_and_member(
        &self,
        group_id: GroupId,
        member_id: &str,
    ) -> Result<Vec<Bill>, AppError> {
        self.bills
            .list_by_group_and_member(group_id, member_id)
            .await
    }

    pub async fn get_bill_by_cycle(
        &self,
        group_id: GroupId,
        member_id: &str,
        cycle: Cycle,
    ) -> Result<Bill, AppError> {
        self.bills.get_by_cycle(group_id, member_id, cycle).await
    }

    // ========================
    // Payment proofs
    // ========================

    pub async fn submit_proof(
        &self,
        bill_id: BillId,
        member_id: &str,
        claimed_amount: Option<Cents>,
        image: &[u8],
        filename: &str,
    ) -> Result<ProofSubmission, AppError> {
        self.reconciliation
            .submit_proof(bill_id, member_id, claimed_amount, image, filename)
            .await
    }

    /// Submit a slip, then reduce the member's debt by the amount it shows.
    ///
    /// Errors from the submission itself are returned as `Err`. Once the bill
    /// is written, the outcome of the debt update is reported in
    /// [`SettledSubmission::settlement`] instead.
    pub async fn submit_and_settle(
        &self,
        bill_id: BillId,
        member_id: &str,
        claimed_amount: Option<Cents>,
        image: &[u8],
        filename: &str,
    ) -> Result<SettledSubmission, AppError> {
        let submission = self
            .submit_proof(bill_id, member_id, claimed_amount, image, filename)
            .await?;

        let settlement = match submission.settlement() {
            Ok(s) => {
                self.groups
                    .settle_member_payment(s.group_id, &s.member_id, s.amount)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &settlement {
            warn!(bill_id, member_id, error = %e, "Payment recorded on bill but not settled");
        }

        Ok(SettledSubmission {
            submission,
            settlement,
        })
    }
}
