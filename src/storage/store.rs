use std::future::Future;

use thiserror::Error;

use crate::domain::{Bill, BillId, Cycle, Group, GroupId};

/// Failure at the store boundary. `NotFound` is kept apart from backend
/// failures so callers can report a missing resource.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only view of groups.
pub trait GroupReader: Send + Sync {
    fn get_group(&self, id: GroupId) -> impl Future<Output = StoreResult<Group>> + Send;

    /// Groups whose cycle anchor is `day`. Empty when none match.
    fn list_groups_by_due_day(&self, day: u32)
    -> impl Future<Output = StoreResult<Vec<Group>>> + Send;
}

/// Group persistence.
pub trait GroupStore: GroupReader {
    fn next_group_id(&self) -> impl Future<Output = StoreResult<GroupId>> + Send;

    fn save_group(&self, group: &Group) -> impl Future<Output = StoreResult<()>> + Send;

    fn update_group(
        &self,
        id: GroupId,
        group: &Group,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Hard delete. Bills of the group are left in place.
    fn delete_group(&self, id: GroupId) -> impl Future<Output = StoreResult<()>> + Send;

    /// Persist one group's rolled-over member list together with the cycle's
    /// new bills as a single atomic unit. Bill ids are issued inside the unit
    /// and the saved bills are returned.
    fn save_rollover(
        &self,
        group: &Group,
        bills: Vec<Bill>,
    ) -> impl Future<Output = StoreResult<Vec<Bill>>> + Send;
}

/// Bill persistence. List queries return an empty vector when nothing matches.
pub trait BillStore: Send + Sync {
    fn next_bill_id(&self) -> impl Future<Output = StoreResult<BillId>> + Send;

    fn save_bill(&self, bill: &Bill) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_bill(&self, id: BillId) -> impl Future<Output = StoreResult<Bill>> + Send;

    fn get_bill_by_cycle(
        &self,
        group_id: GroupId,
        member_id: &str,
        cycle: Cycle,
    ) -> impl Future<Output = StoreResult<Bill>> + Send;

    /// Newest cycle first.
    fn list_bills_by_group_and_member(
        &self,
        group_id: GroupId,
        member_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<Bill>>> + Send;

    /// Newest cycle first.
    fn list_bills_by_member(
        &self,
        member_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<Bill>>> + Send;

    /// Newest cycle first, then by member id.
    fn list_bills_by_group(
        &self,
        group_id: GroupId,
    ) -> impl Future<Output = StoreResult<Vec<Bill>>> + Send;

    fn update_bill(&self, bill: &Bill) -> impl Future<Output = StoreResult<Bill>> + Send;
}
