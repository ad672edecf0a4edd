use tracing::info;

use crate::domain::{Bill, BillId, Cents, Cycle, GroupId};
use crate::storage::BillStore;

use super::AppError;
use super::error::not_found_as;

/// Request to open an ad hoc bill, outside of cycle rollover.
#[derive(Debug, Clone)]
pub struct NewBill {
    pub group_id: GroupId,
    pub member_id: String,
    pub year: i32,
    pub month: u32,
    pub amount_due: Cents,
    pub currency: String,
    pub description: Option<String>,
}

/// Bill creation and lookup.
pub struct BillService<S> {
    store: S,
}

impl<S: BillStore> BillService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Open a pending bill with a freshly issued id.
    pub async fn create_bill(&self, request: NewBill) -> Result<Bill, AppError> {
        if request.group_id <= 0 {
            return Err(AppError::InvalidInput("invalid group_id".to_string()));
        }
        if request.member_id.trim().is_empty() {
            return Err(AppError::InvalidInput("invalid member_id".to_string()));
        }
        if !(2000..=3000).contains(&request.year) {
            return Err(AppError::InvalidInput("invalid year".to_string()));
        }
        if !(1..=12).contains(&request.month) {
            return Err(AppError::InvalidInput("invalid month".to_string()));
        }
        if request.amount_due <= 0 {
            return Err(AppError::InvalidInput("amount_due must be > 0".to_string()));
        }
        if request.currency.trim().is_empty() {
            return Err(AppError::InvalidInput("currency is required".to_string()));
        }

        let id = self.store.next_bill_id().await?;
        let mut bill = Bill::new(
            id,
            request.group_id,
            request.member_id,
            Cycle::new(request.year, request.month),
            request.amount_due,
            request.currency,
        );
        if let Some(description) = request.description.filter(|d| !d.is_empty()) {
            bill = bill.with_description(description);
        }

        self.store.save_bill(&bill).await?;
        info!(bill_id = bill.id, group_id = bill.group_id, member_id = %bill.member_id, "Created bill");
        Ok(bill)
    }

    pub async fn get_bill(&self, id: BillId) -> Result<Bill, AppError> {
        if id <= 0 {
            return Err(AppError::InvalidInput("invalid bill_id".to_string()));
        }
        self.store
            .get_bill(id)
            .await
            .map_err(|e| not_found_as(e, || AppError::BillNotFound(id)))
    }

    /// All bills of a group, newest cycle first, then by member.
    pub async fn list_by_group(&self, group_id: GroupId) -> Result<Vec<Bill>, AppError> {
        if group_id <= 0 {
            return Err(AppError::InvalidInput("invalid group_id".to_string()));
        }
        let bills = self.store.list_bills_by_group(group_id).await?;
        non_empty(bills, || format!("no bills for group {}", group_id))
    }

    /// All bills of a member across groups, newest cycle first.
    pub async fn list_by_member(&self, member_id: &str) -> Result<Vec<Bill>, AppError> {
        if member_id.trim().is_empty() {
            return Err(AppError::InvalidInput("invalid member_id".to_string()));
        }
        let bills = self.store.list_bills_by_member(member_id).await?;
        non_empty(bills, || format!("no bills for member {}", member_id))
    }

    pub async fn list_by_group_and_member(
        &self,
        group_id: GroupId,
        member_id: &str,
    ) -> Result<Vec<Bill>, AppError> {
        if group_id <= 0 {
            return Err(AppError::InvalidInput("invalid group_id".to_string()));
        }
        if member_id.trim().is_empty() {
            return Err(AppError::InvalidInput("invalid member_id".to_string()));
        }
        let bills = self
            .store
            .list_bills_by_group_and_member(group_id, member_id)
            .await?;
        non_empty(bills, || {
            format!("no bills for member {} in group {}", member_id, group_id)
        })
    }

    /// The bill of one member for one cycle. If several exist, the oldest wins.
    pub async fn get_by_cycle(
        &self,
        group_id: GroupId,
        member_id: &str,
        cycle: Cycle,
    ) -> Result<Bill, AppError> {
        self.store
            .get_bill_by_cycle(group_id, member_id, cycle)
            .await
            .map_err(|e| {
                not_found_as(e, || {
                    AppError::NotFound(format!(
                        "no {} bill for member {} in group {}",
                        cycle, member_id, group_id
                    ))
                })
            })
    }
}

fn non_empty(bills: Vec<Bill>, describe: impl FnOnce() -> String) -> Result<Vec<Bill>, AppError> {
    if bills.is_empty() {
        return Err(AppError::NotFound(describe()));
    }
    Ok(bills)
}
