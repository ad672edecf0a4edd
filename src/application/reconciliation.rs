use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{
    AMOUNT_TOLERANCE, Bill, BillId, BillStatus, Cents, GroupId, SlipVerificationResult,
    cents_from_amount, cents_to_amount, format_cents,
};
use crate::oracle::SlipVerifier;
use crate::storage::{BillStore, GroupReader};

use super::error::not_found_as;
use super::{AppError, GroupLocks};

/// How a submitted slip was classified against its bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofOutcome {
    /// Valid slip covering the amount due.
    Verified,
    /// Valid slip for less than the amount due. The bill stays submitted.
    Underpaid,
    /// The oracle did not accept the slip.
    Rejected,
}

/// Debt reduction the caller should apply after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub group_id: GroupId,
    pub member_id: String,
    pub amount: Cents,
}

/// The persisted bill together with what the oracle reported.
#[derive(Debug, Clone)]
pub struct ProofSubmission {
    pub bill: Bill,
    pub slip: SlipVerificationResult,
    pub outcome: ProofOutcome,
}

impl ProofSubmission {
    /// The settlement to hand to the group ledger, or `VerificationFailed`
    /// when the oracle rejected the slip. The bill is persisted either way.
    pub fn settlement(&self) -> Result<Settlement, AppError> {
        match self.outcome {
            ProofOutcome::Rejected => Err(AppError::VerificationFailed(self.bill.id)),
            ProofOutcome::Verified | ProofOutcome::Underpaid => Ok(Settlement {
                group_id: self.bill.group_id,
                member_id: self.bill.member_id.clone(),
                amount: self.bill.amount_paid,
            }),
        }
    }
}

/// Matches payment slips against bills.
///
/// This service only touches bills. Applying the resulting settlement to the
/// member's debt is left to the caller so both writes can be retried apart.
pub struct ReconciliationService<S, V> {
    store: S,
    verifier: V,
    locks: GroupLocks,
}

impl<S, V> ReconciliationService<S, V>
where
    S: BillStore + GroupReader,
    V: SlipVerifier,
{
    pub fn new(store: S, verifier: V, locks: GroupLocks) -> Self {
        Self {
            store,
            verifier,
            locks,
        }
    }

    async fn load_bill(&self, id: BillId) -> Result<Bill, AppError> {
        self.store
            .get_bill(id)
            .await
            .map_err(|e| not_found_as(e, || AppError::BillNotFound(id)))
    }

    async fn store_bill(&self, bill: &Bill) -> Result<Bill, AppError> {
        self.store
            .update_bill(bill)
            .await
            .map_err(|e| not_found_as(e, || AppError::BillNotFound(bill.id)))
    }

    /// Verify a payment slip for a bill and record the outcome on the bill.
    ///
    /// `claimed_amount` is what the member says they paid. It is logged for
    /// comparison only; the amount read by the oracle is what gets recorded.
    pub async fn submit_proof(
        &self,
        bill_id: BillId,
        member_id: &str,
        claimed_amount: Option<Cents>,
        image: &[u8],
        filename: &str,
    ) -> Result<ProofSubmission, AppError> {
        if bill_id <= 0 {
            return Err(AppError::InvalidInput("invalid bill_id".to_string()));
        }
        if member_id.trim().is_empty() {
            return Err(AppError::InvalidInput("member_id is required".to_string()));
        }
        if image.is_empty() {
            return Err(AppError::SlipTooSmall);
        }

        let group_id = self.load_bill(bill_id).await?.group_id;
        let _guard = self.locks.lock(group_id).await;
        let mut bill = self.load_bill(bill_id).await?;

        if bill.member_id != member_id {
            return Err(AppError::BillMemberMismatch {
                bill_id,
                owner: bill.member_id,
                submitter: member_id.to_string(),
            });
        }
        if bill.status.is_closed() {
            return Err(AppError::AlreadyVerified(bill_id));
        }

        let slip = self.verifier.verify_slip(image, filename).await?;

        let paid = cents_from_amount(slip.matched_amount);
        if let Some(claimed) = claimed_amount.filter(|c| *c != paid) {
            warn!(
                bill_id,
                claimed = %format_cents(claimed),
                read = %format_cents(paid),
                "Claimed amount differs from slip"
            );
        }

        let now = Utc::now();
        bill.stamp_submission(paid, slip.raw_response_text(), now);

        let group = self
            .store
            .get_group(bill.group_id)
            .await
            .map_err(|e| not_found_as(e, || AppError::GroupNotFound(bill.group_id)))?;

        if !slip.matches_receiver(&group.payment_account) {
            // The stamped amount stays recorded even though the slip is refused.
            self.store_bill(&bill).await?;
            let expected = format!(
                "{} {}",
                group.payment_account.method, group.payment_account.account
            );
            let actual = format!("{} {}", slip.method, slip.account);
            warn!(bill_id, %expected, %actual, "Slip paid to the wrong receiver");
            return Err(AppError::WrongReceiver { expected, actual });
        }

        // Classified on the oracle's real amount, not the rounded amount_paid.
        let outcome = if !slip.is_valid {
            bill.mark_rejected(now);
            ProofOutcome::Rejected
        } else if slip.matched_amount + AMOUNT_TOLERANCE >= cents_to_amount(bill.amount_due) {
            bill.mark_verified(now);
            ProofOutcome::Verified
        } else {
            bill.status = BillStatus::Submitted;
            ProofOutcome::Underpaid
        };

        let bill = self.store_bill(&bill).await?;
        match outcome {
            ProofOutcome::Rejected => warn!(bill_id, member_id, "Slip rejected by oracle"),
            _ => info!(
                bill_id,
                member_id,
                paid = %format_cents(bill.amount_paid),
                due = %format_cents(bill.amount_due),
                status = %bill.status,
                "Recorded payment proof"
            ),
        }

        Ok(ProofSubmission {
            bill,
            slip,
            outcome,
        })
    }
}
