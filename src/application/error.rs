use thiserror::Error;

use crate::domain::{BillId, GroupId};
use crate::oracle::OracleError;
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Slip image is empty")]
    SlipTooSmall,

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Member {member_id} is not in group {group_id}")]
    MemberNotFound { group_id: GroupId, member_id: String },

    #[error("Bill not found: {0}")]
    BillNotFound(BillId),

    #[error("Nothing found: {0}")]
    NotFound(String),

    #[error("User is already a member: {0}")]
    AlreadyMember(String),

    #[error("User is already invited: {0}")]
    AlreadyInvited(String),

    #[error("User is not invited: {0}")]
    NotInvited(String),

    #[error("Only the group owner can do this (requested by {0})")]
    PermissionDenied(String),

    #[error("Member is not active in the group: {0}")]
    NotActiveMember(String),

    #[error("Member has already paid: {0}")]
    AlreadyPaid(String),

    #[error("Bill {bill_id} belongs to {owner}, not {submitter}")]
    BillMemberMismatch {
        bill_id: BillId,
        owner: String,
        submitter: String,
    },

    #[error("Bill {0} is already verified or canceled")]
    AlreadyVerified(BillId),

    #[error("Slip was paid to the wrong receiver: expected {expected}, got {actual}")]
    WrongReceiver { expected: String, actual: String },

    #[error("Slip verification failed for bill {0}")]
    VerificationFailed(BillId),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Caller-correctable input problems.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::InvalidInput(_) | AppError::SlipTooSmall)
    }

    /// The addressed resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::GroupNotFound(_)
                | AppError::MemberNotFound { .. }
                | AppError::BillNotFound(_)
                | AppError::NotFound(_)
        )
    }

    /// Business-rule rejections.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AppError::AlreadyMember(_)
                | AppError::AlreadyInvited(_)
                | AppError::NotInvited(_)
                | AppError::PermissionDenied(_)
                | AppError::NotActiveMember(_)
                | AppError::AlreadyPaid(_)
                | AppError::BillMemberMismatch { .. }
                | AppError::AlreadyVerified(_)
                | AppError::WrongReceiver { .. }
        )
    }
}

/// Maps a store failure, turning `NotFound` into the given domain error.
pub(crate) fn not_found_as(err: StoreError, missing: impl FnOnce() -> AppError) -> AppError {
    match err {
        StoreError::NotFound => missing(),
        StoreError::Database(e) => AppError::Database(e),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        not_found_as(err, || AppError::NotFound("record".to_string()))
    }
}
