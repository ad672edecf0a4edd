mod common;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use common::{OWNER, group_with_members, new_group, test_service};
use subshare::application::GroupUpdate;
use subshare::domain::{
    Bill, BillStatus, Cycle, Group, MemberStatus, PaymentAccount, PaymentMethod, PaymentStatus,
};
use subshare::storage::{BillStore, GroupStore, Repository, StoreError};
use tempfile::TempDir;

#[tokio::test]
async fn test_rollover_charges_every_member() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 30000, 10, &["alice", "bob"]).await?;
    assert_eq!(group.amount_per_member, 10000);

    let now = Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap();
    let report = service.rollover_cycle_at(10, now).await?;

    assert!(report.is_clean());
    assert_eq!(report.groups, vec![group.id]);
    assert_eq!(report.cycle, Cycle::new(2025, 2));
    assert_eq!(report.bills.len(), 3);

    let group = service.get_group(group.id).await?;
    for member in &group.members {
        assert_eq!(member.debt, 10000);
        assert_eq!(member.payment_status, PaymentStatus::NotPaid);
    }

    let bills = service.list_bills_by_group(group.id).await?;
    assert_eq!(bills.len(), 3);
    for bill in &bills {
        assert_eq!(bill.status, BillStatus::Submitted);
        assert_eq!(bill.amount_due, 10000);
        assert_eq!(bill.amount_paid, 0);
        assert_eq!(bill.currency, "THB");
        assert_eq!((bill.year, bill.month), (2025, 2));
        assert_eq!(bill.created_at, now);
    }
    Ok(())
}

#[tokio::test]
async fn test_rollover_only_touches_matching_due_day() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let due_today = service.create_group(new_group("A", 1000, 7)).await?;
    let due_later = service.create_group(new_group("B", 1000, 8)).await?;

    let report = service.rollover_cycle(7).await?;
    assert_eq!(report.groups, vec![due_today.id]);

    let untouched = service.get_group(due_later.id).await?;
    assert_eq!(untouched.members[0].debt, 0);
    assert!(service.list_bills_by_group(due_later.id).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_rollover_with_no_groups_is_empty() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;

    let report = service.rollover_cycle(28).await?;
    assert!(report.groups.is_empty());
    assert!(report.bills.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rollover_rejects_invalid_day() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;

    assert!(service.rollover_cycle(0).await.unwrap_err().is_validation());
    assert!(service.rollover_cycle(32).await.unwrap_err().is_validation());
    Ok(())
}

#[tokio::test]
async fn test_left_member_is_billed_but_not_charged() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 30000, 20, &["alice", "bob"]).await?;

    let mut members = group.members.clone();
    members[2].status = MemberStatus::Left;
    service
        .update_group(
            group.id,
            GroupUpdate {
                name: group.name.clone(),
                amount: group.amount,
                due_day: group.due_day,
                members,
                discord_guild_id: group.discord_guild_id.clone(),
                owner_id: group.owner_id.clone(),
                payment_account: group.payment_account.clone(),
            },
        )
        .await?;

    let report = service.rollover_cycle(20).await?;
    assert_eq!(report.bills.len(), 3);

    let group = service.get_group(group.id).await?;
    let bob = group.member("bob").unwrap();
    assert_eq!(bob.debt, 0);
    assert_eq!(bob.payment_status, PaymentStatus::Paid);
    assert_eq!(group.member("alice").unwrap().debt, 10000);

    let bob_bills = service.list_bills_by_group_and_member(group.id, "bob").await?;
    assert_eq!(bob_bills.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_debt_accumulates_and_never_goes_negative() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 2000, 12, &["alice"]).await?;

    let january = Utc.with_ymd_and_hms(2025, 1, 12, 0, 0, 0).unwrap();
    let february = Utc.with_ymd_and_hms(2025, 2, 12, 0, 0, 0).unwrap();
    service.rollover_cycle_at(12, january).await?;
    service.rollover_cycle_at(12, february).await?;

    let group = service.get_group(group.id).await?;
    assert_eq!(group.member("alice").unwrap().debt, 2000);

    let settled = service.settle_member_payment(group.id, "alice", 5000).await?;
    assert_eq!(settled.debt, 0);

    service
        .rollover_cycle_at(12, Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap())
        .await?;
    let group = service.get_group(group.id).await?;
    for member in &group.members {
        assert!(member.debt >= 0);
    }
    assert_eq!(group.member("alice").unwrap().debt, 1000);
    assert_eq!(group.member(OWNER).unwrap().debt, 3000);

    let alice_bills = service.list_bills_by_member("alice").await?;
    let cycles: Vec<_> = alice_bills.iter().map(|b| b.cycle()).collect();
    assert_eq!(
        cycles,
        vec![
            Cycle::new(2025, 3),
            Cycle::new(2025, 2),
            Cycle::new(2025, 1)
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_save_rollover_rolls_back_when_group_is_missing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;

    // Never stored, so the group write at the end of the transaction fails
    let mut group = Group::new(
        99,
        "Ghost".to_string(),
        20000,
        1,
        String::new(),
        OWNER.to_string(),
        PaymentAccount::new(PaymentMethod::PromptPay, "0812345678"),
    );
    group.accrue_cycle();
    let cycle = Cycle::new(2024, 3);
    let bills = vec![
        Bill::new(0, 99, OWNER, cycle, 20000, "THB"),
        Bill::new(0, 99, "alice", cycle, 20000, "THB"),
    ];

    let result = repo.save_rollover(&group, bills).await;
    assert!(matches!(result, Err(StoreError::NotFound)));

    assert!(repo.list_bills_by_group(99).await?.is_empty());
    // The bill ids drawn inside the transaction were given back
    assert_eq!(repo.next_bill_id().await?, 1);
    Ok(())
}
