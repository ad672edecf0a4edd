mod common;

use anyhow::Result;
use common::{OWNER, group_with_members, new_group, test_service};
use subshare::application::{AppError, GroupUpdate};
use subshare::domain::{GroupMember, MemberStatus, PaymentStatus};

#[tokio::test]
async fn test_create_group_owner_is_sole_member() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;

    let group = service.create_group(new_group("Music", 15999, 5)).await?;

    assert_eq!(group.members.len(), 1);
    assert_eq!(group.members[0].member_id, OWNER);
    assert_eq!(group.members[0].status, MemberStatus::Active);
    assert_eq!(group.members[0].debt, 0);
    assert_eq!(group.amount_per_member, 15999);

    let loaded = service.get_group(group.id).await?;
    assert_eq!(loaded.name, "Music");
    assert_eq!(loaded.members, group.members);
    Ok(())
}

#[tokio::test]
async fn test_create_group_validation() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;

    let mut request = new_group("", 1000, 1);
    assert!(matches!(
        service.create_group(request.clone()).await,
        Err(AppError::InvalidInput(_))
    ));

    request.name = "Music".to_string();
    request.amount = 0;
    assert!(service.create_group(request.clone()).await.unwrap_err().is_validation());

    request.amount = 1000;
    request.due_day = 32;
    assert!(service.create_group(request.clone()).await.unwrap_err().is_validation());

    request.due_day = 1;
    request.owner_id = " ".to_string();
    assert!(service.create_group(request).await.unwrap_err().is_validation());
    Ok(())
}

#[tokio::test]
async fn test_group_ids_are_not_reused() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;

    let first = service.create_group(new_group("A", 1000, 1)).await?;
    service.delete_group(first.id).await?;
    let second = service.create_group(new_group("B", 1000, 1)).await?;

    assert!(second.id > first.id);
    Ok(())
}

#[tokio::test]
async fn test_get_missing_group() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;

    assert!(matches!(
        service.get_group(42).await,
        Err(AppError::GroupNotFound(42))
    ));
    assert!(service.get_group(0).await.unwrap_err().is_validation());
    Ok(())
}

#[tokio::test]
async fn test_only_owner_can_invite() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 30000, 1, &["alice"]).await?;

    let result = service
        .invite_members(group.id, "alice", &["bob".to_string()])
        .await;
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));

    let unchanged = service.get_group(group.id).await?;
    assert_eq!(unchanged.members.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_invite_active_member_changes_nothing() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 30000, 1, &["alice"]).await?;

    // "carol" is fine on her own, but "alice" is already in
    let result = service
        .invite_members(group.id, OWNER, &["carol".to_string(), "alice".to_string()])
        .await;
    assert!(matches!(result, Err(AppError::AlreadyMember(id)) if id == "alice"));

    let unchanged = service.get_group(group.id).await?;
    assert_eq!(unchanged.members, group.members);
    assert!(unchanged.member("carol").is_none());
    Ok(())
}

#[tokio::test]
async fn test_invite_pending_member_twice() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = service.create_group(new_group("Music", 1000, 1)).await?;

    service
        .invite_members(group.id, OWNER, &["bob".to_string()])
        .await?;
    let again = service
        .invite_members(group.id, OWNER, &["bob".to_string()])
        .await;
    assert!(matches!(again, Err(AppError::AlreadyInvited(_))));

    let duplicate = service
        .invite_members(group.id, OWNER, &["eve".to_string(), "eve".to_string()])
        .await;
    assert!(duplicate.unwrap_err().is_validation());

    let empty = service.invite_members(group.id, OWNER, &[]).await;
    assert!(empty.unwrap_err().is_validation());
    Ok(())
}

#[tokio::test]
async fn test_accept_invite_splits_across_all_listed_members() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = service.create_group(new_group("Video", 1000, 1)).await?;

    service
        .invite_members(group.id, OWNER, &["alice".to_string(), "bob".to_string()])
        .await?;
    let group = service.accept_invite(group.id, "alice").await?;

    // bob has not accepted yet but still counts: floor(1000 / 3)
    assert_eq!(group.amount_per_member, 333);
    assert_eq!(group.member("alice").unwrap().status, MemberStatus::Active);
    assert_eq!(group.member("bob").unwrap().status, MemberStatus::Invited);

    let group = service.accept_invite(group.id, "bob").await?;
    assert_eq!(group.amount_per_member, 333);
    assert_eq!(group.active_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_accept_without_invite() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 1000, 1, &["alice"]).await?;

    assert!(matches!(
        service.accept_invite(group.id, "mallory").await,
        Err(AppError::NotInvited(_))
    ));
    // Already active is not a pending invite either
    assert!(matches!(
        service.accept_invite(group.id, "alice").await,
        Err(AppError::NotInvited(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_reinvite_member_who_left() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 2000, 1, &["alice"]).await?;

    let mut members = group.members.clone();
    members[1].status = MemberStatus::Left;
    service
        .update_group(group.id, update_from(&group, members))
        .await?;

    let group = service
        .invite_members(group.id, OWNER, &["alice".to_string()])
        .await?;
    assert_eq!(group.members.len(), 2);
    assert_eq!(group.member("alice").unwrap().status, MemberStatus::Invited);
    Ok(())
}

#[tokio::test]
async fn test_update_group_replaces_fields() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 30000, 1, &["alice"]).await?;

    let mut members = group.members.clone();
    members.push(GroupMember::active("bob"));
    let mut update = update_from(&group, members);
    update.name = "Family plan".to_string();
    update.amount = 45000;
    update.due_day = 15;

    let updated = service.update_group(group.id, update).await?;
    assert_eq!(updated.id, group.id);
    assert_eq!(updated.created_at, group.created_at);
    assert_eq!(updated.due_day, 15);
    assert_eq!(updated.amount_per_member, 15000);

    let loaded = service.get_group(group.id).await?;
    assert_eq!(loaded.name, "Family plan");
    assert_eq!(loaded.members.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_update_group_validation() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = service.create_group(new_group("Music", 1000, 1)).await?;

    let empty = service.update_group(group.id, update_from(&group, Vec::new())).await;
    assert!(empty.unwrap_err().is_validation());

    let twice = vec![GroupMember::active(OWNER), GroupMember::active(OWNER)];
    let duplicate = service.update_group(group.id, update_from(&group, twice)).await;
    assert!(duplicate.unwrap_err().is_validation());

    let missing = service
        .update_group(999, update_from(&group, group.members.clone()))
        .await;
    assert!(matches!(missing, Err(AppError::GroupNotFound(999))));
    Ok(())
}

#[tokio::test]
async fn test_update_group_rejects_paid_member_with_debt() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 20000, 1, &["alice"]).await?;

    let mut members = group.members.clone();
    members[1].debt = 5000;
    let result = service.update_group(group.id, update_from(&group, members)).await;
    assert!(result.unwrap_err().is_validation());

    let mut members = group.members.clone();
    members[1].payment_status = PaymentStatus::NotPaid;
    let result = service.update_group(group.id, update_from(&group, members)).await;
    assert!(result.unwrap_err().is_validation());

    // Nothing was written, so alice can still be charged and settle
    let stored = service.get_group(group.id).await?;
    assert_eq!(stored.members, group.members);
    service.rollover_cycle(1).await?;
    let settled = service.settle_member_payment(group.id, "alice", 10000).await?;
    assert_eq!(settled.payment_status, PaymentStatus::Paid);
    Ok(())
}

#[tokio::test]
async fn test_update_group_requires_owner_in_members() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 20000, 1, &["alice"]).await?;

    let without_owner: Vec<GroupMember> = group
        .members
        .iter()
        .filter(|m| m.member_id != OWNER)
        .cloned()
        .collect();
    let result = service
        .update_group(group.id, update_from(&group, without_owner))
        .await;
    assert!(result.unwrap_err().is_validation());

    // Handing ownership to an existing member is fine
    let mut update = update_from(&group, group.members.clone());
    update.owner_id = "alice".to_string();
    let updated = service.update_group(group.id, update).await?;
    assert!(updated.is_owner("alice"));
    assert!(updated.member(OWNER).is_some());
    Ok(())
}

#[tokio::test]
async fn test_delete_group_keeps_bills() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 2000, 3, &["alice"]).await?;
    service.rollover_cycle(3).await?;

    service.delete_group(group.id).await?;

    assert!(service.get_group(group.id).await.unwrap_err().is_not_found());
    assert_eq!(service.list_bills_by_group(group.id).await?.len(), 2);
    assert!(matches!(
        service.delete_group(group.id).await,
        Err(AppError::GroupNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_settle_payment_clamps_and_flips_status() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 20000, 1, &["alice"]).await?;
    service.rollover_cycle(1).await?;

    let partial = service.settle_member_payment(group.id, "alice", 4000).await?;
    assert_eq!(partial.debt, 6000);
    assert_eq!(partial.payment_status, PaymentStatus::NotPaid);

    let full = service.settle_member_payment(group.id, "alice", 9999).await?;
    assert_eq!(full.debt, 0);
    assert_eq!(full.payment_status, PaymentStatus::Paid);

    let again = service.settle_member_payment(group.id, "alice", 100).await;
    assert!(matches!(again, Err(AppError::AlreadyPaid(_))));

    let stored = service.get_group(group.id).await?;
    assert_eq!(stored.member("alice").unwrap().debt, 0);
    Ok(())
}

#[tokio::test]
async fn test_settle_zero_changes_nothing() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = group_with_members(&service, 20000, 1, &["alice"]).await?;
    service.rollover_cycle(1).await?;
    let before = service.get_group(group.id).await?;

    let settled = service.settle_member_payment(group.id, "alice", 0).await?;
    assert_eq!(&settled, before.member("alice").unwrap());

    // A member with nothing owed is rejected without touching state
    service.settle_member_payment(group.id, OWNER, 10000).await?;
    let paid = service.get_group(group.id).await?;
    assert!(service.settle_member_payment(group.id, OWNER, 0).await.is_err());
    assert_eq!(service.get_group(group.id).await?.members, paid.members);
    Ok(())
}

#[tokio::test]
async fn test_settle_rejections() -> Result<()> {
    let (service, _verifier, _temp) = test_service().await?;
    let group = service.create_group(new_group("Music", 2000, 1)).await?;
    service
        .invite_members(group.id, OWNER, &["bob".to_string()])
        .await?;
    service.rollover_cycle(1).await?;

    assert!(matches!(
        service.settle_member_payment(group.id, "bob", 100).await,
        Err(AppError::NotActiveMember(_))
    ));
    assert!(matches!(
        service.settle_member_payment(group.id, "nobody", 100).await,
        Err(AppError::MemberNotFound { .. })
    ));
    assert!(service
        .settle_member_payment(group.id, OWNER, -1)
        .await
        .unwrap_err()
        .is_validation());
    assert!(service
        .settle_member_payment(0, OWNER, 100)
        .await
        .unwrap_err()
        .is_validation());
    assert!(service
        .settle_member_payment(77, OWNER, 100)
        .await
        .unwrap_err()
        .is_not_found());
    Ok(())
}

fn update_from(group: &subshare::domain::Group, members: Vec<GroupMember>) -> GroupUpdate {
    GroupUpdate {
        name: group.name.clone(),
        amount: group.amount,
        due_day: group.due_day,
        members,
        discord_guild_id: group.discord_guild_id.clone(),
        owner_id: group.owner_id.clone(),
        payment_account: group.payment_account.clone(),
    }
}
