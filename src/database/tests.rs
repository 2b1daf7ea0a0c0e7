use std::ops::{Add, Sub};

use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::error::ServiceError;
use crate::models::LedgerEntryType;

use super::{AppState, DatabaseConnection};

async fn connect(pool: SqlitePool) -> DatabaseConnection {
    let _ = env_logger::builder().is_test(true).try_init();

    let app_state = AppState::from_pool(pool).await;
    DatabaseConnection {
        connection: app_state.pool.acquire().await.unwrap(),
    }
}

#[sqlx::test]
async fn test_admin_crud(pool: SqlitePool) {
    let mut db = connect(pool).await;

    assert_eq!(db.count_admins().await.unwrap(), 0);

    let alice = db.create_admin("alice", &[1u8; 48]).await.unwrap();
    let bob = db.create_admin("bob", &[2u8; 48]).await.unwrap();
    assert!(alice.id != 0);
    assert_eq!(db.count_admins().await.unwrap(), 2);

    let all_admins = db.get_all_admins().await.unwrap();
    assert_eq!(all_admins, vec![alice.clone(), bob.clone()]);

    let err = db.create_admin("alice", &[3u8; 48]).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert_eq!(db.count_admins().await.unwrap(), 2);

    assert_eq!(
        db.get_admin_by_username("alice").await.unwrap(),
        Some(alice.clone())
    );
    assert_eq!(db.get_admin_by_username("mallory").await.unwrap(), None);

    db.update_admin_password(alice.id, &[9u8; 48]).await.unwrap();
    let alice = db.get_admin_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(alice.password_hash, vec![9u8; 48]);

    let err = db.update_admin_password(4242, &[9u8; 48]).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));

    db.delete_admin(bob.id).await.unwrap();
    assert_eq!(db.count_admins().await.unwrap(), 1);

    let err = db.delete_admin(bob.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));
}

#[sqlx::test]
async fn test_session_lifecycle(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let admin = db.create_admin("alice", &[1u8; 48]).await.unwrap();

    let token = db
        .create_session_token(admin.id, Utc::now().add(Duration::hours(8)))
        .await
        .unwrap();
    let session = db
        .get_session_by_session_token(&token)
        .await
        .unwrap()
        .expect("there is a session for the token");

    assert_eq!(session.admin, admin);
    assert_eq!(session.token, token);
    assert!(session.valid_until > Utc::now());

    db.delete_session_token(&token).await.unwrap();
    assert_eq!(db.get_session_by_session_token(&token).await.unwrap(), None);

    // expired tokens are treated as absent
    let expired = db
        .create_session_token(admin.id, Utc::now().sub(Duration::minutes(1)))
        .await
        .unwrap();
    assert_eq!(db.get_session_by_session_token(&expired).await.unwrap(), None);

    // deleting the admin drops its sessions
    let token = db
        .create_session_token(admin.id, Utc::now().add(Duration::hours(8)))
        .await
        .unwrap();
    db.delete_admin(admin.id).await.unwrap();
    assert_eq!(db.get_session_by_session_token(&token).await.unwrap(), None);
}

#[sqlx::test]
async fn test_member_crud(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let kim = db.create_member("M001", "Kim", 0).await.unwrap();
    let lee = db.create_member("M002", "Lee", 0).await.unwrap();
    assert!(kim.id != 0);
    assert_eq!(kim.points, 0);

    // newest first
    let all_members = db.get_all_members(None).await.unwrap();
    assert_eq!(all_members, vec![lee.clone(), kim.clone()]);

    assert_eq!(db.get_member_by_id(kim.id).await.unwrap(), Some(kim.clone()));
    assert_eq!(db.get_member_by_id(4242).await.unwrap(), None);

    db.update_member(kim.id, "M010", "Kim Minji").await.unwrap();
    let kim = db.get_member_by_id(kim.id).await.unwrap().unwrap();
    assert_eq!(kim.member_no, "M010");
    assert_eq!(kim.name, "Kim Minji");

    let err = db.update_member(4242, "M099", "Nobody").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));

    db.delete_member(lee.id).await.unwrap();
    assert_eq!(db.get_member_by_id(lee.id).await.unwrap(), None);

    let err = db.delete_member(lee.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));
}

#[sqlx::test]
async fn test_member_no_conflict(pool: SqlitePool) {
    let mut db = connect(pool).await;

    db.create_member("M001", "Kim", 0).await.unwrap();
    let lee = db.create_member("M002", "Lee", 0).await.unwrap();

    let err = db.create_member("M001", "Park", 0).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert_eq!(db.get_all_members(None).await.unwrap().len(), 2);

    let err = db.update_member(lee.id, "M001", "Lee").await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    let lee = db.get_member_by_id(lee.id).await.unwrap().unwrap();
    assert_eq!(lee.member_no, "M002");
}

#[sqlx::test]
async fn test_member_search(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let kim = db.create_member("M001", "Kim", 0).await.unwrap();
    let lee = db.create_member("M002", "Lee", 0).await.unwrap();
    let kimberly = db.create_member("X-77", "Kimberly", 0).await.unwrap();

    let result = db.get_all_members(Some("Kim")).await.unwrap();
    assert_eq!(result, vec![kimberly.clone(), kim.clone()]);

    // matches against the member number as well
    let result = db.get_all_members(Some("M00")).await.unwrap();
    assert_eq!(result, vec![lee.clone(), kim.clone()]);

    // containment is case sensitive
    let result = db.get_all_members(Some("kim")).await.unwrap();
    assert_eq!(result, vec![]);

    let result = db.get_all_members(Some("no such member")).await.unwrap();
    assert_eq!(result, vec![]);
}

#[sqlx::test]
async fn test_initial_balance_writes_history(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let kim = db.create_member("M001", "Kim", 300).await.unwrap();
    assert_eq!(kim.points, 300);

    let history = db.get_history_by_member(kim.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry_type, LedgerEntryType::Accrue);
    assert_eq!(history[0].amount, 300);
    assert_eq!(history[0].note.as_deref(), Some(super::INITIAL_GRANT_NOTE));

    // a zero balance leaves no trace
    let lee = db.create_member("M002", "Lee", 0).await.unwrap();
    assert_eq!(db.get_history_by_member(lee.id).await.unwrap(), vec![]);
}

#[sqlx::test]
async fn test_ledger_scenario(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let kim = db.create_member("M001", "Kim", 0).await.unwrap();

    let balance = db
        .apply_ledger_entry(kim.id, LedgerEntryType::Accrue, 500, Some("bonus"))
        .await
        .unwrap();
    assert_eq!(balance, 500);

    let history = db.get_history_by_member(kim.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry_type, LedgerEntryType::Accrue);
    assert_eq!(history[0].amount, 500);
    assert_eq!(history[0].note.as_deref(), Some("bonus"));

    let balance = db
        .apply_ledger_entry(kim.id, LedgerEntryType::Consume, 200, None)
        .await
        .unwrap();
    assert_eq!(balance, 300);

    // an adjustment stores the absolute target, not the difference
    let balance = db
        .apply_ledger_entry(kim.id, LedgerEntryType::Adjust, 1000, None)
        .await
        .unwrap();
    assert_eq!(balance, 1000);
    let history = db.get_history_by_member(kim.id).await.unwrap();
    assert_eq!(history[0].entry_type, LedgerEntryType::Adjust);
    assert_eq!(history[0].amount, 1000);

    let err = db
        .apply_ledger_entry(kim.id, LedgerEntryType::Consume, 5000, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BadRequest(_)));
    let kim = db.get_member_by_id(kim.id).await.unwrap().unwrap();
    assert_eq!(kim.points, 1000);
}

#[sqlx::test]
async fn test_ledger_normalizes_signs_but_records_them(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let kim = db.create_member("M001", "Kim", 100).await.unwrap();

    let balance = db
        .apply_ledger_entry(kim.id, LedgerEntryType::Accrue, -200, None)
        .await
        .unwrap();
    assert_eq!(balance, 300);

    let balance = db
        .apply_ledger_entry(kim.id, LedgerEntryType::Consume, -50, None)
        .await
        .unwrap();
    assert_eq!(balance, 250);

    // the audit trail keeps the caller's signs
    let history = db.get_history_by_member(kim.id).await.unwrap();
    assert_eq!(history[0].amount, -50);
    assert_eq!(history[1].amount, -200);
}

#[sqlx::test]
async fn test_ledger_rejects_negative_balances(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let kim = db.create_member("M001", "Kim", 100).await.unwrap();

    let err = db
        .apply_ledger_entry(kim.id, LedgerEntryType::Consume, 101, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BadRequest(_)));

    let err = db
        .apply_ledger_entry(kim.id, LedgerEntryType::Adjust, -1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BadRequest(_)));

    // neither the balance nor the history changed
    let kim = db.get_member_by_id(kim.id).await.unwrap().unwrap();
    assert_eq!(kim.points, 100);
    assert_eq!(db.get_history_by_member(kim.id).await.unwrap().len(), 1);

    let err = db
        .apply_ledger_entry(4242, LedgerEntryType::Accrue, 100, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));
}

#[sqlx::test]
async fn test_history_window(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let kim = db.create_member("M001", "Kim", 0).await.unwrap();
    for amount in 1..=55 {
        db.apply_ledger_entry(kim.id, LedgerEntryType::Accrue, amount, None)
            .await
            .unwrap();
    }

    let history = db.get_history_by_member(kim.id).await.unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0].amount, 55);
    assert_eq!(history[49].amount, 6);
}

#[sqlx::test]
async fn test_history_fold_matches_balance(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let kim = db.create_member("M001", "Kim", 120).await.unwrap();
    let operations = [
        (LedgerEntryType::Accrue, 500),
        (LedgerEntryType::Consume, -80),
        (LedgerEntryType::Adjust, 1000),
        (LedgerEntryType::Consume, 999),
        (LedgerEntryType::Accrue, -1),
    ];
    for (entry_type, amount) in operations {
        db.apply_ledger_entry(kim.id, entry_type, amount, None)
            .await
            .unwrap();
    }

    let kim = db.get_member_by_id(kim.id).await.unwrap().unwrap();
    let mut history = db.get_history_by_member(kim.id).await.unwrap();
    history.reverse();

    let balance = history.iter().fold(0, |balance, entry| {
        entry.entry_type.apply(balance, entry.amount)
    });
    assert_eq!(balance, kim.points);
}

#[sqlx::test]
async fn test_member_delete_removes_history(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let kim = db.create_member("M001", "Kim", 500).await.unwrap();
    db.apply_ledger_entry(kim.id, LedgerEntryType::Consume, 100, None)
        .await
        .unwrap();

    db.delete_member(kim.id).await.unwrap();
    assert_eq!(db.get_member_by_id(kim.id).await.unwrap(), None);
    assert_eq!(db.get_history_by_member(kim.id).await.unwrap(), vec![]);
}

#[sqlx::test]
async fn test_stats(pool: SqlitePool) {
    let mut db = connect(pool).await;

    let today_start = Utc::now().sub(Duration::hours(1));
    let today_end = Utc::now().add(Duration::hours(1));

    let stats = db.get_stats(today_start, today_end).await.unwrap();
    assert_eq!(stats.total_members, 0);
    assert_eq!(stats.total_points, 0);
    assert_eq!(stats.today_new, 0);

    db.create_member("M001", "Kim", 100).await.unwrap();
    db.create_member("M002", "Lee", 200).await.unwrap();

    let stats = db.get_stats(today_start, today_end).await.unwrap();
    assert_eq!(stats.total_members, 2);
    assert_eq!(stats.total_points, 300);
    assert_eq!(stats.today_new, 2);

    // nobody registered tomorrow
    let stats = db
        .get_stats(today_end, today_end.add(Duration::hours(24)))
        .await
        .unwrap();
    assert_eq!(stats.total_members, 2);
    assert_eq!(stats.today_new, 0);
}
