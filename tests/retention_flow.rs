//! End-to-end retention behavior across the write guard, sweeper, and
//! statistics, exercised through the public library surface.

mod support;

use parley::error::{HistoryError, ParleyError, SettingsError};
use parley::history::{HistoryStore, MessageRole};
use parley::retention::UsageStats;
use parley::settings::{SettingsPatch, SettingsStore};
use support::{backdate_session, memory_env};

#[tokio::test]
async fn disabling_history_blocks_new_writes_but_keeps_old_data() {
    let env = memory_env().await;
    let services = &env.services;

    // With the default policy both writes land.
    let session = services.guard.create_session("u1", "Chat").await.unwrap();
    services
        .guard
        .append_message("u1", &session.id, MessageRole::User, "m1")
        .await
        .unwrap();
    assert_eq!(
        services.history.list_sessions("u1", None).await.unwrap().len(),
        1
    );

    // Flip the switch; the very next write is denied.
    services
        .settings
        .update(
            "u1",
            SettingsPatch {
                save_chat_history: Some(false),
                ..SettingsPatch::default()
            },
        )
        .await
        .unwrap();

    let err = services
        .guard
        .append_message("u1", &session.id, MessageRole::User, "m2")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ParleyError::History(HistoryError::HistoryDisabled)
    ));

    let create_err = services.guard.create_session("u1", "Another").await.unwrap_err();
    assert!(matches!(
        create_err,
        ParleyError::History(HistoryError::HistoryDisabled)
    ));

    // Forward-only: S1/M1 remain intact.
    let messages = services.history.list_messages("u1", &session.id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "m1");
}

#[tokio::test]
async fn seven_day_threshold_sweeps_only_the_old_session() {
    let env = memory_env().await;
    let services = &env.services;

    services
        .settings
        .update(
            "u1",
            SettingsPatch {
                auto_delete_history: Some(true),
                auto_delete_days: Some(7),
                ..SettingsPatch::default()
            },
        )
        .await
        .unwrap();

    let old = services.history.create_session("u1", "Ten days").await.unwrap();
    let young = services.history.create_session("u1", "Three days").await.unwrap();
    services
        .history
        .append_message("u1", &old.id, MessageRole::User, "stale")
        .await
        .unwrap();
    backdate_session(&env.pool, &old.id, 10).await;
    backdate_session(&env.pool, &young.id, 3).await;

    let deleted = services.sweeper.sweep("u1").await.unwrap();
    assert_eq!(deleted, 1);

    let remaining = services.history.list_sessions("u1", None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, young.id);

    // Cascade left no orphans behind.
    let orphans: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE session_id = $1")
            .bind(&old.id)
            .fetch_one(&env.pool)
            .await
            .unwrap();
    assert_eq!(orphans.0, 0);

    // Idempotency: nothing more to do.
    assert_eq!(services.sweeper.sweep("u1").await.unwrap(), 0);
}

#[tokio::test]
async fn write_path_sweep_runs_before_the_response() {
    let env = memory_env().await;
    let services = &env.services;

    services
        .settings
        .update(
            "u1",
            SettingsPatch {
                auto_delete_history: Some(true),
                auto_delete_days: Some(7),
                ..SettingsPatch::default()
            },
        )
        .await
        .unwrap();

    let stale = services.history.create_session("u1", "Stale").await.unwrap();
    backdate_session(&env.pool, &stale.id, 10).await;

    // The guard's awaited sweep makes statistics reflect the cleanup
    // immediately after the write returns.
    services.guard.create_session("u1", "Fresh").await.unwrap();

    let stats = services.stats.compute("u1").await.unwrap();
    assert_eq!(stats.session_count, 1);
}

#[tokio::test]
async fn stats_are_zero_after_clearing_history() {
    let env = memory_env().await;
    let services = &env.services;

    let session = services.guard.create_session("u1", "Chat").await.unwrap();
    services
        .guard
        .append_message("u1", &session.id, MessageRole::User, "some content")
        .await
        .unwrap();

    let before = services.stats.compute("u1").await.unwrap();
    assert_eq!(before.session_count, 1);
    assert_eq!(before.message_count, 1);
    assert!(before.estimated_bytes > 0);

    let deleted = services.sweeper.purge_all("u1").await.unwrap();
    assert_eq!(deleted, 1);

    let after = services.stats.compute("u1").await.unwrap();
    assert_eq!(after, UsageStats::default());
}

#[tokio::test]
async fn settings_validation_bounds_are_exact() {
    let env = memory_env().await;
    let services = &env.services;

    for days in [0u32, 366] {
        let err = services
            .settings
            .update(
                "u1",
                SettingsPatch {
                    auto_delete_days: Some(days),
                    ..SettingsPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)), "days={days}");
    }

    for days in [1u32, 365] {
        let updated = services
            .settings
            .update(
                "u1",
                SettingsPatch {
                    auto_delete_days: Some(days),
                    ..SettingsPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.auto_delete_days, days);
    }
}

#[tokio::test]
async fn users_never_see_each_others_sessions() {
    let env = memory_env().await;
    let services = &env.services;

    let session = services.guard.create_session("alice", "Private").await.unwrap();

    let listing = services.history.list_sessions("bob", None).await.unwrap();
    assert!(listing.is_empty());

    let err = services
        .history
        .list_messages("bob", &session.id)
        .await
        .unwrap_err();
    assert!(matches!(err, HistoryError::NotFound(_)));
}

#[tokio::test]
async fn chat_turn_round_trips_through_guard_and_provider() {
    let env = memory_env().await;
    let services = &env.services;

    let turn = services.chat.chat("u1", None, "hello engine").await.unwrap();
    assert!(turn.persisted);
    assert_eq!(turn.reply, "echo(hello engine) ctx=0");

    let session_id = turn.session_id.unwrap();
    let follow_up = services
        .chat
        .chat("u1", Some(&session_id), "and again")
        .await
        .unwrap();
    assert_eq!(follow_up.reply, "echo(and again) ctx=2");

    let stats = services.stats.compute("u1").await.unwrap();
    assert_eq!(stats.session_count, 1);
    assert_eq!(stats.message_count, 4);
}
