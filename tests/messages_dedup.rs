#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use tokio::time::sleep;

use saccodesk::models::{InviteStatus, Member, MessageStatus};
use saccodesk::state::{
    conversations, count_unread_admin_messages, count_unread_user_messages, is_typing,
    list_all_members, list_conversation, mark_read, remove_duplicates, roster_invite,
    roster_status, save_members, scan_duplicates, send_admin_reply, send_user_message,
    set_typing, sync_roster_member, typing_key, ROSTER_PERIOD,
};

#[tokio::test]
async fn chat_round_trip_tracks_unread_and_typing() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let state = ctx.state.clone();
    let user = ctx.member("chat@example.com").await;
    let uid = user.id.unwrap();

    assert!(send_user_message(&state, &user, "   ").await.unwrap().is_none());
    send_user_message(&state, &user, "Hello office").await.unwrap().unwrap();
    sleep(Duration::from_millis(5)).await;
    send_user_message(&state, &user, "Any news on my loan?").await.unwrap().unwrap();
    assert_eq!(count_unread_user_messages(&state).await.unwrap(), 2);

    let convs = conversations(&state).await.unwrap();
    assert_eq!(convs.len(), 1);
    assert_eq!(convs[0].user_id, uid);
    assert_eq!(convs[0].name, "Test Member");
    assert_eq!(convs[0].last_message, "Any news on my loan?");
    assert!(convs[0].unread);

    assert_eq!(mark_read(&state, &uid, true).await.unwrap(), 2);
    assert_eq!(count_unread_user_messages(&state).await.unwrap(), 0);
    assert!(!conversations(&state).await.unwrap()[0].unread);

    sleep(Duration::from_millis(5)).await;
    send_admin_reply(&state, &uid, "Approved today").await.unwrap().unwrap();
    assert_eq!(count_unread_admin_messages(&state, &uid).await.unwrap(), 1);
    assert_eq!(mark_read(&state, &uid, false).await.unwrap(), 1);
    assert_eq!(count_unread_admin_messages(&state, &uid).await.unwrap(), 0);

    let log = list_conversation(&state, &uid).await.unwrap();
    assert_eq!(log.len(), 3);
    assert_eq!(log[2].text, "Approved today");
    assert_eq!(log[2].sender_name, "Admin");
    assert!(log.iter().all(|m| m.status == MessageStatus::Read));

    let member_key = typing_key(&uid, false);
    assert!(!is_typing(&state, &member_key).await.unwrap());
    set_typing(&state, &member_key, true).await.unwrap();
    assert!(is_typing(&state, &member_key).await.unwrap());
    assert!(!is_typing(&state, &typing_key(&uid, true)).await.unwrap());
    set_typing(&state, &member_key, false).await.unwrap();
    assert!(!is_typing(&state, &member_key).await.unwrap());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn duplicates_keep_the_best_record() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let state = ctx.state.clone();

    let rows = vec![
        Member {
            no: 1,
            name: "MR. WANJAU".to_string(),
            period: "2023/2024".to_string(),
            ..Member::default()
        },
        Member {
            no: 1,
            name: "mr. wanjau ".to_string(),
            period: "2024/2025".to_string(),
            email: Some("wanjau@example.com".to_string()),
            ..Member::default()
        },
        Member {
            no: 2,
            name: "MRS. WANJAU".to_string(),
            period: "2024/2025".to_string(),
            ..Member::default()
        },
    ];
    save_members(&state, &rows).await.unwrap();

    let scan = scan_duplicates(&state).await.unwrap();
    assert_eq!(scan.stats.total, 3);
    assert_eq!(scan.stats.groups, 1);
    assert_eq!(scan.stats.removable, 1);
    assert_eq!(
        scan.groups[0].keeper().unwrap().email.as_deref(),
        Some("wanjau@example.com")
    );

    assert_eq!(remove_duplicates(&state).await.unwrap(), 1);
    assert_eq!(remove_duplicates(&state).await.unwrap(), 0);
    let left = list_all_members(&state).await.unwrap();
    assert_eq!(left.len(), 2);
    assert!(left.iter().any(|m| m.email.is_some()));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn roster_sync_then_invite() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let state = ctx.state.clone();
    let name = state.roster[0].clone();

    assert!(!roster_invite(&state, &name, "first@example.com").await.unwrap());
    assert!(roster_status(&state).await.unwrap().iter().all(|r| !r.exists()));

    let id = sync_roster_member(&state, &name).await.unwrap();
    assert_eq!(sync_roster_member(&state, &name).await.unwrap(), id);
    assert!(roster_invite(&state, &name, " First@Example.com ").await.unwrap());

    let status = roster_status(&state).await.unwrap();
    let row = status.iter().find(|r| r.name == name).unwrap();
    let member = row.member.as_ref().unwrap();
    assert_eq!(member.period, ROSTER_PERIOD);
    assert_eq!(member.email.as_deref(), Some("first@example.com"));
    assert_eq!(member.invite_status, Some(InviteStatus::Invited));

    common::teardown(Some(ctx)).await;
}
