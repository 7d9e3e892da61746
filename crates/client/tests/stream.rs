//! Live streaming: message dispatch, self-leave, presence fan-out.

mod common;

use std::sync::Arc;

use assert_matches2::assert_matches;
use lattica::core::OwnedRoomId;
use lattica::{ClientConfig, Credentials, MatrixClient};
use serde_json::{Value as JsonValue, json};

use common::{MockTransport, Notice, RecordingObserver, next_notice};

/// Initial sync body with one joined room containing `@u:h.test`.
fn sync_with_room() -> JsonValue {
    json!({
        "end": "t1",
        "presence": [],
        "rooms": [{
            "room_id": "!r",
            "membership": "join",
            "state": [{
                "type": "m.room.member",
                "content": {"membership": "join", "displayname": "U"},
                "user_id": "@u:h.test",
                "state_key": "@u:h.test",
            }],
        }],
    })
}

async fn logged_in_client(
    transport: Arc<MockTransport>,
) -> (MatrixClient, tokio::sync::mpsc::UnboundedReceiver<Notice>) {
    let client = MatrixClient::with_transport(ClientConfig::new("h.test"), transport).unwrap();
    let (observer, mut rx) = RecordingObserver::channel();
    client.set_observer(observer).await;
    client
        .login(Credentials::access_token("@u:h.test", "TK"))
        .await
        .unwrap();
    assert_matches!(next_notice(&mut rx).await, Notice::RoomNew(_));
    assert_matches!(next_notice(&mut rx).await, Notice::SyncedState(_));
    (client, rx)
}

#[tokio::test]
async fn forward_message_reaches_the_member_handler() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", sync_with_room())
        .await;
    transport
        .queue("GET", "events", json!({
            "chunk": [{
                "type": "m.room.message",
                "room_id": "!r",
                "user_id": "@u:h.test",
                "content": {"msgtype": "m.text", "body": "hi"},
                "ts": 1000,
            }],
            "end": "t2",
        }))
        .await;
    let (client, mut rx) = logged_in_client(transport.clone()).await;

    assert_matches!(
        next_notice(&mut rx).await,
        Notice::Message { room_id, sender, content }
    );
    assert_eq!(room_id, "!r");
    assert_eq!(sender, "@u:h.test");
    assert_eq!(content["body"], json!("hi"));

    client.stop().await;
}

#[tokio::test]
async fn message_from_unknown_member_is_dropped() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", sync_with_room())
        .await;
    transport
        .queue("GET", "events", json!({
            "chunk": [
                {
                    "type": "m.room.message",
                    "room_id": "!r",
                    "user_id": "@stranger:h.test",
                    "content": {"msgtype": "m.text", "body": "boo"},
                },
                {
                    "type": "m.room.message",
                    "room_id": "!r",
                    "user_id": "@u:h.test",
                    "content": {"msgtype": "m.text", "body": "after"},
                },
            ],
            "end": "t2",
        }))
        .await;
    let (client, mut rx) = logged_in_client(transport.clone()).await;

    // The unknown-member message is dropped; the next event still arrives.
    assert_matches!(next_notice(&mut rx).await, Notice::Message { sender, .. });
    assert_eq!(sender, "@u:h.test");

    client.stop().await;
}

#[tokio::test]
async fn self_leave_removes_the_room_after_the_membership_callback() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", sync_with_room())
        .await;
    transport
        .queue("GET", "events", json!({
            "chunk": [{
                "type": "m.room.member",
                "room_id": "!r",
                "user_id": "@u:h.test",
                "state_key": "@u:h.test",
                "content": {"membership": "leave"},
                "prev_content": {"membership": "join", "displayname": "U"},
            }],
            "end": "t2",
        }))
        .await;
    let (client, mut rx) = logged_in_client(transport.clone()).await;

    assert_matches!(
        next_notice(&mut rx).await,
        Notice::Membership { room_id, subject, changes }
    );
    assert_eq!(room_id, "!r");
    assert_eq!(subject, "@u:h.test");
    assert_eq!(changes["membership"], vec![json!("join"), json!(null)]);
    assert_eq!(changes["displayname"], vec![json!("U"), json!(null)]);

    assert_matches!(next_notice(&mut rx).await, Notice::RoomDel(room_id));
    assert_eq!(room_id, "!r");
    let gone = OwnedRoomId::parse("!r").unwrap();
    assert!(client.room(&gone).await.is_none());

    client.stop().await;
}

#[tokio::test]
async fn presence_updates_the_user_and_fans_out_to_rooms() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", sync_with_room())
        .await;
    transport
        .queue("GET", "events", json!({
            "chunk": [{
                "type": "m.presence",
                "content": {
                    "user_id": "@u:h.test",
                    "presence": "unavailable",
                    "last_active_ago": 1000,
                },
            }],
            "end": "t2",
        }))
        .await;
    let (client, mut rx) = logged_in_client(transport.clone()).await;

    assert_matches!(next_notice(&mut rx).await, Notice::Presence { user_id, changes });
    assert_eq!(user_id, "@u:h.test");
    assert_eq!(changes["presence"], vec![json!(null), json!("unavailable")]);

    assert_matches!(
        next_notice(&mut rx).await,
        Notice::RoomPresence { room_id, user_id, .. }
    );
    assert_eq!(room_id, "!r");
    assert_eq!(user_id, "@u:h.test");

    let user_id = lattica::core::OwnedUserId::parse("@u:h.test").unwrap();
    let user = client.user(&user_id).await.unwrap();
    assert_eq!(
        user.presence,
        Some(lattica::core::presence::PresenceState::Unavailable)
    );
    assert!(user.last_active.is_some());

    client.stop().await;
}

#[tokio::test]
async fn unhandled_event_types_reach_the_unknown_hook() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", sync_with_room())
        .await;
    transport
        .queue("GET", "events", json!({
            "chunk": [{"type": "m.call.invite", "room_id": "!r", "content": {}}],
            "end": "t2",
        }))
        .await;
    let (client, mut rx) = logged_in_client(transport.clone()).await;

    assert_matches!(next_notice(&mut rx).await, Notice::Unknown(event_type));
    assert_eq!(event_type, "m.call.invite");

    client.stop().await;
}

#[tokio::test]
async fn streamed_invite_for_unknown_room_reaches_on_invite() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", sync_with_room())
        .await;
    transport
        .queue("GET", "events", json!({
            "chunk": [{
                "type": "m.room.member",
                "room_id": "!other",
                "user_id": "@someone:h.test",
                "state_key": "@u:h.test",
                "content": {"membership": "invite"},
            }],
            "end": "t2",
        }))
        .await;
    let (client, mut rx) = logged_in_client(transport.clone()).await;

    assert_matches!(next_notice(&mut rx).await, Notice::Invite(event));
    assert_eq!(event.room_id.as_ref().unwrap(), "!other");
    let other = OwnedRoomId::parse("!other").unwrap();
    assert!(client.room(&other).await.is_none());

    client.stop().await;
}

#[tokio::test]
async fn room_name_change_streams_old_and_new_values() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", sync_with_room())
        .await;
    transport
        .queue("GET", "events", json!({
            "chunk": [{
                "type": "m.room.name",
                "room_id": "!r",
                "user_id": "@u:h.test",
                "state_key": "",
                "content": {"name": "Lobby"},
            }],
            "end": "t2",
        }))
        .await;
    let (client, mut rx) = logged_in_client(transport.clone()).await;

    assert_matches!(next_notice(&mut rx).await, Notice::StateChanged { room_id, changes });
    assert_eq!(room_id, "!r");
    assert_eq!(changes["name"], vec![json!(null), json!("Lobby")]);

    let room = client.room(&OwnedRoomId::parse("!r").unwrap()).await.unwrap();
    assert_eq!(room.name().await.as_deref(), Some("Lobby"));

    client.stop().await;
}
