//! Login, start idempotence and initial sync.

mod common;

use std::sync::Arc;

use assert_matches2::assert_matches;
use lattica::core::OwnedRoomId;
use lattica::{ClientConfig, Credentials, MatrixClient};
use serde_json::json;

use common::{MockTransport, Notice, RecordingObserver, next_notice};

fn client_with(transport: Arc<MockTransport>) -> MatrixClient {
    MatrixClient::with_transport(ClientConfig::new("h.test"), transport).unwrap()
}

#[tokio::test]
async fn login_by_access_token_issues_a_single_initial_sync() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", json!({"end": "t1", "presence": [], "rooms": []}))
        .await;
    let client = client_with(transport.clone());

    client
        .login(Credentials::access_token("@u:h.test", "TK"))
        .await
        .unwrap();

    let requests = transport.requests().await;
    assert_eq!(requests[0].method, "GET");
    assert_eq!(
        requests[0].path_and_query(),
        "/_matrix/client/api/v1/initialSync?access_token=TK&limit=0"
    );
    assert_eq!(transport.count_path("login").await, 0);
    assert_eq!(transport.count_path("initialSync").await, 1);

    // start() is idempotent: the same handle is reused, no second sync.
    client.start().await.unwrap();
    assert_eq!(transport.count_path("initialSync").await, 1);

    client.stop().await;
}

#[tokio::test]
async fn password_login_runs_the_offered_flow() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "login", json!({"flows": [{"type": "m.login.password"}]}))
        .await;
    transport
        .queue(
            "POST",
            "login",
            json!({"user_id": "@u:h.test", "access_token": "TK2"}),
        )
        .await;
    transport
        .queue("GET", "initialSync", json!({"end": "t1", "presence": [], "rooms": []}))
        .await;
    let client = client_with(transport.clone());

    client
        .login(Credentials::password("@u:h.test", "secret"))
        .await
        .unwrap();

    let requests = transport.requests().await;
    assert_eq!(requests[0].path, "/_matrix/client/api/v1/login");
    assert_eq!(requests[1].method, "POST");
    assert_eq!(
        requests[1].body.as_ref().unwrap()["type"],
        json!("m.login.password")
    );
    // The sync request carries the token issued by the login exchange.
    assert!(requests[2].query.as_deref().unwrap().contains("access_token=TK2"));
    assert_eq!(client.user_id().await.unwrap(), "@u:h.test");

    client.stop().await;
}

#[tokio::test]
async fn unsatisfiable_flows_fail_with_auth_unsupported() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue(
            "GET",
            "login",
            json!({"flows": [{"type": "m.login.email.identity"}]}),
        )
        .await;
    let client = client_with(transport.clone());

    let err = client
        .login(Credentials::password("@u:h.test", "secret"))
        .await
        .unwrap_err();
    assert_matches!(err, lattica::ClientError::AuthUnsupported);
}

#[tokio::test]
async fn initial_sync_creates_room_and_emits_synced_state() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", json!({
            "end": "t1",
            "presence": [],
            "rooms": [{
                "room_id": "!r",
                "membership": "join",
                "state": [
                    {
                        "type": "m.room.name",
                        "content": {"name": "Lobby"},
                        "user_id": "@u:h.test",
                        "state_key": "",
                    },
                    {
                        "type": "m.room.member",
                        "content": {"membership": "join", "displayname": "U"},
                        "user_id": "@u:h.test",
                        "state_key": "@u:h.test",
                    },
                ],
            }],
        }))
        .await;
    let client = client_with(transport.clone());
    let (observer, mut rx) = RecordingObserver::channel();
    client.set_observer(observer).await;

    client
        .login(Credentials::access_token("@u:h.test", "TK"))
        .await
        .unwrap();

    assert_matches!(next_notice(&mut rx).await, Notice::RoomNew(room_id));
    assert_eq!(room_id, "!r");
    assert_matches!(next_notice(&mut rx).await, Notice::SyncedState(room_id));
    assert_eq!(room_id, "!r");

    let room_id = OwnedRoomId::parse("!r").unwrap();
    let room = client.room(&room_id).await.unwrap();
    assert_eq!(room.name().await.as_deref(), Some("Lobby"));
    let members = room.members().await;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].display_name.as_deref(), Some("U"));

    client.stop().await;
}

#[tokio::test]
async fn invite_membership_emits_on_invite_without_a_room() {
    let transport = Arc::new(MockTransport::new());
    transport
        .queue("GET", "initialSync", json!({
            "end": "t1",
            "presence": [],
            "rooms": [{
                "room_id": "!invited",
                "membership": "invite",
                "state": [{
                    "type": "m.room.member",
                    "content": {"membership": "invite"},
                    "user_id": "@other:h.test",
                    "state_key": "@u:h.test",
                    "room_id": "!invited",
                }],
            }],
        }))
        .await;
    let client = client_with(transport.clone());
    let (observer, mut rx) = RecordingObserver::channel();
    client.set_observer(observer).await;

    client
        .login(Credentials::access_token("@u:h.test", "TK"))
        .await
        .unwrap();

    assert_matches!(next_notice(&mut rx).await, Notice::Invite(event));
    assert_eq!(event.room_id.as_ref().unwrap(), "!invited");
    let invited = OwnedRoomId::parse("!invited").unwrap();
    assert!(client.room(&invited).await.is_none());

    client.stop().await;
}

#[tokio::test]
async fn failed_start_clears_the_handle_for_retry() {
    let transport = Arc::new(MockTransport::new());
    // Not decodable into the sync body: missing `end`.
    transport
        .queue("GET", "initialSync", json!({"presence": []}))
        .await;
    transport
        .queue("GET", "initialSync", json!({"end": "t1", "presence": [], "rooms": []}))
        .await;
    let client = client_with(transport.clone());

    let err = client
        .login(Credentials::access_token("@u:h.test", "TK"))
        .await
        .unwrap_err();
    assert_matches!(err, lattica::ClientError::Start(_));

    // The handle was cleared, so the next start retries the sync.
    client.start().await.unwrap();
    assert_eq!(transport.count_path("initialSync").await, 2);

    client.stop().await;
}
