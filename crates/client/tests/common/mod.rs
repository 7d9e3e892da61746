#![allow(dead_code)]

//! Shared test harness: a scripted transport and a recording observer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lattica::core::events::Event;
use lattica::{ApiResult, ChangeSet, HttpTransport, MatrixObserver, Member, Room, User};
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, mpsc};
use url::Url;

/// One outbound request the client made.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<JsonValue>,
}

impl RecordedRequest {
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

/// A transport that records requests and replays scripted responses.
///
/// Responses are keyed by method and a path fragment; multiple entries for
/// the same key replay in FIFO order. A request with no scripted response
/// parks forever, which conveniently models an idle long-poll.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<(&'static str, &'static str, JsonValue)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn queue(&self, method: &'static str, fragment: &'static str, response: JsonValue) {
        self.responses.lock().await.push_back((method, fragment, response));
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn count_path(&self, fragment: &str) -> usize {
        self.requests()
            .await
            .iter()
            .filter(|r| r.path.contains(fragment))
            .count()
    }

    async fn handle(
        &self,
        method: &'static str,
        url: Url,
        body: Option<JsonValue>,
    ) -> ApiResult<Option<JsonValue>> {
        let path = url.path().to_owned();
        self.requests.lock().await.push(RecordedRequest {
            method,
            path: path.clone(),
            query: url.query().map(str::to_owned),
            body,
        });
        let next = {
            let mut responses = self.responses.lock().await;
            responses
                .iter()
                .position(|(m, fragment, _)| *m == method && path.contains(fragment))
                .and_then(|i| responses.remove(i))
        };
        match next {
            Some((_, _, response)) => Ok(Some(response)),
            None => std::future::pending().await,
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get_json(&self, url: Url) -> ApiResult<Option<JsonValue>> {
        self.handle("GET", url, None).await
    }

    async fn put_json(&self, url: Url, body: JsonValue) -> ApiResult<Option<JsonValue>> {
        self.handle("PUT", url, Some(body)).await
    }

    async fn post_json(&self, url: Url, body: JsonValue) -> ApiResult<Option<JsonValue>> {
        self.handle("POST", url, Some(body)).await
    }

    async fn delete_json(&self, url: Url) -> ApiResult<Option<JsonValue>> {
        self.handle("DELETE", url, None).await
    }
}

/// Everything the observer surface can report, flattened for assertions.
#[derive(Debug)]
pub enum Notice {
    RoomNew(String),
    RoomDel(String),
    SyncedState(String),
    Invite(Event),
    Unknown(String),
    Presence {
        user_id: String,
        changes: ChangeSet,
    },
    RoomPresence {
        room_id: String,
        user_id: String,
        changes: ChangeSet,
    },
    Message {
        room_id: String,
        sender: String,
        content: JsonValue,
    },
    BackMessage {
        room_id: String,
        sender: String,
        content: JsonValue,
    },
    Membership {
        room_id: String,
        subject: String,
        changes: ChangeSet,
    },
    BackMembership {
        room_id: String,
        subject: String,
        changes: ChangeSet,
    },
    StateChanged {
        room_id: String,
        changes: ChangeSet,
    },
    BackStateChanged {
        room_id: String,
        changes: ChangeSet,
    },
}

/// Observer that forwards every callback into a channel.
pub struct RecordingObserver {
    tx: mpsc::UnboundedSender<Notice>,
}

impl RecordingObserver {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn send(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }
}

#[async_trait]
impl MatrixObserver for RecordingObserver {
    async fn on_presence(&self, user: User, changes: ChangeSet) {
        self.send(Notice::Presence {
            user_id: user.user_id.to_string(),
            changes,
        });
    }

    async fn on_room_new(&self, room: Room) {
        self.send(Notice::RoomNew(room.room_id().to_string()));
    }

    async fn on_room_del(&self, room: Room) {
        self.send(Notice::RoomDel(room.room_id().to_string()));
    }

    async fn on_invite(&self, event: Event) {
        self.send(Notice::Invite(event));
    }

    async fn on_unknown_event(&self, event: &Event) -> bool {
        self.send(Notice::Unknown(event.event_type.clone()));
        true
    }

    async fn on_synced_state(&self, room: Room) {
        self.send(Notice::SyncedState(room.room_id().to_string()));
    }

    async fn on_message(&self, room: Room, member: Member, content: JsonValue, _event: &Event) {
        self.send(Notice::Message {
            room_id: room.room_id().to_string(),
            sender: member.user_id.to_string(),
            content,
        });
    }

    async fn on_back_message(
        &self,
        room: Room,
        member: Member,
        content: JsonValue,
        _event: &Event,
    ) {
        self.send(Notice::BackMessage {
            room_id: room.room_id().to_string(),
            sender: member.user_id.to_string(),
            content,
        });
    }

    async fn on_membership(
        &self,
        room: Room,
        _actor: Option<Member>,
        _event: &Event,
        subject: Member,
        changes: ChangeSet,
    ) {
        self.send(Notice::Membership {
            room_id: room.room_id().to_string(),
            subject: subject.user_id.to_string(),
            changes,
        });
    }

    async fn on_back_membership(
        &self,
        room: Room,
        _actor: Option<Member>,
        _event: &Event,
        subject: Member,
        changes: ChangeSet,
    ) {
        self.send(Notice::BackMembership {
            room_id: room.room_id().to_string(),
            subject: subject.user_id.to_string(),
            changes,
        });
    }

    async fn on_state_changed(
        &self,
        room: Room,
        _actor: Option<Member>,
        _event: &Event,
        changes: ChangeSet,
    ) {
        self.send(Notice::StateChanged {
            room_id: room.room_id().to_string(),
            changes,
        });
    }

    async fn on_back_state_changed(
        &self,
        room: Room,
        _actor: Option<Member>,
        _event: &Event,
        changes: ChangeSet,
    ) {
        self.send(Notice::BackStateChanged {
            room_id: room.room_id().to_string(),
            changes,
        });
    }

    async fn on_room_presence(&self, room: Room, member: Member, changes: ChangeSet) {
        self.send(Notice::RoomPresence {
            room_id: room.room_id().to_string(),
            user_id: member.user_id.to_string(),
            changes,
        });
    }
}

/// Waits for the next notification, failing the test after five seconds.
pub async fn next_notice(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Notice {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification channel closed")
}
