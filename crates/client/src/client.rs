//! The Matrix client: registries, session lifecycle and high-level
//! operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use lattica_core::client::directory::SetAliasReqBody;
use lattica_core::client::membership::{InviteUserReqBody, JoinRoomResBody, MembershipReqBody};
use lattica_core::client::message::{MessagesResBody, SendMessageResBody};
use lattica_core::client::presence::{PresenceListUpdateReqBody, PresenceStatusBody};
use lattica_core::client::profile::DisplayNameBody;
use lattica_core::client::register::{GetRegisterResBody, RegisterResBody, RegisterStageReqBody};
use lattica_core::client::room::{CreateRoomReqBody, CreateRoomResBody};
use lattica_core::client::session::{GetLoginResBody, LoginResBody, PasswordLoginReqBody};
use lattica_core::client::state::RoomStateResBody;
use lattica_core::client::sync_events::{EventsResBody, InitialSyncResBody, RoomSnapshot};
use lattica_core::events::Event;
use lattica_core::events::room::member::MembershipState;
use lattica_core::events::room::message::RoomMessageEventContent;
use lattica_core::presence::{PresenceEventContent, PresenceState};
use lattica_core::{OwnedRoomAliasId, OwnedRoomId, OwnedUserId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::dispatcher::{self, ClientEventKind, RoomEventKind, Route};
use crate::error::{ApiResult, ClientError};
use crate::http::{HttpTransport, ReqwestTransport, UrlBuilder};
use crate::observer::{ChangeSet, MatrixObserver, change_pair};
use crate::pump;
use crate::room::{FoldOutcome, NoteKind, PaginationToken, Phase, Room, RoomNote};
use crate::user::{User, UserMap, last_active_from_ago, user_entry};

/// Credentials for [`MatrixClient::login`] and [`MatrixClient::register`].
///
/// The first offered flow for which all required inputs are present is
/// used. Supplying `user_id` and `access_token` short-circuits login
/// without any network traffic.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    /// The user id (or localpart, for registration).
    pub user_id: Option<String>,

    /// The account password.
    pub password: Option<String>,

    /// An already-issued access token.
    pub access_token: Option<String>,
}

impl Credentials {
    /// Password credentials.
    pub fn password(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            password: Some(password.into()),
            access_token: None,
        }
    }

    /// Token credentials, skipping the login exchange entirely.
    pub fn access_token(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            password: None,
            access_token: Some(token.into()),
        }
    }
}

#[derive(Clone, Debug)]
struct Session {
    user_id: OwnedUserId,
    access_token: String,
}

type StartHandle = Shared<BoxFuture<'static, Result<(), Arc<ClientError>>>>;

struct ClientInner {
    config: ClientConfig,
    urls: UrlBuilder,
    transport: Arc<dyn HttpTransport>,
    session: RwLock<Option<Session>>,
    users: RwLock<UserMap>,
    rooms: RwLock<BTreeMap<OwnedRoomId, Room>>,
    observer: RwLock<Option<Arc<dyn MatrixObserver>>>,
    start_handle: Mutex<Option<StartHandle>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

/// A client for one home server.
///
/// Cheap to clone; all clones share the same registries and session. All
/// mutable state is owned by this type and only mutated by event folding,
/// so external callers observe through queries and the
/// [`MatrixObserver`] callbacks.
#[derive(Clone)]
pub struct MatrixClient {
    inner: Arc<ClientInner>,
}

impl MatrixClient {
    /// Creates a client using the default `reqwest` transport.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> ApiResult<Self> {
        let urls = UrlBuilder::new(&config.server, &config.path_prefix)?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                urls,
                transport,
                session: RwLock::new(None),
                users: RwLock::new(UserMap::new()),
                rooms: RwLock::new(BTreeMap::new()),
                observer: RwLock::new(None),
                start_handle: Mutex::new(None),
                pump: Mutex::new(None),
            }),
        })
    }

    /// Installs the observer that receives all callbacks.
    pub async fn set_observer(&self, observer: Arc<dyn MatrixObserver>) {
        *self.inner.observer.write().await = Some(observer);
    }

    /// The authenticated user id, once logged in.
    pub async fn user_id(&self) -> Option<OwnedUserId> {
        self.session_user().await
    }

    /// Looks up a room by id.
    pub async fn room(&self, room_id: &OwnedRoomId) -> Option<Room> {
        self.inner.rooms.read().await.get(room_id).cloned()
    }

    /// All rooms currently in the registry.
    pub async fn rooms(&self) -> Vec<Room> {
        self.inner.rooms.read().await.values().cloned().collect()
    }

    /// Snapshot of a user record, if the user has been seen.
    pub async fn user(&self, user_id: &OwnedUserId) -> Option<User> {
        let handle = self.inner.users.read().await.get(user_id).cloned()?;
        let user = handle.read().await.clone();
        Some(user)
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Authentication and lifecycle.

    /// Logs in, then starts the event stream.
    ///
    /// Resolves the server's supported flows and runs the first one the
    /// supplied credentials satisfy. With `user_id` and `access_token`
    /// both present the flow exchange is skipped entirely.
    pub async fn login(&self, credentials: Credentials) -> ApiResult<()> {
        if let (Some(user_id), Some(token)) = (&credentials.user_id, &credentials.access_token) {
            let user_id = OwnedUserId::parse(user_id)?;
            *self.inner.session.write().await = Some(Session {
                user_id,
                access_token: token.clone(),
            });
            return self.start().await;
        }

        let flows: GetLoginResBody = self.get(&["login"], &[]).await?;
        for flow in &flows.flows {
            if flow.flow_type != "m.login.password"
                || !(flow.stages.is_empty() || flow.stages == ["m.login.password"])
            {
                continue;
            }
            let (Some(user), Some(password)) = (&credentials.user_id, &credentials.password)
            else {
                continue;
            };
            let body = PasswordLoginReqBody {
                user: user.clone(),
                password: password.clone(),
            };
            let res: LoginResBody = match self.post(&["login"], &body).await {
                Ok(res) => res,
                Err(ClientError::Matrix(err)) => return Err(ClientError::AuthRejected(err)),
                Err(err) => return Err(err),
            };
            *self.inner.session.write().await = Some(Session {
                user_id: res.user_id,
                access_token: res.access_token,
            });
            return self.start().await;
        }
        Err(ClientError::AuthUnsupported)
    }

    /// Registers a new account, then starts the event stream.
    ///
    /// Stages of the selected flow are executed in declared order, each
    /// passing the server's `session` token through to the next.
    pub async fn register(&self, credentials: Credentials) -> ApiResult<()> {
        let flows: GetRegisterResBody = self.get(&["register"], &[]).await?;
        'flows: for flow in &flows.flows {
            let stages = flow.stage_types();
            if stages.is_empty() {
                continue;
            }
            for stage in &stages {
                if !stage_satisfiable(stage, &credentials) {
                    continue 'flows;
                }
            }

            let mut session_token: Option<String> = None;
            for stage in stages {
                let body = RegisterStageReqBody {
                    stage_type: stage.to_owned(),
                    session: session_token.clone(),
                    params: stage_params(stage, &credentials),
                };
                let res: RegisterResBody = match self.post(&["register"], &body).await {
                    Ok(res) => res,
                    Err(ClientError::Matrix(err)) => return Err(ClientError::AuthRejected(err)),
                    Err(err) => return Err(err),
                };
                if res.session.is_some() {
                    session_token = res.session;
                }
                if let (Some(user_id), Some(token)) = (res.user_id, res.access_token) {
                    *self.inner.session.write().await = Some(Session {
                        user_id,
                        access_token: token,
                    });
                    return self.start().await;
                }
            }
            return Err(ClientError::protocol(
                "registration flow completed without credentials",
            ));
        }
        Err(ClientError::AuthUnsupported)
    }

    /// Starts the event stream.
    ///
    /// Idempotent: concurrent and repeated calls share one handle and one
    /// `initialSync` request. The returned future completes when the
    /// initial snapshot has been fully folded; the long-poll pump keeps
    /// running in the background. A failed start clears the handle so the
    /// next call retries.
    pub async fn start(&self) -> ApiResult<()> {
        let handle = {
            let mut slot = self.inner.start_handle.lock().await;
            match slot.clone() {
                Some(handle) => handle,
                None => {
                    let client = self.clone();
                    let handle: StartHandle = async move {
                        client.initial_sync_and_stream().await.map_err(Arc::new)
                    }
                    .boxed()
                    .shared();
                    *slot = Some(handle.clone());
                    handle
                }
            }
        };
        match handle.await {
            Ok(()) => Ok(()),
            Err(err) => {
                let mut slot = self.inner.start_handle.lock().await;
                let failed = slot
                    .as_ref()
                    .and_then(|h| h.peek())
                    .is_some_and(|r| r.is_err());
                if failed {
                    *slot = None;
                }
                Err(ClientError::Start(err))
            }
        }
    }

    /// Stops the event stream.
    ///
    /// Safe to call repeatedly and regardless of start state; the
    /// in-flight poll is aborted and a later `start` begins afresh.
    pub async fn stop(&self) {
        if let Some(handle) = self.inner.pump.lock().await.take() {
            handle.abort();
        }
        *self.inner.start_handle.lock().await = None;
    }

    async fn initial_sync_and_stream(&self) -> ApiResult<()> {
        let body: InitialSyncResBody = self
            .get(&["initialSync"], &[("limit", "0".to_owned())])
            .await?;
        for snapshot in body.rooms {
            self.register_snapshot_room(snapshot).await;
        }
        for event in body.presence {
            self.dispatch_event(event, Phase::Forward).await;
        }
        let mut pump_slot = self.inner.pump.lock().await;
        if pump_slot.is_none() {
            *pump_slot = Some(tokio::spawn(pump::run(self.clone(), body.end)));
        }
        Ok(())
    }

    async fn register_snapshot_room(&self, snapshot: RoomSnapshot) {
        match snapshot.membership {
            MembershipState::Join => {
                let room = self.get_or_create_room(&snapshot.room_id).await;
                self.fold_initial_state(&room, snapshot.state).await;
                if let Some(obs) = self.observer().await {
                    obs.on_synced_state(room).await;
                }
            }
            MembershipState::Invite => {
                let me = self.session_user().await;
                let event = snapshot
                    .state
                    .iter()
                    .find(|e| {
                        e.event_type == "m.room.member"
                            && me
                                .as_ref()
                                .zip(e.state_key.as_deref())
                                .is_some_and(|(me, key)| *me == key)
                    })
                    .cloned()
                    .unwrap_or_else(|| {
                        let mut event =
                            Event::new("m.room.member", json!({"membership": "invite"}));
                        event.room_id = Some(snapshot.room_id.clone());
                        event.state_key = me.map(|m| m.as_str().to_owned());
                        event
                    });
                if let Some(obs) = self.observer().await {
                    obs.on_invite(event).await;
                }
            }
            other => {
                debug!(room_id = %snapshot.room_id, membership = other.as_str(),
                    "ignoring room snapshot with unhandled membership");
            }
        }
    }

    // ------------------------------------------------------------------
    // Event dispatch.

    /// Routes one event to its handler.
    pub(crate) async fn dispatch_event(&self, event: Event, phase: Phase) {
        match dispatcher::resolve(&event.event_type) {
            Route::Room(kind, suffix) => {
                let room = match &event.room_id {
                    Some(id) => self.inner.rooms.read().await.get(id).cloned(),
                    None => None,
                };
                if let Some(room) = room {
                    self.fold_on_room(&room, &event, phase, kind, &suffix).await;
                } else if self.is_self_state(&event).await {
                    self.handle_self_state(kind, &event).await;
                } else {
                    warn!(event_type = %event.event_type, room_id = ?event.room_id,
                        "dropping room event for unknown room");
                }
            }
            Route::Client(ClientEventKind::Presence, _) => self.handle_presence(&event).await,
            Route::Unknown => {
                let handled = match self.observer().await {
                    Some(obs) => obs.on_unknown_event(&event).await,
                    None => false,
                };
                if !handled {
                    debug!(event_type = %event.event_type, "dropping event with no handler");
                }
            }
        }
    }

    /// Folds one event on a room and applies the outcome. Returns whether
    /// the room's create event was seen (only possible while rewinding).
    async fn fold_on_room(
        &self,
        room: &Room,
        event: &Event,
        phase: Phase,
        kind: RoomEventKind,
        suffix: &[&str],
    ) -> bool {
        let local_user = self.session_user().await;
        let outcome = {
            let mut users = self.inner.users.write().await;
            let mut inner = room.write().await;
            inner.fold_event(kind, phase, event, suffix, local_user.as_ref(), &mut users)
        };
        self.apply_outcome(room, outcome).await
    }

    /// Emits collected notifications after the room's write lock has been
    /// released, then handles self-leave deregistration. The room-level
    /// membership callback always precedes `on_room_del`.
    async fn apply_outcome(&self, room: &Room, outcome: FoldOutcome) -> bool {
        let FoldOutcome {
            notes,
            protocol_errors,
            self_left,
            saw_create,
        } = outcome;
        let observer = self.observer().await;
        for message in protocol_errors {
            warn!(room_id = %room.room_id(), "{message}");
            if let Some(obs) = &observer {
                let error = ClientError::protocol(message);
                obs.on_error(&error, "event folding").await;
            }
        }
        if let Some(obs) = &observer {
            for note in notes {
                let RoomNote {
                    kind,
                    event,
                    backward,
                } = note;
                match (kind, backward) {
                    (NoteKind::Message { member, content }, false) => {
                        obs.on_message(room.clone(), member, content, &event).await;
                    }
                    (NoteKind::Message { member, content }, true) => {
                        obs.on_back_message(room.clone(), member, content, &event).await;
                    }
                    (
                        NoteKind::Membership {
                            actor,
                            subject,
                            changes,
                        },
                        false,
                    ) => {
                        obs.on_membership(room.clone(), actor, &event, subject, changes)
                            .await;
                    }
                    (
                        NoteKind::Membership {
                            actor,
                            subject,
                            changes,
                        },
                        true,
                    ) => {
                        obs.on_back_membership(room.clone(), actor, &event, subject, changes)
                            .await;
                    }
                    (NoteKind::StateChanged { actor, changes }, false) => {
                        obs.on_state_changed(room.clone(), actor, &event, changes).await;
                    }
                    (NoteKind::StateChanged { actor, changes }, true) => {
                        obs.on_back_state_changed(room.clone(), actor, &event, changes)
                            .await;
                    }
                }
            }
        }
        if self_left {
            self.inner.rooms.write().await.remove(room.room_id());
            if let Some(obs) = &observer {
                obs.on_room_del(room.clone()).await;
            }
        }
        saw_create
    }

    async fn fold_initial_state(&self, room: &Room, state: Vec<Event>) {
        for event in state {
            match dispatcher::resolve(&event.event_type) {
                Route::Room(kind, suffix) => {
                    self.fold_on_room(room, &event, Phase::Initial, kind, &suffix).await;
                }
                Route::Client(..) => {
                    debug!(event_type = %event.event_type, "ignoring non-room event in room state");
                }
                Route::Unknown => {
                    warn!(event_type = %event.event_type, "unknown event type in initial state");
                }
            }
        }
    }

    async fn is_self_state(&self, event: &Event) -> bool {
        match (&event.state_key, self.session_user().await) {
            (Some(key), Some(me)) => me == key.as_str(),
            _ => false,
        }
    }

    async fn handle_self_state(&self, kind: RoomEventKind, event: &Event) {
        let invited = kind == RoomEventKind::Member
            && event.content.get("membership").and_then(JsonValue::as_str) == Some("invite");
        if invited {
            if let Some(obs) = self.observer().await {
                obs.on_invite(event.clone()).await;
            }
        } else {
            debug!(event_type = %event.event_type, "ignoring self-targeted state for unknown room");
        }
    }

    /// Applies an `m.presence` event to the global user record, emits the
    /// delta, and forwards it to every room the user is a member of.
    async fn handle_presence(&self, event: &Event) {
        let content: PresenceEventContent = match event.content_as() {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "dropping malformed m.presence event");
                if let Some(obs) = self.observer().await {
                    let error = ClientError::protocol(format!("bad m.presence content: {e}"));
                    obs.on_error(&error, "event folding").await;
                }
                return;
            }
        };
        let user_id = content.user_id.clone();
        let user = {
            let mut users = self.inner.users.write().await;
            user_entry(&mut users, &user_id)
        };
        let mut changes = ChangeSet::new();
        let snapshot = {
            let mut record = user.write().await;
            let new_presence = Some(content.presence);
            if record.presence != new_presence {
                changes.insert(
                    "presence".to_owned(),
                    change_pair(
                        presence_json(record.presence),
                        presence_json(new_presence),
                    ),
                );
                record.presence = new_presence;
            }
            if let Some(name) = content.displayname {
                if record.display_name.as_deref() != Some(name.as_str()) {
                    changes.insert(
                        "displayname".to_owned(),
                        change_pair(
                            record
                                .display_name
                                .as_ref()
                                .map_or(JsonValue::Null, |n| json!(n)),
                            json!(name),
                        ),
                    );
                    record.display_name = Some(name);
                }
            }
            if let Some(ago) = content.last_active_ago {
                let last_active = last_active_from_ago(ago);
                let old = record.last_active;
                if old != Some(last_active) {
                    changes.insert(
                        "last_active".to_owned(),
                        change_pair(
                            old.map_or(JsonValue::Null, |s| json!(s)),
                            json!(last_active),
                        ),
                    );
                }
                record.last_active = Some(last_active);
            }
            record.clone()
        };
        let observer = self.observer().await;
        if let Some(obs) = &observer {
            obs.on_presence(snapshot, changes.clone()).await;
        }
        let rooms: Vec<Room> = self.inner.rooms.read().await.values().cloned().collect();
        for room in rooms {
            let member = room.read().await.state.members.get(&user_id).cloned();
            if let Some(member) = member {
                if let Some(obs) = &observer {
                    obs.on_room_presence(room.clone(), member, changes.clone()).await;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Room operations.

    /// Creates a room, optionally with an alias localpart, and completes
    /// its initial state sync before returning.
    pub async fn create_room(
        &self,
        alias_localpart: Option<&str>,
    ) -> ApiResult<(Room, Option<OwnedRoomAliasId>)> {
        let body = CreateRoomReqBody {
            room_alias_name: alias_localpart.map(str::to_owned),
            visibility: None,
        };
        let res: CreateRoomResBody = self.post(&["createRoom"], &body).await?;
        let room = self.sync_room(&res.room_id).await?;
        Ok((room, res.room_alias))
    }

    /// Joins a room by `#alias` or `!id`.
    ///
    /// A room already in the registry is returned as-is without another
    /// state sync.
    pub async fn join_room(&self, alias_or_id: &str) -> ApiResult<Room> {
        let room_id = if alias_or_id.starts_with('#') {
            let res: JoinRoomResBody = self.post(&["join", alias_or_id], &json!({})).await?;
            res.room_id
        } else if alias_or_id.starts_with('!') {
            let room_id = OwnedRoomId::parse(alias_or_id)?;
            let me = self
                .session_user()
                .await
                .ok_or_else(|| ClientError::protocol("not authenticated"))?;
            let body = MembershipReqBody {
                membership: MembershipState::Join,
            };
            self.put(
                &["rooms", room_id.as_str(), "state", "m.room.member", me.as_str()],
                &body,
            )
            .await?;
            room_id
        } else {
            return Err(ClientError::protocol("expected a #alias or a !room id"));
        };
        self.sync_room(&room_id).await
    }

    /// Leaves a room.
    ///
    /// Registry removal happens when the server echoes the self-leave
    /// membership event back through the stream.
    pub async fn leave_room(&self, room_id: &OwnedRoomId) -> ApiResult<()> {
        self.post_unit(&["rooms", room_id.as_str(), "leave"], &json!({})).await
    }

    /// Invites a user to a room.
    pub async fn invite_user(&self, room_id: &OwnedRoomId, user_id: &OwnedUserId) -> ApiResult<()> {
        let body = InviteUserReqBody {
            user_id: user_id.clone(),
        };
        self.post_unit(&["rooms", room_id.as_str(), "invite"], &body).await
    }

    /// Sends a message into a room, returning the server-assigned event id.
    pub async fn send_message(
        &self,
        room_id: &OwnedRoomId,
        content: RoomMessageEventContent,
    ) -> ApiResult<Option<String>> {
        let res: SendMessageResBody = self
            .post_or_default(&["rooms", room_id.as_str(), "send", "m.room.message"], &content)
            .await?;
        Ok(res.event_id)
    }

    /// Sets the room's name.
    pub async fn set_room_name(&self, room_id: &OwnedRoomId, name: &str) -> ApiResult<()> {
        self.put(
            &["rooms", room_id.as_str(), "state", "m.room.name"],
            &json!({ "name": name }),
        )
        .await
    }

    /// Sets the room's topic.
    pub async fn set_room_topic(&self, room_id: &OwnedRoomId, topic: &str) -> ApiResult<()> {
        self.put(
            &["rooms", room_id.as_str(), "state", "m.room.topic"],
            &json!({ "topic": topic }),
        )
        .await
    }

    /// Fetches the room's full current state list.
    pub async fn room_state(&self, room_id: &OwnedRoomId) -> ApiResult<RoomStateResBody> {
        self.get(&["rooms", room_id.as_str(), "state"], &[]).await
    }

    /// Fetches one page of history and folds it backwards.
    ///
    /// `limit` falls back to the configured page size. Returns the number
    /// of events processed. Fails locally with
    /// [`ClientError::PaginationExhausted`] once the room's create event
    /// has been reached; no request is made in that case.
    pub async fn paginate_messages(&self, room: &Room, limit: Option<u32>) -> ApiResult<usize> {
        let limit = limit.unwrap_or(self.inner.config.pagination_limit);
        let from = {
            let mut inner = room.write().await;
            match &inner.pagination_token {
                PaginationToken::Start => return Err(ClientError::PaginationExhausted),
                PaginationToken::Token(token) => {
                    let token = token.clone();
                    inner.ensure_backward();
                    token
                }
                PaginationToken::Unset => {
                    inner.ensure_backward();
                    "END".to_owned()
                }
            }
        };
        let res: MessagesResBody = self
            .get(
                &["rooms", room.room_id().as_str(), "messages"],
                &[
                    ("from", from),
                    ("dir", "b".to_owned()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        let count = res.chunk.len();
        let mut saw_create = false;
        for event in &res.chunk {
            match dispatcher::resolve(&event.event_type) {
                Route::Room(kind, suffix) => {
                    saw_create |= self
                        .fold_on_room(room, event, Phase::Backward, kind, &suffix)
                        .await;
                }
                _ => {
                    debug!(event_type = %event.event_type, "ignoring non-room event while paginating");
                }
            }
        }
        let mut inner = room.write().await;
        inner.pagination_token = if saw_create {
            PaginationToken::Start
        } else {
            PaginationToken::Token(res.end)
        };
        Ok(count)
    }

    /// Returns the room from the registry, creating it and completing its
    /// initial state sync when it is new.
    async fn sync_room(&self, room_id: &OwnedRoomId) -> ApiResult<Room> {
        if let Some(room) = self.inner.rooms.read().await.get(room_id).cloned() {
            return Ok(room);
        }
        let room = self.get_or_create_room(room_id).await;
        let state = self.room_state(room_id).await?;
        self.fold_initial_state(&room, state).await;
        if let Some(obs) = self.observer().await {
            obs.on_synced_state(room.clone()).await;
        }
        Ok(room)
    }

    async fn get_or_create_room(&self, room_id: &OwnedRoomId) -> Room {
        let created = {
            let mut rooms = self.inner.rooms.write().await;
            match rooms.get(room_id) {
                Some(room) => return room.clone(),
                None => {
                    let room = Room::new(room_id.clone());
                    rooms.insert(room_id.clone(), room.clone());
                    room
                }
            }
        };
        if let Some(obs) = self.observer().await {
            obs.on_room_new(created.clone()).await;
        }
        created
    }

    // ------------------------------------------------------------------
    // Directory, profile and presence RPCs.

    /// Maps a directory alias onto a room.
    pub async fn add_alias(
        &self,
        alias: &OwnedRoomAliasId,
        room_id: &OwnedRoomId,
    ) -> ApiResult<()> {
        let body = SetAliasReqBody {
            room_id: room_id.clone(),
        };
        self.put(&["directory", "room", alias.as_str()], &body).await
    }

    /// Removes a directory alias.
    pub async fn delete_alias(&self, alias: &OwnedRoomAliasId) -> ApiResult<()> {
        self.delete(&["directory", "room", alias.as_str()]).await
    }

    /// Fetches a user's display name (defaults to the local user).
    pub async fn get_displayname(
        &self,
        user_id: Option<&OwnedUserId>,
    ) -> ApiResult<Option<String>> {
        let target = self.target_user(user_id).await?;
        let res: DisplayNameBody = self
            .get(&["profile", target.as_str(), "displayname"], &[])
            .await?;
        Ok(res.displayname)
    }

    /// Sets the local user's display name.
    pub async fn set_displayname(&self, displayname: &str) -> ApiResult<()> {
        let me = self.target_user(None).await?;
        let body = DisplayNameBody {
            displayname: Some(displayname.to_owned()),
        };
        self.put(&["profile", me.as_str(), "displayname"], &body).await
    }

    /// Fetches a user's presence status (defaults to the local user).
    pub async fn get_presence(
        &self,
        user_id: Option<&OwnedUserId>,
    ) -> ApiResult<PresenceStatusBody> {
        let target = self.target_user(user_id).await?;
        self.get(&["presence", target.as_str(), "status"], &[]).await
    }

    /// Sets the local user's presence status.
    pub async fn set_presence(
        &self,
        presence: PresenceState,
        status_msg: Option<String>,
    ) -> ApiResult<()> {
        let me = self.target_user(None).await?;
        let body = PresenceStatusBody {
            presence,
            status_msg,
            last_active_ago: None,
        };
        self.put(&["presence", me.as_str(), "status"], &body).await
    }

    /// Fetches the local user's presence list.
    pub async fn get_presence_list(&self) -> ApiResult<Vec<PresenceEventContent>> {
        let me = self.target_user(None).await?;
        self.get(&["presence_list", me.as_str()], &[]).await
    }

    /// Starts watching a user's presence.
    pub async fn invite_presence(&self, user_id: &OwnedUserId) -> ApiResult<()> {
        let me = self.target_user(None).await?;
        let body = PresenceListUpdateReqBody {
            invite: vec![user_id.clone()],
            drop: vec![],
        };
        self.post_unit(&["presence_list", me.as_str()], &body).await
    }

    /// Stops watching a user's presence.
    pub async fn drop_presence(&self, user_id: &OwnedUserId) -> ApiResult<()> {
        let me = self.target_user(None).await?;
        let body = PresenceListUpdateReqBody {
            invite: vec![],
            drop: vec![user_id.clone()],
        };
        self.post_unit(&["presence_list", me.as_str()], &body).await
    }

    async fn target_user(&self, user_id: Option<&OwnedUserId>) -> ApiResult<OwnedUserId> {
        match user_id {
            Some(user_id) => Ok(user_id.clone()),
            None => self
                .session_user()
                .await
                .ok_or_else(|| ClientError::protocol("not authenticated")),
        }
    }

    // ------------------------------------------------------------------
    // Plumbing.

    pub(crate) async fn observer(&self) -> Option<Arc<dyn MatrixObserver>> {
        self.inner.observer.read().await.clone()
    }

    pub(crate) async fn emit_log(&self, message: &str) {
        debug!("{message}");
        if let Some(obs) = self.observer().await {
            obs.on_log(message).await;
        }
    }

    pub(crate) async fn session_user(&self) -> Option<OwnedUserId> {
        self.inner.session.read().await.as_ref().map(|s| s.user_id.clone())
    }

    pub(crate) async fn poll_events(&self, from: &str) -> ApiResult<EventsResBody> {
        self.get(
            &["events"],
            &[
                ("from", from.to_owned()),
                ("timeout", self.inner.config.longpoll_timeout_ms.to_string()),
            ],
        )
        .await
    }

    async fn url(&self, segments: &[&str], query: &[(&str, String)]) -> ApiResult<url::Url> {
        let token = self
            .inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());
        self.inner.urls.build(segments, query, token.as_deref())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let url = self.url(segments, query).await?;
        let body = self
            .inner
            .transport
            .get_json(url)
            .await?
            .ok_or_else(|| ClientError::protocol("unexpected empty response"))?;
        Ok(serde_json::from_value(body)?)
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ApiResult<T> {
        let url = self.url(segments, &[]).await?;
        let body = serde_json::to_value(body)?;
        let res = self
            .inner
            .transport
            .post_json(url, body)
            .await?
            .ok_or_else(|| ClientError::protocol("unexpected empty response"))?;
        Ok(serde_json::from_value(res)?)
    }

    async fn post_or_default<B: Serialize + Sync, T: DeserializeOwned + Default>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ApiResult<T> {
        let url = self.url(segments, &[]).await?;
        let body = serde_json::to_value(body)?;
        match self.inner.transport.post_json(url, body).await? {
            Some(res) => Ok(serde_json::from_value(res)?),
            None => Ok(T::default()),
        }
    }

    async fn post_unit<B: Serialize + Sync>(&self, segments: &[&str], body: &B) -> ApiResult<()> {
        let url = self.url(segments, &[]).await?;
        let body = serde_json::to_value(body)?;
        self.inner.transport.post_json(url, body).await?;
        Ok(())
    }

    async fn put<B: Serialize + Sync>(&self, segments: &[&str], body: &B) -> ApiResult<()> {
        let url = self.url(segments, &[]).await?;
        let body = serde_json::to_value(body)?;
        self.inner.transport.put_json(url, body).await?;
        Ok(())
    }

    async fn delete(&self, segments: &[&str]) -> ApiResult<()> {
        let url = self.url(segments, &[]).await?;
        self.inner.transport.delete_json(url).await?;
        Ok(())
    }
}

impl std::fmt::Debug for MatrixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixClient")
            .field("server", &self.inner.config.server)
            .finish()
    }
}

fn presence_json(state: Option<PresenceState>) -> JsonValue {
    match state {
        Some(state) => json!(state.as_str()),
        None => JsonValue::Null,
    }
}

fn stage_satisfiable(stage: &str, credentials: &Credentials) -> bool {
    match stage {
        "m.login.password" => credentials.user_id.is_some() && credentials.password.is_some(),
        "m.login.dummy" => true,
        _ => false,
    }
}

fn stage_params(stage: &str, credentials: &Credentials) -> JsonValue {
    match stage {
        "m.login.password" => json!({
            "user": credentials.user_id,
            "password": credentials.password,
        }),
        _ => json!({}),
    }
}
