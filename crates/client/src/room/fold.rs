//! Event folding.
//!
//! One fold, three phases. `Initial` populates the forward projection
//! silently, `Forward` mutates it and produces live notifications,
//! `Backward` rewinds the backward projection while paginating. Change
//! pairs always put the value in the direction of traversal in the second
//! slot: the new value going forward, the older value going backward.

use std::collections::{BTreeMap, BTreeSet};

use lattica_core::events::Event;
use lattica_core::events::room::aliases::RoomAliasesEventContent;
use lattica_core::events::room::join_rule::{JoinRule, RoomJoinRuleEventContent};
use lattica_core::events::room::member::{MembershipState, RoomMemberEventContent};
use lattica_core::events::room::name::RoomNameEventContent;
use lattica_core::events::room::power_levels::{
    PowerAction, RoomLevelEventContent, RoomOpsLevelsEventContent, RoomPowerLevelsEventContent,
};
use lattica_core::events::room::topic::RoomTopicEventContent;
use lattica_core::{OwnedRoomAliasId, OwnedServerName, OwnedUserId};
use serde_json::{Value as JsonValue, json};

use super::{RoomInner, RoomState};
use crate::dispatcher::RoomEventKind;
use crate::member::Member;
use crate::observer::{ChangeSet, change_pair};
use crate::user::{UserMap, user_entry};

/// Which folding rules apply to an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Populating a fresh room from an initial state snapshot.
    Initial,

    /// Live streaming; mutates the forward projection.
    Forward,

    /// Back-pagination; mutates the backward projection.
    Backward,
}

/// A notification collected while folding, emitted by the client after the
/// room's write lock has been released.
pub(crate) struct RoomNote {
    pub kind: NoteKind,
    pub event: Event,
    pub backward: bool,
}

pub(crate) enum NoteKind {
    Message {
        member: Member,
        content: JsonValue,
    },
    Membership {
        actor: Option<Member>,
        subject: Member,
        changes: ChangeSet,
    },
    StateChanged {
        actor: Option<Member>,
        changes: ChangeSet,
    },
}

/// Everything one fold produced.
#[derive(Default)]
pub(crate) struct FoldOutcome {
    pub notes: Vec<RoomNote>,
    pub protocol_errors: Vec<String>,
    /// The local user's membership resolved to absent.
    pub self_left: bool,
    /// An `m.room.create` event was seen while rewinding.
    pub saw_create: bool,
}

/// Membership content after normalisation: `None` is the absent state
/// (the wire's `"leave"` or an empty content object).
struct MemberPatch {
    membership: MembershipState,
    display_name: Option<String>,
}

fn normalise_membership(content: Option<&JsonValue>) -> Result<Option<MemberPatch>, String> {
    let Some(content) = content else {
        return Ok(None);
    };
    match content {
        JsonValue::Null => Ok(None),
        JsonValue::Object(map) if map.is_empty() => Ok(None),
        JsonValue::Object(_) => {
            let parsed: RoomMemberEventContent = serde_json::from_value(content.clone())
                .map_err(|e| format!("bad m.room.member content: {e}"))?;
            if parsed.membership == MembershipState::Leave {
                Ok(None)
            } else {
                Ok(Some(MemberPatch {
                    membership: parsed.membership,
                    display_name: parsed.display_name,
                }))
            }
        }
        _ => Err("m.room.member content is not an object".to_owned()),
    }
}

fn extract_name(content: &JsonValue) -> Result<Option<String>, String> {
    serde_json::from_value::<RoomNameEventContent>(content.clone())
        .map(|c| c.name)
        .map_err(|e| format!("bad m.room.name content: {e}"))
}

fn extract_topic(content: &JsonValue) -> Result<Option<String>, String> {
    serde_json::from_value::<RoomTopicEventContent>(content.clone())
        .map(|c| c.topic)
        .map_err(|e| format!("bad m.room.topic content: {e}"))
}

fn extract_join_rule(content: &JsonValue) -> Result<Option<JoinRule>, String> {
    serde_json::from_value::<RoomJoinRuleEventContent>(content.clone())
        .map(|c| c.join_rule)
        .map_err(|e| format!("bad m.room.join_rules content: {e}"))
}

fn opt_string_json(value: &Option<String>) -> JsonValue {
    match value {
        Some(s) => json!(s),
        None => JsonValue::Null,
    }
}

fn opt_join_rule_json(value: &Option<JoinRule>) -> JsonValue {
    match value {
        Some(rule) => json!(rule.as_str()),
        None => JsonValue::Null,
    }
}

fn opt_i64_json(value: Option<i64>) -> JsonValue {
    match value {
        Some(level) => json!(level),
        None => JsonValue::Null,
    }
}

fn membership_json(value: Option<MembershipState>) -> JsonValue {
    match value {
        Some(state) => json!(state.as_str()),
        None => JsonValue::Null,
    }
}

fn aliases_json(aliases: &[OwnedRoomAliasId]) -> JsonValue {
    json!(aliases.iter().map(|a| a.as_str()).collect::<Vec<_>>())
}

fn concat_others(
    map: &BTreeMap<OwnedServerName, Vec<OwnedRoomAliasId>>,
    except: &OwnedServerName,
) -> Vec<OwnedRoomAliasId> {
    map.iter()
        .filter(|(server, _)| *server != except)
        .flat_map(|(_, list)| list.iter().cloned())
        .collect()
}

impl RoomInner {
    /// Folds one event in the given phase.
    ///
    /// Runs synchronously under the room's write lock, so each event is
    /// applied atomically: no forward and backward work interleaves within
    /// one event.
    pub(crate) fn fold_event(
        &mut self,
        kind: RoomEventKind,
        phase: Phase,
        event: &Event,
        suffix: &[&str],
        local_user: Option<&OwnedUserId>,
        users: &mut UserMap,
    ) -> FoldOutcome {
        let mut outcome = FoldOutcome::default();
        if !suffix.is_empty() {
            debug!(event_type = %event.event_type, ?suffix, "ignoring event type suffix");
        }
        match kind {
            RoomEventKind::Name => self.fold_scalar(
                phase,
                event,
                "name",
                extract_name,
                opt_string_json,
                |s| &mut s.name,
                &mut outcome,
            ),
            RoomEventKind::Topic => self.fold_scalar(
                phase,
                event,
                "topic",
                extract_topic,
                opt_string_json,
                |s| &mut s.topic,
                &mut outcome,
            ),
            RoomEventKind::JoinRules => self.fold_scalar(
                phase,
                event,
                "join_rule",
                extract_join_rule,
                opt_join_rule_json,
                |s| &mut s.join_rule,
                &mut outcome,
            ),
            RoomEventKind::Aliases => self.fold_aliases(phase, event, &mut outcome),
            RoomEventKind::Member => {
                self.fold_member(phase, event, local_user, users, &mut outcome)
            }
            RoomEventKind::Message => self.fold_message(phase, event, &mut outcome),
            RoomEventKind::PowerLevels => self.fold_power_levels(phase, event, &mut outcome),
            RoomEventKind::OpsLevels => self.fold_ops_levels(phase, event, &mut outcome),
            RoomEventKind::SendEventLevel => {
                self.fold_single_level(phase, event, PowerAction::SendEvent, &mut outcome)
            }
            RoomEventKind::AddStateLevel => {
                self.fold_single_level(phase, event, PowerAction::AddState, &mut outcome)
            }
            RoomEventKind::Create => {
                if phase == Phase::Backward {
                    outcome.saw_create = true;
                }
            }
        }
        outcome
    }

    /// The actor member from the projection matching the direction.
    fn actor_in(&self, backward: bool, event: &Event) -> Option<Member> {
        let members = if backward {
            &self.back.as_ref()?.members
        } else {
            &self.state.members
        };
        event.user_id.as_ref().and_then(|uid| members.get(uid)).cloned()
    }

    fn push_state_note(
        &self,
        event: &Event,
        changes: ChangeSet,
        backward: bool,
        outcome: &mut FoldOutcome,
    ) {
        let actor = self.actor_in(backward, event);
        outcome.notes.push(RoomNote {
            kind: NoteKind::StateChanged { actor, changes },
            event: event.clone(),
            backward,
        });
    }

    /// Shared fold for the scalar state fields (name, topic, join rule).
    fn fold_scalar<T: Clone>(
        &mut self,
        phase: Phase,
        event: &Event,
        field: &'static str,
        extract: fn(&JsonValue) -> Result<Option<T>, String>,
        to_json: fn(&Option<T>) -> JsonValue,
        slot: fn(&mut RoomState) -> &mut Option<T>,
        outcome: &mut FoldOutcome,
    ) {
        let new = match extract(&event.content) {
            Ok(value) => value,
            Err(e) => {
                outcome.protocol_errors.push(e);
                return;
            }
        };
        match phase {
            Phase::Initial => *slot(&mut self.state) = new,
            Phase::Forward => {
                let old = slot(&mut self.state).clone();
                *slot(&mut self.state) = new.clone();
                let mut changes = ChangeSet::new();
                changes.insert(field.to_owned(), change_pair(to_json(&old), to_json(&new)));
                self.push_state_note(event, changes, false, outcome);
            }
            Phase::Backward => {
                // The backward projection does not carry these scalars; only
                // the traversal pair is reported.
                let prev = match &event.prev_content {
                    Some(prev) => match extract(prev) {
                        Ok(value) => value,
                        Err(e) => {
                            outcome.protocol_errors.push(e);
                            return;
                        }
                    },
                    None => None,
                };
                let mut changes = ChangeSet::new();
                changes.insert(field.to_owned(), change_pair(to_json(&new), to_json(&prev)));
                self.push_state_note(event, changes, true, outcome);
            }
        }
    }

    fn fold_aliases(&mut self, phase: Phase, event: &Event, outcome: &mut FoldOutcome) {
        let server = match event.state_key.as_deref().map(OwnedServerName::parse) {
            Some(Ok(server)) => server,
            _ => {
                outcome
                    .protocol_errors
                    .push("m.room.aliases without a home server state key".to_owned());
                return;
            }
        };
        let content: RoomAliasesEventContent = match event.content_as() {
            Ok(content) => content,
            Err(e) => {
                outcome.protocol_errors.push(format!("bad m.room.aliases content: {e}"));
                return;
            }
        };
        match phase {
            Phase::Initial => {
                self.state.aliases_by_server.insert(server, content.aliases);
            }
            Phase::Forward => {
                let old = self
                    .state
                    .aliases_by_server
                    .insert(server.clone(), content.aliases.clone())
                    .unwrap_or_default();
                let others = concat_others(&self.state.aliases_by_server, &server);
                let mut changes = ChangeSet::new();
                changes.insert(
                    "aliases".to_owned(),
                    vec![
                        aliases_json(&old),
                        aliases_json(&content.aliases),
                        aliases_json(&others),
                    ],
                );
                self.push_state_note(event, changes, false, outcome);
            }
            Phase::Backward => {
                let prev: Vec<OwnedRoomAliasId> = match event
                    .prev_content_as::<RoomAliasesEventContent>()
                {
                    Ok(prev) => prev.map(|c| c.aliases).unwrap_or_default(),
                    Err(e) => {
                        outcome.protocol_errors.push(format!("bad m.room.aliases prev_content: {e}"));
                        return;
                    }
                };
                let others = {
                    let Some(back) = self.back.as_mut() else {
                        outcome
                            .protocol_errors
                            .push("backward fold without a backward projection".to_owned());
                        return;
                    };
                    if event.prev_content.is_none() {
                        back.aliases_by_server.remove(&server);
                    } else {
                        back.aliases_by_server.insert(server.clone(), prev.clone());
                    }
                    concat_others(&back.aliases_by_server, &server)
                };
                let mut changes = ChangeSet::new();
                changes.insert(
                    "aliases".to_owned(),
                    vec![
                        aliases_json(&content.aliases),
                        aliases_json(&prev),
                        aliases_json(&others),
                    ],
                );
                self.push_state_note(event, changes, true, outcome);
            }
        }
    }

    fn fold_member(
        &mut self,
        phase: Phase,
        event: &Event,
        local_user: Option<&OwnedUserId>,
        users: &mut UserMap,
        outcome: &mut FoldOutcome,
    ) {
        let subject_id = match event.state_key.as_deref().map(OwnedUserId::parse) {
            Some(Ok(id)) => id,
            _ => {
                outcome
                    .protocol_errors
                    .push("m.room.member without a valid subject state key".to_owned());
                return;
            }
        };
        let new = match normalise_membership(Some(&event.content)) {
            Ok(value) => value,
            Err(e) => {
                outcome.protocol_errors.push(e);
                return;
            }
        };
        match phase {
            Phase::Initial => {
                if self.state.members.contains_key(&subject_id) {
                    warn!(user_id = %subject_id, "duplicate member in initial state, ignoring");
                    return;
                }
                let Some(patch) = new else {
                    debug!(user_id = %subject_id, "absent member in initial state, skipping");
                    return;
                };
                let user = user_entry(users, &subject_id);
                self.state.members.insert(
                    subject_id.clone(),
                    Member {
                        user_id: subject_id,
                        user,
                        display_name: patch.display_name,
                        membership: Some(patch.membership),
                    },
                );
            }
            Phase::Forward | Phase::Backward => {
                let old = match normalise_membership(event.prev_content.as_ref()) {
                    Ok(value) => value,
                    Err(e) => {
                        outcome.protocol_errors.push(e);
                        return;
                    }
                };
                let backward = phase == Phase::Backward;
                let members = if backward {
                    let Some(back) = self.back.as_mut() else {
                        outcome
                            .protocol_errors
                            .push("backward fold without a backward projection".to_owned());
                        return;
                    };
                    &mut back.members
                } else {
                    &mut self.state.members
                };
                let actor = event
                    .user_id
                    .as_ref()
                    .and_then(|uid| members.get(uid))
                    .cloned();
                let user = user_entry(users, &subject_id);
                let member = members
                    .entry(subject_id.clone())
                    .or_insert_with(|| Member::new(subject_id.clone(), user));

                // Rewinding applies the pre-change side; streaming applies
                // the new side.
                let (depart, arrive) = if backward { (&new, &old) } else { (&old, &new) };
                let mut changes = ChangeSet::new();
                let depart_ms = depart.as_ref().map(|p| p.membership);
                let arrive_ms = arrive.as_ref().map(|p| p.membership);
                if depart_ms != arrive_ms {
                    changes.insert(
                        "membership".to_owned(),
                        change_pair(membership_json(depart_ms), membership_json(arrive_ms)),
                    );
                }
                member.membership = arrive_ms;
                let depart_dn = depart.as_ref().and_then(|p| p.display_name.clone());
                let arrive_dn = arrive.as_ref().and_then(|p| p.display_name.clone());
                if depart_dn != arrive_dn {
                    changes.insert(
                        "displayname".to_owned(),
                        change_pair(opt_string_json(&depart_dn), opt_string_json(&arrive_dn)),
                    );
                }
                member.display_name = arrive_dn;
                let subject = member.clone();
                let removed = arrive.is_none();
                if removed {
                    members.remove(&subject_id);
                }
                outcome.notes.push(RoomNote {
                    kind: NoteKind::Membership {
                        actor,
                        subject,
                        changes,
                    },
                    event: event.clone(),
                    backward,
                });
                if !backward && removed && local_user == Some(&subject_id) {
                    outcome.self_left = true;
                }
            }
        }
    }

    fn fold_message(&mut self, phase: Phase, event: &Event, outcome: &mut FoldOutcome) {
        let backward = match phase {
            Phase::Initial => return,
            Phase::Forward => false,
            Phase::Backward => true,
        };
        let Some(user_id) = &event.user_id else {
            outcome
                .protocol_errors
                .push("m.room.message without a sender".to_owned());
            return;
        };
        let members = if backward {
            match self.back.as_ref() {
                Some(back) => &back.members,
                None => {
                    outcome
                        .protocol_errors
                        .push("backward fold without a backward projection".to_owned());
                    return;
                }
            }
        } else {
            &self.state.members
        };
        match members.get(user_id) {
            Some(member) => outcome.notes.push(RoomNote {
                kind: NoteKind::Message {
                    member: member.clone(),
                    content: event.content.clone(),
                },
                event: event.clone(),
                backward,
            }),
            None => warn!(user_id = %user_id, "dropping message from unknown member"),
        }
    }

    fn fold_power_levels(&mut self, phase: Phase, event: &Event, outcome: &mut FoldOutcome) {
        let content: RoomPowerLevelsEventContent = match event.content_as() {
            Ok(content) => content,
            Err(e) => {
                outcome
                    .protocol_errors
                    .push(format!("bad m.room.power_levels content: {e}"));
                return;
            }
        };
        match phase {
            Phase::Initial => {
                self.state.user_levels = content.users;
                self.state.action_levels.extend(content.actions);
            }
            Phase::Forward => {
                self.fold_action_levels(phase, event, content.actions.clone(), None, outcome);
                let diffs = user_level_diffs(&self.state.user_levels, &content.users);
                self.state.user_levels = content.users;
                self.push_user_level_notes(diffs, event, false, outcome);
            }
            Phase::Backward => {
                let prev: RoomPowerLevelsEventContent = match event.prev_content_as() {
                    Ok(Some(prev)) => prev,
                    Ok(None) => {
                        debug!("power level event without prev_content while rewinding");
                        return;
                    }
                    Err(e) => {
                        outcome
                            .protocol_errors
                            .push(format!("bad m.room.power_levels prev_content: {e}"));
                        return;
                    }
                };
                self.fold_action_levels(
                    phase,
                    event,
                    content.actions.clone(),
                    Some(prev.actions.clone()),
                    outcome,
                );
                let diffs = user_level_diffs(&prev.users, &content.users);
                self.push_user_level_notes(diffs, event, true, outcome);
            }
        }
    }

    fn fold_ops_levels(&mut self, phase: Phase, event: &Event, outcome: &mut FoldOutcome) {
        let content: RoomOpsLevelsEventContent = match event.content_as() {
            Ok(content) => content,
            Err(e) => {
                outcome
                    .protocol_errors
                    .push(format!("bad m.room.ops_levels content: {e}"));
                return;
            }
        };
        let prev = match event.prev_content_as::<RoomOpsLevelsEventContent>() {
            Ok(prev) => prev.map(|c| c.actions()),
            Err(e) => {
                outcome
                    .protocol_errors
                    .push(format!("bad m.room.ops_levels prev_content: {e}"));
                return;
            }
        };
        self.fold_action_levels(phase, event, content.actions(), prev, outcome);
    }

    fn fold_single_level(
        &mut self,
        phase: Phase,
        event: &Event,
        action: PowerAction,
        outcome: &mut FoldOutcome,
    ) {
        let single = |content: RoomLevelEventContent| -> BTreeMap<PowerAction, i64> {
            content.level.map(|l| (action, l)).into_iter().collect()
        };
        let content: RoomLevelEventContent = match event.content_as() {
            Ok(content) => content,
            Err(e) => {
                outcome
                    .protocol_errors
                    .push(format!("bad {} content: {e}", event.event_type));
                return;
            }
        };
        let prev = match event.prev_content_as::<RoomLevelEventContent>() {
            Ok(prev) => prev.map(single),
            Err(e) => {
                outcome
                    .protocol_errors
                    .push(format!("bad {} prev_content: {e}", event.event_type));
                return;
            }
        };
        self.fold_action_levels(phase, event, single(content), prev, outcome);
    }

    /// Shared fold for action thresholds, whichever event generation they
    /// arrived in.
    fn fold_action_levels(
        &mut self,
        phase: Phase,
        event: &Event,
        current: BTreeMap<PowerAction, i64>,
        prev: Option<BTreeMap<PowerAction, i64>>,
        outcome: &mut FoldOutcome,
    ) {
        match phase {
            Phase::Initial => self.state.action_levels.extend(current),
            Phase::Forward => {
                let mut changes = ChangeSet::new();
                for (action, level) in &current {
                    let old = self.state.action_levels.get(action).copied();
                    if old != Some(*level) {
                        changes.insert(
                            format!("level.{}", action.as_str()),
                            change_pair(opt_i64_json(old), json!(level)),
                        );
                    }
                }
                self.state.action_levels.extend(current);
                if !changes.is_empty() {
                    self.push_state_note(event, changes, false, outcome);
                }
            }
            Phase::Backward => {
                let Some(prev) = prev else {
                    debug!(event_type = %event.event_type, "level event without prev_content while rewinding");
                    return;
                };
                let mut changes = ChangeSet::new();
                let actions: BTreeSet<PowerAction> =
                    current.keys().chain(prev.keys()).copied().collect();
                for action in actions {
                    let new = current.get(&action).copied();
                    let old = prev.get(&action).copied();
                    if new != old {
                        changes.insert(
                            format!("level.{}", action.as_str()),
                            change_pair(opt_i64_json(new), opt_i64_json(old)),
                        );
                    }
                }
                if !changes.is_empty() {
                    self.push_state_note(event, changes, true, outcome);
                }
            }
        }
    }

    fn push_user_level_notes(
        &self,
        diffs: Vec<(String, Option<i64>, Option<i64>)>,
        event: &Event,
        backward: bool,
        outcome: &mut FoldOutcome,
    ) {
        let members = if backward {
            match self.back.as_ref() {
                Some(back) => &back.members,
                None => return,
            }
        } else {
            &self.state.members
        };
        for (uid, old, new) in diffs {
            let Ok(user_id) = OwnedUserId::parse(&uid) else {
                debug!(key = %uid, "skipping non-user power level key");
                continue;
            };
            let Some(subject) = members.get(&user_id).cloned() else {
                debug!(user_id = %uid, "power level change for unknown member");
                continue;
            };
            let actor = self.actor_in(backward, event);
            let (slot0, slot1) = if backward { (new, old) } else { (old, new) };
            let mut changes = ChangeSet::new();
            changes.insert(
                "level".to_owned(),
                change_pair(opt_i64_json(slot0), opt_i64_json(slot1)),
            );
            outcome.notes.push(RoomNote {
                kind: NoteKind::Membership {
                    actor,
                    subject,
                    changes,
                },
                event: event.clone(),
                backward,
            });
        }
    }
}

/// Resolved per-user level differences between two level maps.
///
/// Users missing on one side resolve through that side's `default`; users
/// removed outright are reported against the old side's default.
fn user_level_diffs(
    old_map: &BTreeMap<String, i64>,
    new_map: &BTreeMap<String, i64>,
) -> Vec<(String, Option<i64>, Option<i64>)> {
    let old_default = old_map.get("default").copied();
    let new_default = new_map.get("default").copied();
    let mut diffs = Vec::new();
    let uids: BTreeSet<&String> = old_map.keys().chain(new_map.keys()).collect();
    for uid in uids {
        if uid.as_str() == "default" {
            continue;
        }
        let old = old_map.get(uid).copied().or(old_default);
        let new = if new_map.contains_key(uid) {
            new_map.get(uid).copied()
        } else if old_map.contains_key(uid) {
            old_default
        } else {
            new_default
        };
        if old != new {
            diffs.push((uid.clone(), old, new));
        }
    }
    diffs
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn member_event(
        subject: &str,
        content: JsonValue,
        prev_content: Option<JsonValue>,
    ) -> Event {
        let mut event = Event::new("m.room.member", content);
        event.user_id = Some(OwnedUserId::parse(subject).unwrap());
        event.state_key = Some(subject.to_owned());
        event.prev_content = prev_content;
        event
    }

    fn fold(
        inner: &mut RoomInner,
        kind: RoomEventKind,
        phase: Phase,
        event: &Event,
        users: &mut UserMap,
    ) -> FoldOutcome {
        inner.fold_event(kind, phase, event, &[], None, users)
    }

    #[test]
    fn forward_member_fold_tracks_changes() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();

        let join = member_event("@a:h.test", json!({"membership": "join"}), None);
        let outcome = fold(&mut inner, RoomEventKind::Member, Phase::Forward, &join, &mut users);
        assert_eq!(outcome.notes.len(), 1);
        let NoteKind::Membership { changes, subject, .. } = &outcome.notes[0].kind else {
            panic!("expected a membership note");
        };
        assert_eq!(changes["membership"], vec![json!(null), json!("join")]);
        assert_eq!(subject.user_id, "@a:h.test");
        assert!(inner.state.members.contains_key(&OwnedUserId::parse("@a:h.test").unwrap()));
    }

    #[test]
    fn leave_is_normalised_to_absent_and_member_removed() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();
        let join = member_event("@a:h.test", json!({"membership": "join"}), None);
        fold(&mut inner, RoomEventKind::Member, Phase::Forward, &join, &mut users);

        let leave = member_event(
            "@a:h.test",
            json!({"membership": "leave"}),
            Some(json!({"membership": "join"})),
        );
        let outcome = fold(&mut inner, RoomEventKind::Member, Phase::Forward, &leave, &mut users);
        let NoteKind::Membership { changes, .. } = &outcome.notes[0].kind else {
            panic!("expected a membership note");
        };
        assert_eq!(changes["membership"], vec![json!("join"), json!(null)]);
        assert!(inner.state.members.is_empty());
    }

    #[test]
    fn self_leave_is_flagged_forward_only() {
        let me = OwnedUserId::parse("@me:h.test").unwrap();
        let mut users = UserMap::new();
        let mut inner = RoomInner::new();
        let join = member_event("@me:h.test", json!({"membership": "join"}), None);
        inner.fold_event(RoomEventKind::Member, Phase::Forward, &join, &[], Some(&me), &mut users);

        let leave = member_event(
            "@me:h.test",
            json!({"membership": "leave"}),
            Some(json!({"membership": "join"})),
        );
        let outcome =
            inner.fold_event(RoomEventKind::Member, Phase::Forward, &leave, &[], Some(&me), &mut users);
        assert!(outcome.self_left);

        // Rewinding past our own join must not deregister the room.
        inner.ensure_backward();
        let backward_join = member_event("@me:h.test", json!({"membership": "join"}), None);
        let outcome = inner.fold_event(
            RoomEventKind::Member,
            Phase::Backward,
            &backward_join,
            &[],
            Some(&me),
            &mut users,
        );
        assert!(!outcome.self_left);
    }

    #[test]
    fn duplicate_initial_member_is_ignored() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();
        let first = member_event(
            "@a:h.test",
            json!({"membership": "join", "displayname": "A"}),
            None,
        );
        fold(&mut inner, RoomEventKind::Member, Phase::Initial, &first, &mut users);
        let second = member_event(
            "@a:h.test",
            json!({"membership": "join", "displayname": "other"}),
            None,
        );
        fold(&mut inner, RoomEventKind::Member, Phase::Initial, &second, &mut users);

        let member = &inner.state.members[&OwnedUserId::parse("@a:h.test").unwrap()];
        assert_eq!(member.display_name.as_deref(), Some("A"));
    }

    #[test]
    fn scalar_forward_pair_is_old_then_new() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();
        let mut event = Event::new("m.room.name", json!({"name": "First"}));
        event.user_id = Some(OwnedUserId::parse("@a:h.test").unwrap());
        fold(&mut inner, RoomEventKind::Name, Phase::Forward, &event, &mut users);
        assert_eq!(inner.state.name.as_deref(), Some("First"));

        let event = Event::new("m.room.name", json!({"name": "Second"}));
        let outcome = fold(&mut inner, RoomEventKind::Name, Phase::Forward, &event, &mut users);
        let NoteKind::StateChanged { changes, .. } = &outcome.notes[0].kind else {
            panic!("expected a state note");
        };
        assert_eq!(changes["name"], vec![json!("First"), json!("Second")]);
    }

    #[test]
    fn scalar_backward_pair_ends_with_older_value() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();
        inner.state.name = Some("Live".to_owned());
        inner.ensure_backward();

        let mut event = Event::new("m.room.name", json!({"name": "Live"}));
        event.prev_content = Some(json!({"name": "Older"}));
        let outcome = fold(&mut inner, RoomEventKind::Name, Phase::Backward, &event, &mut users);
        let NoteKind::StateChanged { changes, .. } = &outcome.notes[0].kind else {
            panic!("expected a state note");
        };
        assert_eq!(changes["name"], vec![json!("Live"), json!("Older")]);
        // Backward scalar folds never touch the forward projection.
        assert_eq!(inner.state.name.as_deref(), Some("Live"));
    }

    #[test]
    fn alias_fold_reports_other_servers() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();

        let mut seed = Event::new("m.room.aliases", json!({"aliases": ["#a:one"]}));
        seed.state_key = Some("one".to_owned());
        fold(&mut inner, RoomEventKind::Aliases, Phase::Initial, &seed, &mut users);

        let mut event = Event::new("m.room.aliases", json!({"aliases": ["#b:two", "#c:two"]}));
        event.state_key = Some("two".to_owned());
        let outcome = fold(&mut inner, RoomEventKind::Aliases, Phase::Forward, &event, &mut users);
        let NoteKind::StateChanged { changes, .. } = &outcome.notes[0].kind else {
            panic!("expected a state note");
        };
        assert_eq!(
            changes["aliases"],
            vec![json!([]), json!(["#b:two", "#c:two"]), json!(["#a:one"])]
        );
        assert_eq!(inner.state.aliases().len(), 3);
    }

    #[test]
    fn power_level_fold_resolves_defaults() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();
        for uid in ["@a:h.test", "@b:h.test"] {
            let join = member_event(uid, json!({"membership": "join"}), None);
            fold(&mut inner, RoomEventKind::Member, Phase::Forward, &join, &mut users);
        }
        let seed = Event::new("m.room.power_levels", json!({"default": 0, "@a:h.test": 50}));
        fold(&mut inner, RoomEventKind::PowerLevels, Phase::Initial, &seed, &mut users);
        assert_eq!(inner.state.member_level("@a:h.test"), Some(50));
        assert_eq!(inner.state.member_level("@b:h.test"), Some(0));

        let mut event = Event::new(
            "m.room.power_levels",
            json!({"default": 0, "@a:h.test": 100}),
        );
        event.prev_content = Some(json!({"default": 0, "@a:h.test": 50}));
        let outcome =
            fold(&mut inner, RoomEventKind::PowerLevels, Phase::Forward, &event, &mut users);
        let membership_notes: Vec<_> = outcome
            .notes
            .iter()
            .filter_map(|n| match &n.kind {
                NoteKind::Membership { subject, changes, .. } => Some((subject, changes)),
                _ => None,
            })
            .collect();
        assert_eq!(membership_notes.len(), 1);
        let (subject, changes) = &membership_notes[0];
        assert_eq!(subject.user_id, "@a:h.test");
        assert_eq!(changes["level"], vec![json!(50), json!(100)]);
    }

    #[test]
    fn legacy_ops_levels_normalise_to_actions() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();
        let event = Event::new("m.room.ops_levels", json!({"ban_level": 60, "kick_level": 50}));
        let outcome = fold(&mut inner, RoomEventKind::OpsLevels, Phase::Forward, &event, &mut users);
        let NoteKind::StateChanged { changes, .. } = &outcome.notes[0].kind else {
            panic!("expected a state note");
        };
        assert_eq!(changes["level.ban"], vec![json!(null), json!(60)]);
        assert_eq!(changes["level.kick"], vec![json!(null), json!(50)]);
        assert_eq!(inner.state.action_levels[&PowerAction::Ban], 60);
    }

    #[test]
    fn backward_membership_round_trip_restores_initial_members() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();

        // E1: @a joins, E2: @b joins, E3: @a leaves.
        let e1 = member_event("@a:h.test", json!({"membership": "join"}), None);
        let e2 = member_event("@b:h.test", json!({"membership": "join"}), None);
        let e3 = member_event(
            "@a:h.test",
            json!({"membership": "leave"}),
            Some(json!({"membership": "join"})),
        );
        for event in [&e1, &e2, &e3] {
            fold(&mut inner, RoomEventKind::Member, Phase::Forward, event, &mut users);
        }
        inner.ensure_backward();

        // Rewind E3, E2, E1: the backward member set must end up empty,
        // matching the state before E1.
        for event in [&e3, &e2, &e1] {
            fold(&mut inner, RoomEventKind::Member, Phase::Backward, event, &mut users);
        }
        assert!(inner.back.as_ref().unwrap().members.is_empty());
        // The forward projection is untouched by the rewind.
        assert_eq!(inner.state.members.len(), 1);
    }

    #[test]
    fn create_event_marks_history_start_only_backwards() {
        let mut inner = RoomInner::new();
        let mut users = UserMap::new();
        let event = Event::new("m.room.create", json!({"creator": "@a:h.test"}));
        let outcome = fold(&mut inner, RoomEventKind::Create, Phase::Forward, &event, &mut users);
        assert!(!outcome.saw_create);
        let outcome = fold(&mut inner, RoomEventKind::Create, Phase::Backward, &event, &mut users);
        assert!(outcome.saw_create);
    }
}
