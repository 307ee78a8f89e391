/*
 * ‌
 * Fedlink Rust SDK
 * ​
 * Copyright (C) 2023 - 2026 Fedlink Labs
 * ​
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 * ‍
 */

use std::collections::{
    HashMap,
    HashSet,
};
use std::num::NonZeroUsize;
use std::time::{
    Duration,
    Instant,
};

use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::Rng;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::validation::{
    validate_task_ins,
    validate_task_res,
};
use crate::task::new_task_id;
use crate::{
    Error,
    TaskIns,
    TaskRes,
};

/// Tunables of a [`BrokerState`].
#[derive(Debug, Copy, Clone)]
pub struct BrokerConfig {
    /// How long a freshly registered node stays alive without a heartbeat.
    pub ping_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { ping_interval: Duration::from_secs(30) }
    }
}

struct NodeEntry {
    /// The node is alive while `online_until` lies in the future. Monotonic,
    /// so wall-clock adjustments cannot kill or resurrect nodes.
    online_until: Instant,
    ping_interval: Duration,
}

#[derive(Default)]
struct State {
    task_ins_store: HashMap<String, TaskIns>,
    task_res_store: HashMap<String, TaskRes>,
    node_ids: HashMap<i64, NodeEntry>,
    run_ids: HashSet<i64>,
}

/// The broker's in-memory task store.
///
/// Pairs instructions with their replies, enforces delivery-once semantics,
/// tracks node liveness via heartbeats, and garbage-collects task pairs.
/// Memory-resident: nothing survives a process restart.
///
/// All four tables are guarded by one mutex; every operation holds it for an
/// O(stored-tasks) scan at most and never performs I/O under it.
pub struct BrokerState {
    config: BrokerConfig,
    state: Mutex<State>,
}

impl BrokerState {
    /// An empty store with no runs, nodes, or tasks.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        Self { config, state: Mutex::default() }
    }

    /// Admit an instruction, returning its store-assigned task id.
    ///
    /// Returns `None` (after logging) when validation fails or the run is
    /// unknown; nothing is partially inserted.
    pub fn store_task_ins(&self, mut task: TaskIns) -> Option<String> {
        let errors = validate_task_ins(&task);
        if !errors.is_empty() {
            log::error!("rejecting instruction: {}", errors.join("; "));
            return None;
        }

        let mut state = self.state.lock();

        if !state.run_ids.contains(&task.run_id) {
            log::error!("rejecting instruction for unknown run {}", task.run_id);
            return None;
        }

        let task_id = new_task_id();
        task.task_id = task_id.clone();
        state.task_ins_store.insert(task_id.clone(), task);

        Some(task_id)
    }

    /// Fetch undelivered instructions for `node_id`, or anonymous ones when
    /// `node_id` is `None`.
    ///
    /// Every returned instruction is stamped delivered before this returns and
    /// will never be selected again.
    pub fn get_task_ins(&self, node_id: Option<i64>, limit: Option<NonZeroUsize>) -> Vec<TaskIns> {
        let mut state = self.state.lock();
        let now = now_rfc3339();

        let mut tasks = Vec::new();

        for task in state.task_ins_store.values_mut() {
            if limit.map_or(false, |limit| tasks.len() >= limit.get()) {
                break;
            }

            if !task.task.delivered_at.is_empty() {
                continue;
            }

            let matches = match node_id {
                Some(id) => !task.task.consumer.anonymous && task.task.consumer.node_id == id,
                None => task.task.consumer.anonymous && task.task.consumer.node_id == 0,
            };

            if !matches {
                continue;
            }

            task.task.delivered_at = now.clone();
            tasks.push(task.clone());
        }

        tasks
    }

    /// Admit a reply, returning its store-assigned task id.
    ///
    /// Whether `ancestry[0]` still names a stored instruction is *not*
    /// verified: a late reply may legitimately arrive after its instruction
    /// was swept.
    pub fn store_task_res(&self, mut task: TaskRes) -> Option<String> {
        let errors = validate_task_res(&task);
        if !errors.is_empty() {
            log::error!("rejecting reply: {}", errors.join("; "));
            return None;
        }

        let mut state = self.state.lock();

        if !state.run_ids.contains(&task.run_id) {
            log::error!("rejecting reply for unknown run {}", task.run_id);
            return None;
        }

        let task_id = new_task_id();
        task.task_id = task_id.clone();
        state.task_res_store.insert(task_id.clone(), task);

        Some(task_id)
    }

    /// Fetch undelivered replies answering any of `task_ids`, stamping them
    /// delivered before returning.
    pub fn get_task_res(
        &self,
        task_ids: &HashSet<String>,
        limit: Option<NonZeroUsize>,
    ) -> Vec<TaskRes> {
        let mut state = self.state.lock();
        let now = now_rfc3339();

        let mut tasks = Vec::new();

        for task in state.task_res_store.values_mut() {
            if limit.map_or(false, |limit| tasks.len() >= limit.get()) {
                break;
            }

            if !task.task.delivered_at.is_empty() {
                continue;
            }

            if !task.task.ancestry.first().map_or(false, |parent| task_ids.contains(parent)) {
                continue;
            }

            task.task.delivered_at = now.clone();
            tasks.push(task.clone());
        }

        tasks
    }

    /// Garbage-collect instruction/reply pairs.
    ///
    /// For each instruction id, both sides are removed iff a reply answering
    /// it exists *and* that reply has been delivered; everything else is left
    /// untouched. An instruction is never deleted without its pair.
    pub fn delete_tasks(&self, task_ins_ids: &HashSet<String>) {
        let mut state = self.state.lock();

        let mut ins_to_delete: HashSet<String> = HashSet::new();
        let mut res_to_delete: HashSet<String> = HashSet::new();

        for task_ins_id in task_ins_ids {
            for (task_res_id, task_res) in &state.task_res_store {
                if task_res.task.ancestry.first() == Some(task_ins_id)
                    && !task_res.task.delivered_at.is_empty()
                {
                    ins_to_delete.insert(task_ins_id.clone());
                    res_to_delete.insert(task_res_id.clone());
                }
            }
        }

        state.task_ins_store.retain(|task_id, _| !ins_to_delete.contains(task_id));
        state.task_res_store.retain(|task_id, _| !res_to_delete.contains(task_id));
    }

    /// Current instruction count, delivered-not-yet-deleted entries included.
    #[must_use]
    pub fn num_task_ins(&self) -> usize {
        self.state.lock().task_ins_store.len()
    }

    /// Current reply count, delivered-not-yet-deleted entries included.
    #[must_use]
    pub fn num_task_res(&self) -> usize {
        self.state.lock().task_res_store.len()
    }

    /// Register a new node under a random id, alive for one ping interval.
    ///
    /// Returns 0 when registration failed (id collision).
    pub fn create_node(&self) -> i64 {
        let node_id: i64 = OsRng.gen();

        let mut state = self.state.lock();

        if node_id == 0 || state.node_ids.contains_key(&node_id) {
            log::error!("unexpected node registration failure; id already taken");
            return 0;
        }

        state.node_ids.insert(
            node_id,
            NodeEntry {
                online_until: Instant::now() + self.config.ping_interval,
                ping_interval: self.config.ping_interval,
            },
        );

        node_id
    }

    /// Remove a node from the registry.
    pub fn delete_node(&self, node_id: i64) -> crate::Result<()> {
        let mut state = self.state.lock();

        state.node_ids.remove(&node_id).map(|_| ()).ok_or(Error::NodeNotFound(node_id))
    }

    /// The set of nodes currently alive for `run_id`; empty for unknown runs.
    #[must_use]
    pub fn get_nodes(&self, run_id: i64) -> HashSet<i64> {
        let state = self.state.lock();

        if !state.run_ids.contains(&run_id) {
            return HashSet::new();
        }

        let now = Instant::now();

        state
            .node_ids
            .iter()
            .filter(|(_, entry)| entry.online_until > now)
            .map(|(node_id, _)| *node_id)
            .collect()
    }

    /// Refresh a node's liveness window. Returns false for unregistered nodes.
    pub fn acknowledge_ping(&self, node_id: i64, ping_interval: Duration) -> bool {
        let mut state = self.state.lock();

        match state.node_ids.get_mut(&node_id) {
            Some(entry) => {
                entry.online_until = Instant::now() + ping_interval;
                entry.ping_interval = ping_interval;
                true
            }
            None => false,
        }
    }

    /// Mint a new run id. Run ids are never deleted.
    pub fn create_run(&self) -> i64 {
        let mut state = self.state.lock();

        loop {
            let run_id: i64 = OsRng.gen();

            if run_id != 0 && state.run_ids.insert(run_id) {
                return run_id;
            }
        }
    }
}

impl Default for BrokerState {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("RFC 3339 formatting of a UTC timestamp cannot fail")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use bytes::Bytes;
    use time::OffsetDateTime;

    use crate::broker::{
        BrokerConfig,
        BrokerState,
    };
    use crate::{
        Error,
        Message,
        MessageType,
        Metadata,
        Payload,
        TaskIns,
        TaskRes,
    };

    fn instruction(run_id: i64, dst_node_id: i64) -> TaskIns {
        TaskIns::from_message(Message {
            metadata: Metadata {
                message_id: String::new(),
                run_id,
                group_id: "round-1".to_owned(),
                message_type: MessageType::Train,
                src_node_id: 0,
                dst_node_id,
                reply_to: String::new(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            payload: Payload::Content(Bytes::from_static(b"params")),
        })
    }

    fn reply_to(ins: &TaskIns, src_node_id: i64) -> TaskRes {
        TaskRes::from_message(Message {
            metadata: Metadata {
                message_id: String::new(),
                run_id: ins.run_id,
                group_id: ins.group_id.clone(),
                message_type: ins.task.message_type,
                src_node_id,
                dst_node_id: 0,
                reply_to: ins.task_id.clone(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            payload: Payload::Content(Bytes::from_static(b"update")),
        })
    }

    fn limit(n: usize) -> Option<NonZeroUsize> {
        Some(NonZeroUsize::new(n).unwrap())
    }

    #[test]
    fn store_assigns_wire_visible_task_id() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        let task_id = broker.store_task_ins(instruction(run_id, 42)).unwrap();

        let fetched = broker.get_task_ins(Some(42), None);
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].task_id, task_id);
    }

    #[test]
    fn unknown_run_is_rejected() {
        let broker = BrokerState::default();

        assert_eq!(broker.store_task_ins(instruction(999, 42)), None);
        assert_eq!(broker.num_task_ins(), 0);
    }

    #[test]
    fn invalid_instruction_is_rejected() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        let mut ins = instruction(run_id, 42);
        ins.task_id = "preassigned".to_owned();

        assert_eq!(broker.store_task_ins(ins), None);
        assert_eq!(broker.num_task_ins(), 0);
    }

    #[test]
    fn delivery_is_idempotent_against_refetch() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();
        broker.store_task_ins(instruction(run_id, 42)).unwrap();

        let first = broker.get_task_ins(Some(42), None);
        assert_eq!(first.len(), 1);
        assert!(!first[0].task.delivered_at.is_empty());

        assert!(broker.get_task_ins(Some(42), None).is_empty());
        assert_eq!(broker.num_task_ins(), 1);
    }

    #[test]
    fn anonymous_and_targeted_pulls_are_disjoint() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        let anon_id = broker.store_task_ins(instruction(run_id, 0)).unwrap();
        let targeted_id = broker.store_task_ins(instruction(run_id, 42)).unwrap();

        let anonymous = broker.get_task_ins(None, limit(10));
        assert_eq!(anonymous.len(), 1);
        assert_eq!(anonymous[0].task_id, anon_id);

        let targeted = broker.get_task_ins(Some(42), limit(10));
        assert_eq!(targeted.len(), 1);
        assert_eq!(targeted[0].task_id, targeted_id);
    }

    #[test]
    fn limit_caps_the_scan() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        for _ in 0..5 {
            broker.store_task_ins(instruction(run_id, 42)).unwrap();
        }

        assert_eq!(broker.get_task_ins(Some(42), limit(2)).len(), 2);
        assert_eq!(broker.get_task_ins(Some(42), None).len(), 3);
    }

    #[test]
    fn replies_are_fetched_by_ancestry() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        let mut ins = instruction(run_id, 42);
        let task_id = broker.store_task_ins(ins.clone()).unwrap();
        ins.task_id = task_id.clone();

        broker.store_task_res(reply_to(&ins, 42)).unwrap();

        let fetched = broker.get_task_res(&HashSet::from([task_id]), None);
        assert_eq!(fetched.len(), 1);
        assert!(!fetched[0].task.delivered_at.is_empty());

        // delivered replies are never re-selected
        assert!(broker
            .get_task_res(&fetched.iter().flat_map(|t| t.task.ancestry.clone()).collect(), None)
            .is_empty());
    }

    #[test]
    fn late_reply_without_instruction_is_admitted() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        let mut ghost = instruction(run_id, 42);
        ghost.task_id = "b13efeab-1e3a-4c9e-9d46-929e71a82db0".to_owned();

        assert!(broker.store_task_res(reply_to(&ghost, 42)).is_some());
        assert_eq!(broker.num_task_res(), 1);
    }

    #[test]
    fn paired_gc_deletes_both_sides() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        let mut ins = instruction(run_id, 42);
        let task_id = broker.store_task_ins(ins.clone()).unwrap();
        ins.task_id = task_id.clone();

        broker.store_task_res(reply_to(&ins, 42)).unwrap();

        // deliver both sides
        broker.get_task_ins(Some(42), None);
        broker.get_task_res(&HashSet::from([task_id.clone()]), None);

        broker.delete_tasks(&HashSet::from([task_id]));

        assert_eq!(broker.num_task_ins(), 0);
        assert_eq!(broker.num_task_res(), 0);
    }

    #[test]
    fn gc_without_delivered_reply_is_a_noop() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        let mut ins = instruction(run_id, 42);
        let task_id = broker.store_task_ins(ins.clone()).unwrap();
        ins.task_id = task_id.clone();

        // instruction delivered, reply stored but *not* delivered
        broker.get_task_ins(Some(42), None);
        broker.store_task_res(reply_to(&ins, 42)).unwrap();

        broker.delete_tasks(&HashSet::from([task_id.clone()]));
        assert_eq!(broker.num_task_ins(), 1);
        assert_eq!(broker.num_task_res(), 1);

        // no reply at all
        let other_id = broker.store_task_ins(instruction(run_id, 7)).unwrap();
        broker.delete_tasks(&HashSet::from([other_id]));
        assert_eq!(broker.num_task_ins(), 2);
    }

    #[test]
    fn gc_leaves_unrelated_entries_untouched() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        let mut a = instruction(run_id, 1);
        let a_id = broker.store_task_ins(a.clone()).unwrap();
        a.task_id = a_id.clone();

        let b_id = broker.store_task_ins(instruction(run_id, 2)).unwrap();

        broker.store_task_res(reply_to(&a, 1)).unwrap();
        broker.get_task_ins(Some(1), None);
        broker.get_task_res(&HashSet::from([a_id.clone()]), None);

        broker.delete_tasks(&HashSet::from([a_id, b_id]));

        assert_eq!(broker.num_task_ins(), 1);
        assert_eq!(broker.num_task_res(), 0);
    }

    #[test]
    fn node_lifecycle() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        let node_id = broker.create_node();
        assert_ne!(node_id, 0);

        assert!(broker.get_nodes(run_id).contains(&node_id));

        broker.delete_node(node_id).unwrap();
        assert!(broker.get_nodes(run_id).is_empty());

        assert_matches!(broker.delete_node(node_id), Err(Error::NodeNotFound(id)) if id == node_id);
    }

    #[test]
    fn unknown_run_has_no_nodes() {
        let broker = BrokerState::default();
        broker.create_node();

        assert!(broker.get_nodes(12345).is_empty());
    }

    #[test]
    fn liveness_expires_without_heartbeat() {
        let broker = BrokerState::new(BrokerConfig { ping_interval: Duration::ZERO });
        let run_id = broker.create_run();

        let node_id = broker.create_node();

        // the zero-length window is already over
        assert!(!broker.get_nodes(run_id).contains(&node_id));

        assert!(broker.acknowledge_ping(node_id, Duration::from_secs(30)));
        assert!(broker.get_nodes(run_id).contains(&node_id));
    }

    #[test]
    fn ping_for_unknown_node_is_refused() {
        let broker = BrokerState::default();

        assert!(!broker.acknowledge_ping(616, Duration::from_secs(30)));
    }

    #[test]
    fn task_counts_track_successful_admissions() {
        let broker = BrokerState::default();
        let run_id = broker.create_run();

        assert_eq!(broker.num_task_ins(), 0);

        broker.store_task_ins(instruction(run_id, 42)).unwrap();
        broker.store_task_ins(instruction(run_id, 42)).unwrap();
        assert_eq!(broker.store_task_ins(instruction(999, 42)), None);

        assert_eq!(broker.num_task_ins(), 2);
        assert_eq!(broker.num_task_res(), 0);
    }
}
