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

use std::collections::HashMap;

use bytes::Bytes;

/// The per-run state a client app sees across rounds.
///
/// Created empty on the first message of a run, mutated by the app, and kept
/// until the process exits. Opaque to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// The run this context belongs to.
    pub run_id: i64,

    /// Free-form records the app persists between rounds.
    pub records: HashMap<String, Bytes>,
}

impl Context {
    fn new(run_id: i64) -> Self {
        Self { run_id, records: HashMap::new() }
    }
}

/// Per-node map from run id to the run's [`Context`].
///
/// No cross-run sharing, no eviction; contexts die with the process.
#[derive(Debug, Default)]
pub struct NodeState {
    contexts: HashMap<i64, Context>,
}

impl NodeState {
    /// An empty state with no registered runs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a fresh context for `run_id` if none exists. Idempotent.
    pub fn register_context(&mut self, run_id: i64) {
        self.contexts.entry(run_id).or_insert_with(|| Context::new(run_id));
    }

    /// Get the current context of `run_id`.
    ///
    /// # Panics
    /// If `run_id` was never passed to [`NodeState::register_context`].
    #[must_use]
    pub fn retrieve_context(&self, run_id: i64) -> Context {
        self.contexts
            .get(&run_id)
            .cloned()
            .expect("`register_context` must be called before `retrieve_context`")
    }

    /// Replace the stored context of `run_id`.
    pub fn update_context(&mut self, run_id: i64, context: Context) {
        self.contexts.insert(run_id, context);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::NodeState;

    #[test]
    fn register_is_idempotent() {
        let mut state = NodeState::new();

        state.register_context(7);

        let mut context = state.retrieve_context(7);
        context.records.insert("round".to_owned(), Bytes::from_static(b"1"));
        state.update_context(7, context);

        // a second registration must not reset the stored context
        state.register_context(7);
        assert_eq!(state.retrieve_context(7).records.len(), 1);
    }

    #[test]
    fn updates_are_visible_to_every_subsequent_retrieve() {
        let mut state = NodeState::new();
        state.register_context(7);

        let mut context = state.retrieve_context(7);
        context.records.insert("weights".to_owned(), Bytes::from_static(b"abc"));
        state.update_context(7, context.clone());

        assert_eq!(state.retrieve_context(7), context);
        assert_eq!(state.retrieve_context(7), context);
    }

    #[test]
    fn runs_do_not_share_contexts() {
        let mut state = NodeState::new();
        state.register_context(1);
        state.register_context(2);

        let mut context = state.retrieve_context(1);
        context.records.insert("k".to_owned(), Bytes::from_static(b"v"));
        state.update_context(1, context);

        assert!(state.retrieve_context(2).records.is_empty());
        assert_eq!(state.retrieve_context(2).run_id, 2);
    }

    #[test]
    #[should_panic(expected = "`register_context` must be called before")]
    fn retrieve_without_register_panics() {
        NodeState::new().retrieve_context(99);
    }
}
