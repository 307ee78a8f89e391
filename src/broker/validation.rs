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

use crate::task::{
    NodeRef,
    Task,
    TaskIns,
    TaskRes,
};

fn validate_common(errors: &mut Vec<String>, task_id: &str, run_id: i64, task: &Task) {
    if !task_id.is_empty() {
        errors.push("non-empty `task_id`; the store assigns ids on admission".to_owned());
    }

    if run_id == 0 {
        errors.push("`run_id` must be non-zero".to_owned());
    }

    if !task.delivered_at.is_empty() {
        errors.push("`delivered_at` must be empty on admission".to_owned());
    }

    for (side, node) in [("producer", &task.producer), ("consumer", &task.consumer)] {
        if node.anonymous != (node.node_id == 0) {
            errors.push(format!(
                "inconsistent {side}: `anonymous` must hold exactly when `node_id` is 0"
            ));
        }
    }
}

/// Structural checks on an instruction before admission.
///
/// Returns one entry per violation; an empty list means the task is valid.
#[must_use]
pub fn validate_task_ins(task_ins: &TaskIns) -> Vec<String> {
    let mut errors = Vec::new();

    validate_common(&mut errors, &task_ins.task_id, task_ins.run_id, &task_ins.task);

    // an instruction is produced by the broker side for a worker
    if task_ins.task.producer != NodeRef::ANONYMOUS {
        errors.push("`producer` of an instruction must be the anonymous broker side".to_owned());
    }

    if !task_ins.task.ancestry.is_empty() {
        errors.push("`ancestry` must be empty for an instruction".to_owned());
    }

    errors
}

/// Structural checks on a reply before admission.
///
/// Returns one entry per violation; an empty list means the task is valid.
/// Whether `ancestry[0]` still references a stored instruction is deliberately
/// *not* checked here (late replies may arrive after a GC sweep).
#[must_use]
pub fn validate_task_res(task_res: &TaskRes) -> Vec<String> {
    let mut errors = Vec::new();

    validate_common(&mut errors, &task_res.task_id, task_res.run_id, &task_res.task);

    // a reply is consumed by the broker side
    if task_res.task.consumer != NodeRef::ANONYMOUS {
        errors.push("`consumer` of a reply must be the anonymous broker side".to_owned());
    }

    if task_res.task.ancestry.first().map_or(true, String::is_empty) {
        errors.push("`ancestry[0]` of a reply must name the instruction it answers".to_owned());
    }

    errors
}
