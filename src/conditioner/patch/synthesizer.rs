/*
 * Copyright (C) 2024 The Conditioner Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Builds the single JSON Patch operation (RFC 6902) that applies a
//! [`MutationRequest`] to a node's `status.conditions` array.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::locator::ConditionIndex;
use crate::conditioner::k8s::node::{ConditionStatus, NodeCondition};

/// JSON Pointer to the node condition array.
pub const BASE_PATH: &str = "/status/conditions";

/// JSON Pointer token that addresses the position past the last element.
pub const APPEND_MARKER: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl PatchOp {
    /// Picks the operation for a located condition. `remove` wins over
    /// everything, then an absent condition is added, otherwise replaced.
    pub fn select(index: ConditionIndex, remove: bool) -> Self {
        if remove {
            return PatchOp::Remove;
        }
        match index {
            ConditionIndex::Absent => PatchOp::Add,
            ConditionIndex::At(_) => PatchOp::Replace,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Replace => "replace",
            PatchOp::Remove => "remove",
        }
    }

    /// Past tense used when reporting the outcome.
    pub fn past_tense(self) -> &'static str {
        match self {
            PatchOp::Add => "added",
            PatchOp::Replace => "replaced",
            PatchOp::Remove => "removed",
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One JSON Patch operation. `value` is omitted for removals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<NodeCondition>,
}

impl PatchOperation {
    /// Encodes the operation as the one-element array expected by a
    /// `application/json-patch+json` request.
    pub fn to_patch_document(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&[self])
    }
}

/// Operator intent for a single condition.
///
/// Blank `reason` or `message` values count as unset and fall back to the
/// existing condition during a replace.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub condition_type: String,
    pub status: Option<ConditionStatus>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub remove: bool,
}

impl MutationRequest {
    pub fn new(condition_type: impl Into<String>) -> Self {
        Self {
            condition_type: condition_type.into(),
            status: None,
            reason: None,
            message: None,
            remove: false,
        }
    }

    fn reason(&self) -> Option<&str> {
        self.reason.as_deref().filter(|value| !value.is_empty())
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|value| !value.is_empty())
    }
}

pub fn path_for(op: PatchOp, index: ConditionIndex) -> String {
    match (op, index) {
        (PatchOp::Add, _) | (_, ConditionIndex::Absent) => {
            format!("{BASE_PATH}/{APPEND_MARKER}")
        }
        (_, ConditionIndex::At(position)) => format!("{BASE_PATH}/{position}"),
    }
}

/// Synthesizes the patch using the current wall-clock time for both
/// condition timestamps.
pub fn synthesize(
    index: ConditionIndex,
    remove: bool,
    old: Option<&NodeCondition>,
    request: &MutationRequest,
) -> PatchOperation {
    synthesize_at(Utc::now(), index, remove, old, request)
}

/// Same as [`synthesize`] with an explicit timestamp.
///
/// Callers must reject `remove` against an absent condition before getting
/// here; the result in that case still addresses the append marker.
pub fn synthesize_at(
    now: DateTime<Utc>,
    index: ConditionIndex,
    remove: bool,
    old: Option<&NodeCondition>,
    request: &MutationRequest,
) -> PatchOperation {
    let op = PatchOp::select(index, remove);
    let path = path_for(op, index);

    if op == PatchOp::Remove {
        return PatchOperation {
            op,
            path,
            value: None,
        };
    }

    let previous = old.filter(|_| !index.is_absent());
    let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    let status = match (request.status, previous) {
        (Some(status), _) => status.as_str().to_string(),
        (None, Some(previous)) => previous.status.clone(),
        (None, None) => ConditionStatus::Unknown.as_str().to_string(),
    };

    let reason = request
        .reason()
        .map(str::to_string)
        .or_else(|| previous.map(|previous| previous.reason.clone()))
        .unwrap_or_default();

    // A blank message inherits the previous *reason*, not the previous
    // message. Existing callers depend on this.
    let message = request
        .message()
        .map(str::to_string)
        .or_else(|| previous.map(|previous| previous.reason.clone()))
        .unwrap_or_default();

    PatchOperation {
        op,
        path,
        value: Some(NodeCondition {
            condition_type: request.condition_type.clone(),
            status,
            last_heartbeat_time: Some(stamp.clone()),
            last_transition_time: Some(stamp),
            reason,
            message,
        }),
    }
}
