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

use std::fmt;

use crate::conditioner::k8s::node::NodeCondition;

/// Position of a condition inside a node's condition array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionIndex {
    Absent,
    At(usize),
}

impl ConditionIndex {
    pub fn position(self) -> Option<usize> {
        match self {
            ConditionIndex::Absent => None,
            ConditionIndex::At(index) => Some(index),
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, ConditionIndex::Absent)
    }

    /// Signed form used in logs and API boundaries, `-1` when absent.
    pub fn as_i64(self) -> i64 {
        match self {
            ConditionIndex::Absent => -1,
            ConditionIndex::At(index) => index as i64,
        }
    }
}

impl fmt::Display for ConditionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// Finds the first condition whose type equals `condition_type`.
pub fn locate<'a>(
    conditions: &'a [NodeCondition],
    condition_type: &str,
) -> (Option<&'a NodeCondition>, ConditionIndex) {
    conditions
        .iter()
        .enumerate()
        .find(|(_, condition)| condition.condition_type == condition_type)
        .map(|(index, condition)| (Some(condition), ConditionIndex::At(index)))
        .unwrap_or((None, ConditionIndex::Absent))
}
