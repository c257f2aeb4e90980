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

use crate::conditioner::cli::Terminal;
use crate::conditioner::patch::PatchOp;

/// The single stdout line reported after a successful patch.
pub(super) fn format_outcome(condition_type: &str, op: PatchOp, node: &str) -> String {
    format!(
        "condition status {} has been {} on node {}",
        condition_type,
        op.past_tense(),
        node
    )
}

pub(super) fn print_outcome(line: &str) {
    Terminal::stdout(format_args!("{}", line));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_line_names_type_op_and_node() {
        assert_eq!(
            format_outcome("Maintenance", PatchOp::Replace, "worker-1"),
            "condition status Maintenance has been replaced on node worker-1"
        );
    }
}
