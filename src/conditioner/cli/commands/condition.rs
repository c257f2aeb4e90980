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

use std::error::Error;

use nix::unistd::{getuid, User};

use crate::conditioner::api::client::{KubeClient, NodeApi, JSON_PATCH_CONTENT_TYPE};
use crate::conditioner::cli::args::Conditioner;
use crate::conditioner::cli::curl::print_curl_request;
use crate::conditioner::cli::output::{format_outcome, print_outcome};
use crate::conditioner::config::ConditionerConfig;
use crate::conditioner::k8s::node::ConditionStatus;
use crate::conditioner::logger::{log_debug, log_info, log_warn};
use crate::conditioner::patch::{
    is_allowed, locate, synthesize, ConditionIndex, MutationRequest, PatchOp, PatchOperation,
};
use crate::conditioner::util::error::{new_error, with_context, ConditionError};

const COMPONENT: &str = "condition";

/// A validated patch ready to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPatch {
    pub node: String,
    pub index: ConditionIndex,
    pub operation: PatchOperation,
}

impl PlannedPatch {
    pub fn outcome(&self, condition_type: &str) -> String {
        format_outcome(condition_type, self.operation.op, &self.node)
    }
}

pub(super) async fn handle_condition(
    args: &Conditioner,
    settings: &ConditionerConfig,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let node = node_name(args.node.as_deref())?;
    let invoker = if settings.prepend_whoami {
        Some(current_username()?)
    } else {
        None
    };
    let request = build_request(args, invoker.as_deref());
    let client = KubeClient::new(&args.connection_options())?;

    if args.curl {
        let plan = plan_condition(&client, node, &request, &settings.allow_list).await?;
        let url = client.url_from_segments(&KubeClient::node_status_segments(&plan.node))?;
        let body = plan.operation.to_patch_document()?;
        let body = String::from_utf8(body)?;
        print_curl_request(&client, "PATCH", url.as_str(), &body, JSON_PATCH_CONTENT_TYPE);
        return Ok(());
    }

    let plan = apply_condition(&client, node, &request, &settings.allow_list).await?;
    print_outcome(&plan.outcome(&request.condition_type));
    Ok(())
}

/// Translates the command line into the operator's intent. `invoker`, when
/// present, prefixes the message as `<invoker>: <message>`.
pub fn build_request(args: &Conditioner, invoker: Option<&str>) -> MutationRequest {
    let message = args.message.clone().unwrap_or_default();
    let message = match invoker {
        Some(user) => format!("{user}: {message}"),
        None => message,
    };

    MutationRequest {
        condition_type: args.condition_type.clone(),
        status: Some(ConditionStatus::from_flag(
            args.status.as_deref().unwrap_or_default(),
        )),
        reason: args.reason.clone(),
        message: Some(message),
        remove: args.remove,
    }
}

fn node_name(raw: Option<&str>) -> Result<&str, ConditionError> {
    raw.map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(ConditionError::MissingNode)
}

/// Validates the request against the allow-list and the node's current
/// conditions, then synthesizes the single patch operation. Performs one
/// read and no writes.
pub async fn plan_condition<C: NodeApi>(
    client: &C,
    node: &str,
    request: &MutationRequest,
    allow_list: &[String],
) -> Result<PlannedPatch, Box<dyn Error + Send + Sync>> {
    if !is_allowed(&request.condition_type, allow_list) {
        log_warn(
            COMPONENT,
            "Condition type rejected by allow-list",
            &[("type", request.condition_type.as_str())],
        );
        return Err(Box::new(ConditionError::DisallowedType {
            condition_type: request.condition_type.clone(),
            allow_list: allow_list.to_vec(),
        }));
    }

    let current = client
        .get_node(node)
        .await
        .map_err(|err| with_context(err, format!("failed to fetch node '{node}'")))?;
    let (old, index) = locate(current.conditions(), &request.condition_type);
    let position = index.to_string();
    log_debug(
        COMPONENT,
        "Located condition",
        &[
            ("node", node),
            ("type", request.condition_type.as_str()),
            ("index", position.as_str()),
        ],
    );

    if request.remove && index.is_absent() {
        return Err(Box::new(ConditionError::RemoveNonexistent {
            condition_type: request.condition_type.clone(),
        }));
    }

    let operation = synthesize(index, request.remove, old, request);
    Ok(PlannedPatch {
        node: current.name().unwrap_or(node).to_string(),
        index,
        operation,
    })
}

/// Plans and submits the patch.
pub async fn apply_condition<C: NodeApi>(
    client: &C,
    node: &str,
    request: &MutationRequest,
    allow_list: &[String],
) -> Result<PlannedPatch, Box<dyn Error + Send + Sync>> {
    let plan = plan_condition(client, node, request, allow_list).await?;
    log_info(
        COMPONENT,
        "Patching node condition",
        &[
            ("node", plan.node.as_str()),
            ("op", plan.operation.op.as_str()),
            ("path", plan.operation.path.as_str()),
        ],
    );

    client
        .patch_node_status(&plan.node, &plan.operation)
        .await
        .map_err(|err| {
            with_context(
                err,
                format!(
                    "failed to {} condition {} on node '{}'",
                    plan.operation.op, request.condition_type, plan.node
                ),
            )
        })?;

    if plan.operation.op == PatchOp::Remove {
        log_debug(COMPONENT, "Condition removed", &[("node", plan.node.as_str())]);
    }
    Ok(plan)
}

fn current_username() -> Result<String, Box<dyn Error + Send + Sync>> {
    let uid = getuid();
    let user = User::from_uid(uid)
        .map_err(|err| with_context(err, format!("failed to look up user {uid}")))?
        .ok_or_else(|| new_error(format!("no passwd entry for uid {uid}")))?;
    Ok(user.name)
}
