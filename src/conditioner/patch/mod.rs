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

//! Pure decision logic for condition patches: lookup, allow-list gating and
//! patch synthesis. Nothing in here performs I/O.

pub mod allow_list;
pub mod locator;
pub mod synthesizer;

pub use allow_list::is_allowed;
pub use locator::{locate, ConditionIndex};
pub use synthesizer::{
    synthesize, synthesize_at, MutationRequest, PatchOp, PatchOperation, APPEND_MARKER, BASE_PATH,
};
