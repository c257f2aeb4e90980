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

mod condition;

use std::error::Error;

use crate::conditioner::config::{self, OsFilesystem};
use crate::conditioner::logger::{self, log_debug};

use super::args::Conditioner;

pub use condition::{apply_condition, build_request, plan_condition, PlannedPatch};

pub async fn run(args: &Conditioner) -> Result<(), Box<dyn Error + Send + Sync>> {
    logger::set_log_format(args.log_format.into());
    logger::set_log_level(args.log_level());

    let fs = OsFilesystem;
    let settings_path = config::config_path();
    if config::ensure_default(&fs, &settings_path)? {
        let path = settings_path.display().to_string();
        log_debug("config", "Wrote default settings file", &[("path", path.as_str())]);
    }
    let settings = config::read(&fs, &settings_path)?;

    condition::handle_condition(args, &settings).await
}
