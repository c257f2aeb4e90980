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

use std::process;

use clap::Parser;

use conditioner::conditioner::cli::{run, Conditioner, Terminal};

fn main() {
    let args = Conditioner::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            Terminal::error(format_args!("Error: failed to start runtime: {}", err));
            process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(&args)) {
        Terminal::error(format_args!("Error: {}", err));
        process::exit(1);
    }
}
