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

use std::env;
use std::fmt;
use std::io::{self, IsTerminal, Write};

const COLOR_ERROR: &str = "\x1b[31m";
const COLOR_RESET: &str = "\x1b[0m";

/// Line-oriented writes to the process streams. Write failures are ignored
/// since there is nowhere left to report them.
pub struct Terminal;

impl Terminal {
    pub fn stdout(args: fmt::Arguments<'_>) {
        let mut handle = io::stdout().lock();
        let _ = write_line(&mut handle, None, args);
    }

    /// Writes several lines while holding the stdout lock once, so heredoc
    /// blocks are never interleaved with other output.
    pub fn stdout_block<S: AsRef<str>>(lines: &[S]) {
        let mut handle = io::stdout().lock();
        for line in lines {
            if write_line(&mut handle, None, format_args!("{}", line.as_ref())).is_err() {
                return;
            }
        }
    }

    /// Error line on stderr, red when stderr is a terminal and `NO_COLOR` is
    /// unset.
    pub fn error(args: fmt::Arguments<'_>) {
        let stderr = io::stderr();
        let color =
            (stderr.is_terminal() && env::var_os("NO_COLOR").is_none()).then_some(COLOR_ERROR);
        let mut handle = stderr.lock();
        let _ = write_line(&mut handle, color, args);
    }
}

fn write_line(
    handle: &mut dyn Write,
    color: Option<&str>,
    args: fmt::Arguments<'_>,
) -> io::Result<()> {
    match color {
        Some(color) => {
            handle.write_all(color.as_bytes())?;
            handle.write_fmt(args)?;
            handle.write_all(COLOR_RESET.as_bytes())?;
        }
        None => handle.write_fmt(args)?,
    }
    handle.write_all(b"\n")
}
