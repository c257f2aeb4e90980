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
use std::error::Error;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::conditioner::util::error::with_context;

/// Environment variable that overrides the settings file location.
pub const CONFIG_ENV: &str = "CONDITIONER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "~/.conditioner.json";
const CONFIG_FILE_MODE: u32 = 0o644;

/// Persisted operator settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionerConfig {
    /// Prefix condition messages with the invoking user's login name.
    #[serde(rename = "prepend-whoami", default)]
    pub prepend_whoami: bool,
    /// Condition types that may be modified. Empty means unrestricted.
    #[serde(rename = "allow-list", default)]
    pub allow_list: Vec<String>,
}

/// The file operations the settings loader needs.
pub trait Filesystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Succeeds when metadata for `path` can be obtained.
    fn stat(&self, path: &Path) -> io::Result<()>;

    /// Creates or truncates `path` with `mode` permissions.
    fn write(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()>;
}

/// [`Filesystem`] backed by the host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn stat(&self, path: &Path) -> io::Result<()> {
        fs::metadata(path).map(|_| ())
    }

    fn write(&self, path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
        fs::write(path, data)?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }
}

/// Location of the settings file, honouring [`CONFIG_ENV`].
pub fn config_path() -> PathBuf {
    env::var(CONFIG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map_or_else(
            || normalize_path(DEFAULT_CONFIG_PATH),
            |value| normalize_path(value.trim()),
        )
}

pub fn exists(fs: &dyn Filesystem, path: &Path) -> Result<bool, Box<dyn Error + Send + Sync>> {
    match fs.stat(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(with_context(
            err,
            format!("failed to stat settings file '{}'", path.display()),
        )),
    }
}

pub fn read(
    fs: &dyn Filesystem,
    path: &Path,
) -> Result<ConditionerConfig, Box<dyn Error + Send + Sync>> {
    let bytes = fs.read(path).map_err(|err| {
        with_context(
            err,
            format!("failed to read settings file '{}'", path.display()),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        with_context(
            err,
            format!("failed to parse settings file '{}'", path.display()),
        )
    })
}

/// Writes the default settings (`prepend-whoami` off, empty allow-list).
pub fn write_default(fs: &dyn Filesystem, path: &Path) -> Result<(), Box<dyn Error + Send + Sync>> {
    let payload = encode(&ConditionerConfig::default())?;
    fs.write(path, &payload, CONFIG_FILE_MODE).map_err(|err| {
        with_context(
            err,
            format!("failed to write settings file '{}'", path.display()),
        )
    })
}

/// Creates the default settings file when none exists. Returns `true` when a
/// file was written.
pub fn ensure_default(
    fs: &dyn Filesystem,
    path: &Path,
) -> Result<bool, Box<dyn Error + Send + Sync>> {
    if exists(fs, path)? {
        return Ok(false);
    }
    write_default(fs, path)?;
    Ok(true)
}

fn encode(config: &ConditionerConfig) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    config.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Expands a leading `~`, anchors relative paths at the working directory and
/// collapses `.` / `..` components.
fn normalize_path(input: &str) -> PathBuf {
    let path: PathBuf = match input {
        _ if input == "~" => env::var("HOME").ok().map(PathBuf::from),
        _ if input.starts_with("~/") => env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(&input[2..])),
        _ if !input.starts_with('/') => env::current_dir().ok().map(|cwd| cwd.join(input)),
        _ => None,
    }
    .unwrap_or_else(|| PathBuf::from(input));

    path.components()
        .fold(PathBuf::new(), |mut normalized, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                _ => normalized.push(component),
            }
            normalized
        })
}
