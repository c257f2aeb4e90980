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

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::conditioner::api::client::ConnectionOptions;
use crate::conditioner::logger::{LogFormat, LogLevel};

/// Add, replace or remove a status condition on a Kubernetes node.
#[derive(Parser, Debug)]
#[command(name = "kubectl-conditioner")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Conditioner {
    /// Name of the node to condition
    #[arg(value_name = "NODE")]
    pub node: Option<String>,

    /// Condition type to add, replace or remove
    #[arg(long = "type", value_name = "TYPE")]
    pub condition_type: String,

    /// Condition status: true, false, anything else is Unknown
    #[arg(long)]
    pub status: Option<String>,

    /// Machine-readable reason for the condition
    #[arg(short, long)]
    pub reason: Option<String>,

    /// Human-readable message for the condition
    #[arg(long)]
    pub message: Option<String>,

    /// Remove the condition instead of setting it
    #[arg(short = 'x', long)]
    pub remove: bool,

    /// Path to the kubeconfig file
    #[arg(long, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current context
    #[arg(long)]
    pub context: Option<String>,

    /// Override the API server URL from the kubeconfig
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Print the equivalent curl command without performing the patch
    #[arg(long)]
    pub curl: bool,

    /// Format of diagnostic log lines written to stderr
    #[arg(long, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    /// Emit debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Conditioner {
    pub fn log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            server: self.server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Conditioner::command().debug_assert();
    }

    #[test]
    fn parses_short_flags() {
        let args = Conditioner::try_parse_from([
            "kubectl-conditioner",
            "worker-1",
            "--type",
            "Maintenance",
            "-r",
            "Scheduled",
            "-x",
        ])
        .expect("parse");
        assert_eq!(args.node.as_deref(), Some("worker-1"));
        assert_eq!(args.condition_type, "Maintenance");
        assert_eq!(args.reason.as_deref(), Some("Scheduled"));
        assert!(args.remove);
        assert!(!args.curl);
        assert_eq!(args.log_format, LogFormatArg::Text);
        assert_eq!(args.log_level(), LogLevel::Warn);
    }

    #[test]
    fn type_is_required() {
        let err = Conditioner::try_parse_from(["kubectl-conditioner", "worker-1"])
            .expect_err("missing --type");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn node_is_optional_at_parse_time() {
        let args = Conditioner::try_parse_from(["kubectl-conditioner", "--type", "Ready"])
            .expect("parse");
        assert!(args.node.is_none());
    }

    #[test]
    fn connection_flags_are_forwarded() {
        let args = Conditioner::try_parse_from([
            "kubectl-conditioner",
            "node-a",
            "--type",
            "Ready",
            "--kubeconfig",
            "/tmp/kc",
            "--context",
            "prod",
            "--server",
            "https://k:6443",
            "--log-format",
            "json",
            "-v",
        ])
        .expect("parse");
        let options = args.connection_options();
        assert_eq!(options.kubeconfig, Some(PathBuf::from("/tmp/kc")));
        assert_eq!(options.context.as_deref(), Some("prod"));
        assert_eq!(options.server.as_deref(), Some("https://k:6443"));
        assert_eq!(LogFormat::from(args.log_format), LogFormat::Json);
        assert_eq!(args.log_level(), LogLevel::Debug);
    }
}
