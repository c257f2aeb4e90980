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

//! Renders the PATCH request as a shell pipeline built on `curl` and `jq`.
//! Credentials are read back out of the kubeconfig at run time so secrets
//! never appear on the printed command line, bearer tokens excepted.

use std::path::Path;

use crate::conditioner::api::client::{CurlAuthData, KubeClient, KubeFieldSource};
use crate::conditioner::cli::Terminal;

pub(super) fn print_curl_request(
    client: &KubeClient,
    method: &str,
    url: &str,
    body: &str,
    content_type: &str,
) {
    let lines = render_curl_request(
        client.curl_identity(),
        client.bearer_token(),
        method,
        url,
        body,
        content_type,
    );
    Terminal::stdout_block(&lines);
}

pub(super) fn render_curl_request(
    identity: Option<&CurlAuthData>,
    token: Option<&str>,
    method: &str,
    url: &str,
    body: &str,
    content_type: &str,
) -> Vec<String> {
    let prefix = curl_prefix(identity, token);
    vec![
        format!(
            "cat <<'EOF' | {} -X {} {} -H {} --data-binary @-",
            prefix,
            method,
            shell_quote_str(url),
            shell_quote_str(&format!("Content-Type: {content_type}"))
        ),
        body.to_string(),
        "EOF".to_string(),
    ]
}

fn curl_prefix(identity: Option<&CurlAuthData>, token: Option<&str>) -> String {
    let mut parts = vec!["curl --fail --silent --show-error".to_string()];

    if let Some(identity) = identity {
        if let Some(source) = identity.ca_source {
            let field = match source {
                KubeFieldSource::InlineData => "certificate-authority-data",
                KubeFieldSource::FilePath => "certificate-authority",
            };
            let selector = field_selector("clusters", "cluster", &identity.cluster_name, field);
            parts.push(format!(
                "--cacert {}",
                jq_process_substitution(identity, &selector, source)
            ));
        }

        let cert_field = match identity.cert_source {
            KubeFieldSource::InlineData => "client-certificate-data",
            KubeFieldSource::FilePath => "client-certificate",
        };
        let selector = field_selector("users", "user", &identity.user_name, cert_field);
        parts.push(format!(
            "--cert {}",
            jq_process_substitution(identity, &selector, identity.cert_source)
        ));

        let key_field = match identity.key_source {
            KubeFieldSource::InlineData => "client-key-data",
            KubeFieldSource::FilePath => "client-key",
        };
        let selector = field_selector("users", "user", &identity.user_name, key_field);
        parts.push(format!(
            "--key {}",
            jq_process_substitution(identity, &selector, identity.key_source)
        ));
    }

    if let Some(token) = token {
        parts.push(format!(
            "-H {}",
            shell_quote_str(&format!("Authorization: Bearer {token}"))
        ));
    }

    parts.join(" ")
}

fn jq_process_substitution(auth: &CurlAuthData, selector: &str, source: KubeFieldSource) -> String {
    let kubeconfig = shell_quote(&auth.kubeconfig_path);
    let jq_command = format!("yq -o=json {kubeconfig} | jq -r '({selector}) // empty'");
    match source {
        KubeFieldSource::InlineData => format!("<({jq_command} | base64 --decode)"),
        KubeFieldSource::FilePath => {
            let config_dir = shell_quote(&auth.kubeconfig_dir);
            format!(
                "<(CONFIG_DIR={config_dir}; {jq_command} | while IFS= read -r path; do \
                    case \"$path\" in \
                        '') continue ;; \
                        ~/*) path=\"$HOME/${{path:2}}\" ;; \
                        /*) ;; \
                        *) path=\"$CONFIG_DIR/$path\" ;; \
                    esac; \
                    cat \"$path\"; \
                done)"
            )
        }
    }
}

fn field_selector(collection: &str, entry: &str, name: &str, field: &str) -> String {
    format!(
        ".{collection}[] | select(.name == {}) | .{entry}[{}]",
        jq_string_literal(name),
        jq_string_literal(field)
    )
}

fn jq_string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn shell_quote(path: &Path) -> String {
    shell_quote_str(&path.to_string_lossy())
}

fn shell_quote_str(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}
