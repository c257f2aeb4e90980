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
use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::x509::X509;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::tls::{Certificate, Identity};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::conditioner::k8s::node::Node;
use crate::conditioner::logger::log_debug;
use crate::conditioner::patch::PatchOperation;
use crate::conditioner::util::error::with_context;

pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const COMPONENT: &str = "api";

/// Node operations the condition command depends on.
pub trait NodeApi {
    fn get_node(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Node, Box<dyn Error + Send + Sync>>> + Send;

    /// Submits `patch` as a one-operation JSON Patch against the node's
    /// `status` subresource.
    fn patch_node_status(
        &self,
        name: &str,
        patch: &PatchOperation,
    ) -> impl Future<Output = Result<Node, Box<dyn Error + Send + Sync>>> + Send;
}

/// Flags that influence how cluster credentials are resolved.
#[derive(Clone, Debug, Default)]
pub struct ConnectionOptions {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub server: Option<String>,
}

#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HttpError {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.message, self.status)
    }
}

impl Error for HttpError {}

/// Body of a Kubernetes `Status` failure response.
#[derive(Deserialize)]
struct StatusBody {
    message: Option<String>,
    reason: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KubeFieldSource {
    InlineData,
    FilePath,
}

/// Where the client identity came from, used to render equivalent curl
/// commands.
#[derive(Clone, Debug)]
pub struct CurlAuthData {
    pub kubeconfig_path: PathBuf,
    pub kubeconfig_dir: PathBuf,
    pub cluster_name: String,
    pub user_name: String,
    pub ca_source: Option<KubeFieldSource>,
    pub cert_source: KubeFieldSource,
    pub key_source: KubeFieldSource,
}

#[derive(Clone)]
struct ResolvedData {
    bytes: Vec<u8>,
    source: KubeFieldSource,
}

/// A kubeconfig value given either inline as base64 (`*-data`) or as a path
/// relative to the kubeconfig file.
struct FieldRef<'a> {
    label: &'static str,
    inline: Option<&'a str>,
    path: Option<&'a str>,
}

impl FieldRef<'_> {
    fn load(&self, config_dir: &Path) -> Result<Option<ResolvedData>, Box<dyn Error + Send + Sync>> {
        if let Some(inline) = self.inline.map(str::trim) {
            if inline.is_empty() {
                return Ok(None);
            }
            let bytes = BASE64.decode(inline).map_err(|err| {
                invalid_kubeconfig(format!("{} is not valid base64: {err}", self.label))
            })?;
            return Ok(Some(ResolvedData {
                bytes,
                source: KubeFieldSource::InlineData,
            }));
        }

        let Some(path) = self.path else {
            return Ok(None);
        };
        let resolved = resolve_path(path, config_dir)?;
        let bytes = fs::read(&resolved).map_err(|err| {
            with_context(
                err,
                format!("failed to read {} '{}'", self.label, resolved.display()),
            )
        })?;
        Ok(Some(ResolvedData {
            bytes,
            source: KubeFieldSource::FilePath,
        }))
    }
}

#[derive(Deserialize)]
struct KubeConfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    current_context: Option<String>,
}

#[derive(Deserialize)]
struct NamedCluster {
    name: String,
    cluster: Cluster,
}

#[derive(Deserialize)]
struct Cluster {
    server: String,
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: Option<String>,
    #[serde(rename = "certificate-authority")]
    certificate_authority: Option<String>,
    #[serde(rename = "insecure-skip-tls-verify", default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: UserEntry,
}

#[derive(Deserialize, Default)]
struct UserEntry {
    #[serde(rename = "client-certificate-data")]
    client_certificate_data: Option<String>,
    #[serde(rename = "client-certificate")]
    client_certificate: Option<String>,
    #[serde(rename = "client-key-data")]
    client_key_data: Option<String>,
    #[serde(rename = "client-key")]
    client_key: Option<String>,
    token: Option<String>,
    #[serde(rename = "tokenFile")]
    token_file: Option<String>,
}

#[derive(Deserialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Deserialize)]
struct ContextEntry {
    cluster: String,
    user: String,
}

enum UserCredential {
    ClientCertificate {
        cert: ResolvedData,
        key: ResolvedData,
    },
    BearerToken(String),
    Anonymous,
}

struct KubeAuth {
    kubeconfig_path: PathBuf,
    kubeconfig_dir: PathBuf,
    cluster_name: String,
    user_name: String,
    server: String,
    insecure: bool,
    ca: Option<ResolvedData>,
    credential: UserCredential,
}

#[derive(Clone)]
enum AuthContext {
    ClientCertificate(CurlAuthData),
    BearerToken { token: String },
    Anonymous,
}

fn kubeconfig_path(explicit: Option<&Path>) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(value) = env::var("KUBECONFIG") {
        if let Some(first) = value.split(':').map(str::trim).find(|s| !s.is_empty()) {
            return Ok(PathBuf::from(first));
        }
    }

    Ok(home_dir()?.join(".kube").join("config"))
}

fn resolve_path(path: &str, base_dir: &Path) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
    let trimmed = path.trim();
    let expanded = match trimmed.strip_prefix("~/") {
        Some(stripped) => home_dir()?.join(stripped),
        None if trimmed == "~" => home_dir()?,
        None => PathBuf::from(trimmed),
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn home_dir() -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
    env::var("HOME").map(PathBuf::from).map_err(|_| {
        Box::new(io::Error::new(
            io::ErrorKind::NotFound,
            "HOME environment variable is not set",
        )) as Box<dyn Error + Send + Sync>
    })
}

fn invalid_kubeconfig(message: impl Into<String>) -> Box<dyn Error + Send + Sync> {
    Box::new(io::Error::new(io::ErrorKind::InvalidData, message.into()))
}

fn load_kube_auth(options: &ConnectionOptions) -> Result<KubeAuth, Box<dyn Error + Send + Sync>> {
    let path = kubeconfig_path(options.kubeconfig.as_deref())?;
    let raw = fs::read_to_string(&path).map_err(|err| {
        with_context(err, format!("failed to read kubeconfig '{}'", path.display()))
    })?;
    let config: KubeConfig = serde_yaml::from_str(&raw).map_err(|err| {
        with_context(err, format!("failed to parse kubeconfig '{}'", path.display()))
    })?;
    resolve_kube_auth(config, path, options.context.as_deref())
}

fn resolve_kube_auth(
    config: KubeConfig,
    path: PathBuf,
    context_override: Option<&str>,
) -> Result<KubeAuth, Box<dyn Error + Send + Sync>> {
    let context_name = context_override
        .map(str::to_string)
        .or(config.current_context)
        .filter(|name| !name.is_empty())
        .or_else(|| config.contexts.first().map(|ctx| ctx.name.clone()))
        .ok_or_else(|| invalid_kubeconfig("kubeconfig does not define any contexts"))?;

    let context = config
        .contexts
        .iter()
        .find(|ctx| ctx.name == context_name)
        .ok_or_else(|| invalid_kubeconfig(format!("kubeconfig missing context '{context_name}'")))?;

    let cluster = config
        .clusters
        .iter()
        .find(|cl| cl.name == context.context.cluster)
        .ok_or_else(|| {
            invalid_kubeconfig(format!(
                "kubeconfig missing cluster '{}' referenced by context '{}'",
                context.context.cluster, context_name
            ))
        })?;

    let user = config
        .users
        .iter()
        .find(|usr| usr.name == context.context.user)
        .ok_or_else(|| {
            invalid_kubeconfig(format!(
                "kubeconfig missing user '{}' referenced by context '{}'",
                context.context.user, context_name
            ))
        })?;

    let config_dir = path
        .parent()
        .map(|dir| dir.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    let ca = FieldRef {
        label: "certificate authority",
        inline: cluster.cluster.certificate_authority_data.as_deref(),
        path: cluster.cluster.certificate_authority.as_deref(),
    }
    .load(&config_dir)?;

    let credential = resolve_user_credential(&user.user, &config_dir)?;

    Ok(KubeAuth {
        kubeconfig_path: path,
        kubeconfig_dir: config_dir,
        cluster_name: cluster.name.clone(),
        user_name: user.name.clone(),
        server: cluster.cluster.server.clone(),
        insecure: cluster.cluster.insecure_skip_tls_verify,
        ca,
        credential,
    })
}

fn resolve_user_credential(
    user: &UserEntry,
    config_dir: &Path,
) -> Result<UserCredential, Box<dyn Error + Send + Sync>> {
    let cert = FieldRef {
        label: "client certificate",
        inline: user.client_certificate_data.as_deref(),
        path: user.client_certificate.as_deref(),
    }
    .load(config_dir)?;
    let key = FieldRef {
        label: "client key",
        inline: user.client_key_data.as_deref(),
        path: user.client_key.as_deref(),
    }
    .load(config_dir)?;

    match (cert, key) {
        (Some(cert), Some(key)) => return Ok(UserCredential::ClientCertificate { cert, key }),
        (Some(_), None) => {
            return Err(invalid_kubeconfig(
                "client key is required when a client certificate is configured",
            ))
        }
        (None, Some(_)) => {
            return Err(invalid_kubeconfig(
                "client certificate is required when a client key is configured",
            ))
        }
        (None, None) => {}
    }

    if let Some(token) = user.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(UserCredential::BearerToken(token.to_string()));
    }

    if let Some(token_file) = user.token_file.as_deref() {
        let resolved = resolve_path(token_file, config_dir)?;
        let token = fs::read_to_string(&resolved).map_err(|err| {
            with_context(
                err,
                format!("failed to read token file '{}'", resolved.display()),
            )
        })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(invalid_kubeconfig(format!(
                "token file '{}' is empty",
                resolved.display()
            )));
        }
        return Ok(UserCredential::BearerToken(token.to_string()));
    }

    Ok(UserCredential::Anonymous)
}

fn build_reqwest_identity(cert_pem: &[u8], key_pem: &[u8]) -> Result<Identity, String> {
    let cert = X509::from_pem(cert_pem)
        .map_err(|err| format!("failed to parse client certificate: {err}"))?;
    let key = PKey::private_key_from_pem(key_pem)
        .map_err(|err| format!("failed to parse client key: {err}"))?;
    let pkcs12 = Pkcs12::builder()
        .name("kubectl-conditioner")
        .pkey(&key)
        .cert(&cert)
        .build2("")
        .map_err(|err| format!("failed to build client PKCS#12 bundle: {err}"))?;
    let pkcs12_der = pkcs12
        .to_der()
        .map_err(|err| format!("failed to encode client PKCS#12 bundle: {err}"))?;
    Identity::from_pkcs12_der(&pkcs12_der, "")
        .map_err(|err| format!("failed to load client identity: {err}"))
}

/// Kubernetes API client scoped to the node endpoints.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    base_url: Url,
    auth: AuthContext,
}

impl KubeClient {
    pub fn new(options: &ConnectionOptions) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let kube_auth = load_kube_auth(options)?;
        Self::from_kube_auth(kube_auth, options.server.as_deref())
    }

    fn from_kube_auth(
        kube_auth: KubeAuth,
        server_override: Option<&str>,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let endpoint = server_override
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(kube_auth.server.as_str());
        let base_url = Url::parse(endpoint)
            .map_err(|err| invalid_kubeconfig(format!("invalid server URL '{endpoint}': {err}")))?;

        let mut builder = Client::builder().timeout(REQUEST_TIMEOUT).http1_only();

        if let Some(ca) = kube_auth.ca.as_ref() {
            builder = builder.add_root_certificate(Certificate::from_pem(&ca.bytes)?);
        }
        if kube_auth.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let auth = match &kube_auth.credential {
            UserCredential::ClientCertificate { cert, key } => {
                let identity = build_reqwest_identity(&cert.bytes, &key.bytes).map_err(|err| {
                    invalid_kubeconfig(format!(
                        "kubeconfig contains malformed client identity: {err}"
                    ))
                })?;
                builder = builder.identity(identity);
                AuthContext::ClientCertificate(CurlAuthData {
                    kubeconfig_path: kube_auth.kubeconfig_path.clone(),
                    kubeconfig_dir: kube_auth.kubeconfig_dir.clone(),
                    cluster_name: kube_auth.cluster_name.clone(),
                    user_name: kube_auth.user_name.clone(),
                    ca_source: kube_auth.ca.as_ref().map(|ca| ca.source),
                    cert_source: cert.source,
                    key_source: key.source,
                })
            }
            UserCredential::BearerToken(token) => AuthContext::BearerToken {
                token: token.clone(),
            },
            UserCredential::Anonymous => AuthContext::Anonymous,
        };

        let client = builder
            .build()
            .map_err(|err| with_context(err, "failed to construct Kubernetes HTTP client"))?;

        log_debug(
            COMPONENT,
            "Resolved cluster credentials",
            &[
                ("cluster", kube_auth.cluster_name.as_str()),
                ("user", kube_auth.user_name.as_str()),
                ("server", base_url.as_str()),
            ],
        );

        Ok(KubeClient {
            client,
            base_url,
            auth,
        })
    }

    pub fn curl_identity(&self) -> Option<&CurlAuthData> {
        match &self.auth {
            AuthContext::ClientCertificate(curl) => Some(curl),
            _ => None,
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        match &self.auth {
            AuthContext::BearerToken { token } => Some(token.as_str()),
            _ => None,
        }
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            AuthContext::BearerToken { token } => request.bearer_auth(token),
            AuthContext::ClientCertificate(_) | AuthContext::Anonymous => request,
        }
    }

    pub fn url_from_segments(
        &self,
        segments: &[&str],
    ) -> Result<Url, Box<dyn Error + Send + Sync>> {
        let mut url = self.base_url.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| "base URL cannot be base for segments")?;
            parts.pop_if_empty();
            for segment in segments {
                if !segment.is_empty() {
                    parts.push(segment);
                }
            }
        }
        Ok(url)
    }

    pub fn node_segments(node: &str) -> Vec<&str> {
        vec!["api", "v1", "nodes", node]
    }

    pub fn node_status_segments(node: &str) -> Vec<&str> {
        let mut segments = Self::node_segments(node);
        segments.push("status");
        segments
    }

    async fn handle_json<T>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, Box<dyn Error + Send + Sync>>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            let body = response.json::<T>().await?;
            return Ok(body);
        }

        let text = response.text().await.unwrap_or_default();
        Err(Box::new(HttpError::new(status, failure_message(status, &text))))
    }

    async fn send_json<T>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Box<dyn Error + Send + Sync>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .apply_auth(request)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        self.handle_json(response).await
    }
}

impl NodeApi for KubeClient {
    async fn get_node(&self, name: &str) -> Result<Node, Box<dyn Error + Send + Sync>> {
        let url = self.url_from_segments(&Self::node_segments(name))?;
        log_debug(COMPONENT, "Fetching node", &[("url", url.as_str())]);
        self.send_json(self.client.get(url)).await
    }

    async fn patch_node_status(
        &self,
        name: &str,
        patch: &PatchOperation,
    ) -> Result<Node, Box<dyn Error + Send + Sync>> {
        let url = self.url_from_segments(&Self::node_status_segments(name))?;
        let body = patch.to_patch_document()?;
        log_debug(
            COMPONENT,
            "Submitting node status patch",
            &[("url", url.as_str()), ("op", patch.op.as_str())],
        );
        let request = self
            .client
            .patch(url)
            .header(CONTENT_TYPE, JSON_PATCH_CONTENT_TYPE)
            .body(body);
        self.send_json(request).await
    }
}

/// Picks the most useful description of a failed response: the Kubernetes
/// `Status.message`, then its `reason`, then the raw body, then the
/// canonical status text.
fn failure_message(status: StatusCode, text: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<StatusBody>(text) {
        if let Some(message) = parsed.message.filter(|m| !m.is_empty()) {
            return message;
        }
        if let Some(reason) = parsed.reason.filter(|r| !r.is_empty()) {
            return reason;
        }
    }

    if text.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        text.trim().to_string()
    }
}
