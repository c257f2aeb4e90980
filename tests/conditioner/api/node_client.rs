use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use conditioner::conditioner::api::client::{
    ConnectionOptions, HttpError, KubeClient, NodeApi, JSON_PATCH_CONTENT_TYPE,
};
use conditioner::conditioner::cli::apply_condition;
use conditioner::conditioner::k8s::node::{ConditionStatus, Node, NodeCondition};
use conditioner::conditioner::patch::MutationRequest;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

const TOKEN: &str = "integration-token";

#[derive(Clone, Default)]
struct ApiState {
    nodes: Arc<Mutex<Vec<Node>>>,
    patches: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TOKEN}"))
}

fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": format!("nodes \"{name}\" not found"),
            "reason": "NotFound",
            "code": 404
        })),
    )
        .into_response()
}

async fn read_node(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let nodes = state.nodes.lock().expect("nodes lock");
    match nodes.iter().find(|node| node.name() == Some(name.as_str())) {
        Some(node) => Json(node.clone()).into_response(),
        None => not_found(&name),
    }
}

async fn patch_node_status(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let document: Value = match serde_json::from_slice(&body) {
        Ok(document) => document,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    state
        .patches
        .lock()
        .expect("patches lock")
        .push((name.clone(), content_type, document));

    let nodes = state.nodes.lock().expect("nodes lock");
    match nodes.iter().find(|node| node.name() == Some(name.as_str())) {
        Some(node) => Json(node.clone()).into_response(),
        None => not_found(&name),
    }
}

async fn start_server(state: ApiState) -> SocketAddr {
    let app = Router::new()
        .route("/api/v1/nodes/{name}", get(read_node))
        .route("/api/v1/nodes/{name}/status", patch(patch_node_status))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn write_kubeconfig(dir: &TempDir, addr: SocketAddr) -> PathBuf {
    let path = dir.path().join("kubeconfig");
    let body = format!(
        r#"apiVersion: v1
kind: Config
current-context: local
clusters:
  - name: local
    cluster:
      server: http://{addr}
users:
  - name: operator
    user:
      token: {TOKEN}
contexts:
  - name: local
    context:
      cluster: local
      user: operator
"#
    );
    fs::write(&path, body).expect("write kubeconfig");
    path
}

fn ready(status: &str) -> NodeCondition {
    NodeCondition {
        condition_type: "Ready".to_string(),
        status: status.to_string(),
        last_heartbeat_time: Some("2024-01-01T00:00:00Z".to_string()),
        last_transition_time: Some("2024-01-01T00:00:00Z".to_string()),
        reason: "KubeletReady".to_string(),
        message: "kubelet is posting ready status".to_string(),
    }
}

async fn client_for(state: &ApiState, dir: &TempDir) -> KubeClient {
    let addr = start_server(state.clone()).await;
    let options = ConnectionOptions {
        kubeconfig: Some(write_kubeconfig(dir, addr)),
        ..ConnectionOptions::default()
    };
    KubeClient::new(&options).expect("client")
}

#[tokio::test]
async fn get_node_returns_conditions() {
    let state = ApiState::default();
    state
        .nodes
        .lock()
        .expect("nodes lock")
        .push(Node::new("worker-1", vec![ready("True")]));
    let dir = TempDir::new().expect("tempdir");
    let client = client_for(&state, &dir).await;

    let node = client.get_node("worker-1").await.expect("get node");
    assert_eq!(node.name(), Some("worker-1"));
    assert_eq!(node.conditions().len(), 1);
    assert_eq!(node.conditions()[0].reason, "KubeletReady");
}

#[tokio::test]
async fn missing_node_surfaces_status_message() {
    let state = ApiState::default();
    let dir = TempDir::new().expect("tempdir");
    let client = client_for(&state, &dir).await;

    let err = client.get_node("ghost").await.expect_err("missing node");
    let http = err.downcast_ref::<HttpError>().expect("http error");
    assert_eq!(http.status.as_u16(), 404);
    assert_eq!(http.message, "nodes \"ghost\" not found");
}

#[tokio::test]
async fn condition_flow_submits_one_json_patch() {
    let state = ApiState::default();
    state
        .nodes
        .lock()
        .expect("nodes lock")
        .push(Node::new("worker-1", vec![ready("True")]));
    let dir = TempDir::new().expect("tempdir");
    let client = client_for(&state, &dir).await;

    let request = MutationRequest {
        status: Some(ConditionStatus::True),
        reason: Some("Scheduled".to_string()),
        message: Some("kernel upgrade".to_string()),
        ..MutationRequest::new("Maintenance")
    };
    let plan = apply_condition(&client, "worker-1", &request, &[])
        .await
        .expect("apply");
    assert_eq!(
        plan.outcome("Maintenance"),
        "condition status Maintenance has been added on node worker-1"
    );

    let patches = state.patches.lock().expect("patches lock");
    assert_eq!(patches.len(), 1);
    let (node, content_type, document) = &patches[0];
    assert_eq!(node, "worker-1");
    assert_eq!(content_type.as_deref(), Some(JSON_PATCH_CONTENT_TYPE));
    let operations = document.as_array().expect("patch array");
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0]["op"], "add");
    assert_eq!(operations[0]["path"], "/status/conditions/-");
    assert_eq!(operations[0]["value"]["type"], "Maintenance");
    assert_eq!(operations[0]["value"]["status"], "True");
    assert_eq!(operations[0]["value"]["reason"], "Scheduled");
    assert_eq!(operations[0]["value"]["message"], "kernel upgrade");
}

#[tokio::test]
async fn replace_targets_existing_index() {
    let state = ApiState::default();
    state.nodes.lock().expect("nodes lock").push(Node::new(
        "worker-1",
        vec![ready("True"), {
            let mut maintenance = ready("False");
            maintenance.condition_type = "Maintenance".to_string();
            maintenance.reason = "Idle".to_string();
            maintenance
        }],
    ));
    let dir = TempDir::new().expect("tempdir");
    let client = client_for(&state, &dir).await;

    let request = MutationRequest {
        status: Some(ConditionStatus::True),
        ..MutationRequest::new("Maintenance")
    };
    apply_condition(&client, "worker-1", &request, &[])
        .await
        .expect("apply");

    let patches = state.patches.lock().expect("patches lock");
    let operation = &patches[0].2[0];
    assert_eq!(operation["op"], "replace");
    assert_eq!(operation["path"], "/status/conditions/1");
    assert_eq!(operation["value"]["reason"], "Idle");
    assert_eq!(operation["value"]["message"], "Idle");
}
