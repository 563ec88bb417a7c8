use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use serde::Serialize;
use serde_json::json;

use crate::{
    admin::{
        authz::{self, AccessGate},
        http::{HttpRequest, HttpResponse},
    },
    command::{ClusterCtl, CommandError},
    context::AgentContext,
    parser,
    registry::SubscriberRegistry,
};

pub const API_ROOT: &str = "/CMRestAPI";
pub const UNAUTHORIZED_BODY: &str = "401 UNAUTHORIZED";
pub const REGISTERED_BODY: &str = "Register receive address successfully.";
pub const DELETED_BODY: &str = "Deleted successfully.";

/// Everything a request handler may touch.
pub struct AdminState {
    pub ctx: Arc<AgentContext>,
    pub ctl: ClusterCtl,
    pub registry: SubscriberRegistry,
    pub gate: AccessGate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ClusterStatus,
    NodeStatus,
    RecvAddr,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        match path.strip_prefix(API_ROOT)? {
            "/ClusterStatus" => Some(Route::ClusterStatus),
            "/NodeStatus" => Some(Route::NodeStatus),
            "/RecvAddr" => Some(Route::RecvAddr),
            _ => None,
        }
    }

    fn allows(self, method: &str) -> bool {
        match self {
            Route::ClusterStatus | Route::NodeStatus => method == "GET",
            Route::RecvAddr => method == "PUT" || method == "DELETE",
        }
    }
}

pub async fn handle_request(
    state: &AdminState,
    request: &HttpRequest,
    peer: SocketAddr,
) -> HttpResponse {
    let Ok(url) = reqwest::Url::parse(&format!("http://localhost{}", request.target)) else {
        return HttpResponse::text(400, "Malformed request target");
    };
    let Some(route) = Route::from_path(url.path()) else {
        return HttpResponse::text(404, "Not Found");
    };
    if !route.allows(&request.method) {
        return HttpResponse::text(405, "Method Not Allowed");
    }
    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

    let client_ip = authz::client_ip(&request.headers, peer);
    if !state.gate.is_allowed(&client_ip) {
        log::error!(
            "Rejected {} {} from {}, not in allowlist",
            request.method,
            url.path(),
            client_ip
        );
        return HttpResponse::text(401, UNAUTHORIZED_BODY);
    }

    match (route, request.method.as_str()) {
        (Route::ClusterStatus, _) => cluster_status(state, &client_ip).await,
        (Route::NodeStatus, _) => node_status(state, &client_ip, &query).await,
        (Route::RecvAddr, "PUT") => register(state, &client_ip, &query).await,
        (Route::RecvAddr, _) => unregister(state, &client_ip, &query).await,
    }
}

async fn cluster_status(state: &AdminState, client_ip: &str) -> HttpResponse {
    log::info!("Received cluster status request from {}", client_ip);
    let output = match state.ctl.query_cluster().await.and_then(|r| r.into_output()) {
        Ok(output) => output,
        Err(e) => return command_failure("query", e),
    };
    json_response(&parser::parse_cluster_status(&output))
}

async fn node_status(
    state: &AdminState,
    client_ip: &str,
    query: &HashMap<String, String>,
) -> HttpResponse {
    let node_id = match query.get("nodeId").map(|s| s.trim()) {
        None | Some("") => 0,
        Some(raw) => match raw.parse::<u32>() {
            Ok(id) => id,
            Err(_) => return HttpResponse::text(400, format!("Invalid nodeId: {raw}")),
        },
    };
    let node_id = if node_id == 0 {
        state.ctx.identity.node_id
    } else {
        node_id
    };
    log::info!("Received status request of node {} from {}", node_id, client_ip);

    let output = match state.ctl.query_node(node_id).await.and_then(|r| r.into_output()) {
        Ok(output) => output,
        Err(e) => return command_failure("query", e),
    };
    json_response(&parser::parse_node_status(&output))
}

async fn register(
    state: &AdminState,
    client_ip: &str,
    query: &HashMap<String, String>,
) -> HttpResponse {
    let Some(url) = query.get("url").map(|s| s.trim()).filter(|s| !s.is_empty()) else {
        return HttpResponse::text(400, "Required parameter 'url' is not present");
    };
    let app = match app_param(query) {
        Ok(app) => app,
        Err(resp) => return resp,
    };
    if url.contains(char::is_whitespace) {
        return HttpResponse::text(400, "Parameter 'url' must not contain whitespace");
    }
    log::info!(
        "Received receive address {} from {} (app: {})",
        url,
        client_ip,
        app.unwrap_or("-")
    );

    match state.registry.register(client_ip, app, url).await {
        Ok(()) => HttpResponse::text(200, REGISTERED_BODY),
        Err(e) => command_failure("put", e),
    }
}

async fn unregister(
    state: &AdminState,
    client_ip: &str,
    query: &HashMap<String, String>,
) -> HttpResponse {
    let app = match app_param(query) {
        Ok(app) => app,
        Err(resp) => return resp,
    };
    log::info!(
        "Received delete of receive address from {} (app: {})",
        client_ip,
        app.unwrap_or("*")
    );

    match state.registry.delete(client_ip, app).await {
        Ok(()) => HttpResponse::text(200, DELETED_BODY),
        Err(e) => command_failure("delete", e),
    }
}

fn app_param(query: &HashMap<String, String>) -> Result<Option<&str>, HttpResponse> {
    let app = query.get("app").map(|s| s.trim()).filter(|s| !s.is_empty());
    if app.is_some_and(|a| a.contains(char::is_whitespace) || a.contains('/')) {
        return Err(HttpResponse::text(400, "Invalid parameter 'app'"));
    }
    Ok(app)
}

fn json_response<T: Serialize>(value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => HttpResponse::json(200, body),
        Err(e) => {
            log::error!("Failed to encode response: {}", e);
            HttpResponse::text(500, "Failed to encode response")
        }
    }
}

/// 500 response for a failed store or cluster command.
pub fn command_failure(action: &str, err: CommandError) -> HttpResponse {
    log::error!("Exec {} command failed: {}", action, err);
    match err {
        CommandError::Launch { .. } => msg_response(format!("Exec {action} command failed!")),
        CommandError::TimedOut => msg_response(format!("Exec {action} command timeout!")),
        CommandError::Failed { output, .. } => HttpResponse::text(500, output),
    }
}

fn msg_response(msg: String) -> HttpResponse {
    HttpResponse::json(500, json!({ "msg": msg }).to_string())
}
