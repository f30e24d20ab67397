#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use hourglass_api::config::ServerConfig;
use hourglass_api::router::build_app_router;
use hourglass_api::state::AppState;
use hourglass_core::catalog::CatalogIndex;
use hourglass_events::launcher::OutputReceiver;
use hourglass_events::{RegistryError, TaskRegistry, WorkerLauncher, WorkerOutput};
use tokio::sync::mpsc;

/// Build a test `ServerConfig` rooted at `root` (bakes in `root/bakes`,
/// static files in `root/public`).
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        bakes_dir: root.join("bakes"),
        public_dir: root.join("public"),
        worker_bin: root.join("hourglass-worker"),
        task_retention_secs: 3600,
    }
}

/// Launcher whose "workers" are channels the test writes into.
#[derive(Default)]
pub struct ManualLauncher {
    launches: Mutex<Vec<(Vec<String>, mpsc::UnboundedSender<WorkerOutput>)>>,
}

impl ManualLauncher {
    pub fn worker(&self, index: usize) -> mpsc::UnboundedSender<WorkerOutput> {
        self.launches.lock().unwrap()[index].1.clone()
    }

    pub fn args(&self, index: usize) -> Vec<String> {
        self.launches.lock().unwrap()[index].0.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }
}

impl WorkerLauncher for ManualLauncher {
    fn launch(&self, args: Vec<String>) -> Result<OutputReceiver, RegistryError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.launches.lock().unwrap().push((args, tx));
        Ok(rx)
    }
}

pub struct TestApp {
    pub router: Router,
    pub launcher: Arc<ManualLauncher>,
    pub registry: Arc<TaskRegistry>,
    pub config: ServerConfig,
    _root: tempfile::TempDir,
}

/// Build the full application router over a temporary directory and a
/// hand-fed launcher.
pub fn build_test_app() -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    std::fs::create_dir_all(&config.bakes_dir).unwrap();
    std::fs::create_dir_all(&config.public_dir).unwrap();

    let launcher = Arc::new(ManualLauncher::default());
    let registry = Arc::new(TaskRegistry::new(launcher.clone()));

    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        catalog: Arc::new(CatalogIndex::in_dir(&config.bakes_dir)),
    };

    TestApp {
        router: build_app_router(state, &config),
        launcher,
        registry,
        config,
        _root: root,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_raw(app: &Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Submit `body` and return the new task id.
pub async fn submit(app: &Router, body: &str) -> String {
    let response = post_raw(app, "/api/bake", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

/// Wait until the registry has recorded the worker's exit.
pub async fn wait_finished(registry: &TaskRegistry, id: &str) {
    for _ in 0..200 {
        if registry.summary(id).await.unwrap().finished_at.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {id} never finished");
}

/// Split a `text/event-stream` body into `(event, data)` pairs.
pub fn parse_sse(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut name = None;
            let mut data = None;
            for line in frame.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    name = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data = Some(serde_json::from_str(rest.trim()).unwrap());
                }
            }
            Some((name?, data?))
        })
        .collect()
}
