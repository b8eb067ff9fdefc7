//! Integration tests for the tool host HTTP API.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    serde_json::{Value, json},
    tokio::{net::TcpListener, sync::oneshot},
};

use {
    tasklane_cron::{
        delivery::{Delivery, DeliveryStatus},
        parse::parse_run_time,
        service::{SchedulerConfig, TaskScheduler},
        store::TaskStore,
        store_file::FileStore,
        store_memory::InMemoryStore,
    },
    tasklane_gateway::server::serve,
    tasklane_tools::default_registry,
};

#[derive(Default)]
struct Recorder {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Delivery for Recorder {
    async fn deliver(&self, prompt: &str) -> DeliveryStatus {
        self.prompts.lock().unwrap().push(prompt.to_string());
        DeliveryStatus::Delivered
    }
}

struct TestServer {
    addr: SocketAddr,
    scheduler: Arc<TaskScheduler>,
    recorder: Arc<Recorder>,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

async fn start_server(store: Arc<dyn TaskStore>) -> TestServer {
    let recorder = Arc::new(Recorder::default());
    let scheduler = TaskScheduler::new(store, recorder.clone(), SchedulerConfig::default());
    let registry = default_registry(&scheduler);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        serve(listener, registry, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    TestServer {
        addr,
        scheduler,
        recorder,
        _shutdown: tx,
    }
}

async fn invoke(server: &TestServer, tool: &str, params: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(server.url(&format!("/tools/{tool}")))
        .json(&params)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_tool_count() {
    let server = start_server(Arc::new(InMemoryStore::new())).await;
    let body: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tools"], 5);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn lists_tool_schemas() {
    let server = start_server(Arc::new(InMemoryStore::new())).await;
    let body: Value = reqwest::get(server.url("/tools"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tools = body.as_array().unwrap();
    let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec![
        "add_cron_task",
        "add_scheduled_task",
        "delete_scheduled_task",
        "get_current_datetime",
        "list_scheduled_tasks",
    ]);
    let add = &tools[1];
    assert_eq!(add["parameters"]["required"], json!(["prompt", "run_time"]));
}

#[tokio::test]
async fn add_list_delete_roundtrip_over_http() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("tasks.json");
    let server = start_server(Arc::new(FileStore::new(&path))).await;

    let (status, body) = invoke(
        &server,
        "add_scheduled_task",
        json!({ "prompt": "water plants", "run_time": "01.01.2099 08:00:00" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        body["result"],
        "One-time task added: 'water plants' at 01.01.2099 08:00:00"
    );

    let (_, body) = invoke(
        &server,
        "add_cron_task",
        json!({ "prompt": "lights on", "cron_expr": "0 18 * * *" }),
    )
    .await;
    assert_eq!(body["result"], "CRON task added: 'lights on' (0 18 * * *)");

    let (_, body) = invoke(&server, "list_scheduled_tasks", json!({})).await;
    assert_eq!(
        body["result"],
        "1. [One-time] water plants at 01.01.2099 08:00:00\n2. [CRON] lights on (0 18 * * *)"
    );

    let persisted: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(persisted.as_array().unwrap().len(), 2);

    let (_, body) = invoke(&server, "delete_scheduled_task", json!({ "task_number": 1 })).await;
    assert_eq!(
        body["result"],
        "Removed task: [One-time] water plants at 01.01.2099 08:00:00"
    );
    let (_, body) = invoke(&server, "delete_scheduled_task", json!({ "task_number": 5 })).await;
    assert_eq!(
        body["result"],
        "Invalid task number 5. Choose a number between 1 and 1."
    );
}

#[tokio::test]
async fn added_task_is_delivered_by_tick() {
    let server = start_server(Arc::new(InMemoryStore::new())).await;

    let (status, _) = invoke(
        &server,
        "add_scheduled_task",
        json!({ "prompt": "feed cat", "run_time": "01.01.2020 07:00:00" }),
    )
    .await;
    assert_eq!(status, 200);

    let report = server
        .scheduler
        .tick_at(parse_run_time("01.01.2020 07:00:30").unwrap())
        .await;
    assert_eq!(report.delivered, 1);
    assert_eq!(*server.recorder.prompts.lock().unwrap(), vec!["feed cat"]);

    let (_, body) = invoke(&server, "list_scheduled_tasks", json!({})).await;
    assert_eq!(body["result"], "No scheduled tasks.");
}

#[tokio::test]
async fn validation_message_is_a_result() {
    let server = start_server(Arc::new(InMemoryStore::new())).await;
    let (status, body) = invoke(
        &server,
        "add_scheduled_task",
        json!({ "prompt": "x", "run_time": "2099-01-01" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        body["result"],
        "Invalid datetime format. Use 'DD.MM.YYYY HH:MM:SS'"
    );
}

#[tokio::test]
async fn unknown_tool_is_404() {
    let server = start_server(Arc::new(InMemoryStore::new())).await;
    let (status, body) = invoke(&server, "reboot_everything", json!({})).await;
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("reboot_everything"));
}

#[tokio::test]
async fn missing_params_is_400() {
    let server = start_server(Arc::new(InMemoryStore::new())).await;
    let (status, body) = invoke(&server, "add_cron_task", json!({ "prompt": "x" })).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("cron_expr"));
}

#[tokio::test]
async fn malformed_body_is_400() {
    let server = start_server(Arc::new(InMemoryStore::new())).await;
    let resp = reqwest::Client::new()
        .post(server.url("/tools/list_scheduled_tasks"))
        .header("content-type", "application/json")
        .body("{ nope")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn empty_body_accepted() {
    let server = start_server(Arc::new(InMemoryStore::new())).await;
    let resp = reqwest::Client::new()
        .post(server.url("/tools/get_current_datetime"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(parse_run_time(body["result"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn storage_failure_is_500() {
    let store = Arc::new(InMemoryStore::new());
    store.set_fail_saves(true);
    let server = start_server(store).await;
    let (status, _) = invoke(
        &server,
        "add_cron_task",
        json!({ "prompt": "x", "cron_expr": "* * * * *" }),
    )
    .await;
    assert_eq!(status, 500);
}
