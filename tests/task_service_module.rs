use phaseflow::report::{FetchError, HttpOutputFileFetcher, OutputFileFetcher};
use phaseflow::shared::ids::TaskId;
use phaseflow::task_service::{
    select_task_result, HttpTaskService, TaskService, TaskServiceError, TaskState,
};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

struct StubResponse {
    status_line: &'static str,
    content_type: &'static str,
    body: String,
}

impl StubResponse {
    fn json(status_line: &'static str, body: Value) -> Self {
        Self {
            status_line,
            content_type: "application/json",
            body: body.to_string(),
        }
    }
}

#[derive(Debug)]
struct CapturedRequest {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body json")
    }
}

fn spawn_stub_server(responses: Vec<StubResponse>) -> (String, mpsc::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    let (sender, receiver) = mpsc::channel();

    thread::spawn(move || {
        for response in responses {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

            let mut request_line = String::new();
            reader
                .read_line(&mut request_line)
                .expect("read request line");

            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read header line");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.trim_end().split_once(':') {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
            }

            let length = headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.parse::<usize>().ok())
                .unwrap_or(0);
            let mut body = vec![0_u8; length];
            reader.read_exact(&mut body).expect("read request body");

            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                response.status_line,
                response.content_type,
                response.body.len(),
                response.body
            );
            stream.write_all(reply.as_bytes()).expect("write response");
            let _ = sender.send(CapturedRequest {
                request_line: request_line.trim_end().to_string(),
                headers,
                body: String::from_utf8_lossy(&body).to_string(),
            });
        }
    });

    (format!("http://{addr}"), receiver)
}

fn client(base: &str) -> HttpTaskService {
    HttpTaskService::new(base, "key-123", Duration::from_secs(5))
}

#[test]
fn create_task_posts_prompt_with_api_key() {
    let (base, requests) = spawn_stub_server(vec![StubResponse::json(
        "200 OK",
        json!({"task_id": "task-9", "task_title": "Company report", "task_url": "https://tasks.example/task-9"}),
    )]);

    let handle = client(&base)
        .with_agent_profile("researcher")
        .create_task("write the company report")
        .expect("create task");
    assert_eq!(handle.task_id.as_str(), "task-9");
    assert_eq!(handle.task_title.as_deref(), Some("Company report"));
    assert_eq!(handle.task_url.as_deref(), Some("https://tasks.example/task-9"));

    let request = requests.recv().expect("captured request");
    assert!(
        request.request_line.starts_with("POST /v1/tasks "),
        "unexpected request line: {}",
        request.request_line
    );
    assert_eq!(request.header("API_KEY"), Some("key-123"));
    assert_eq!(
        request.json_body(),
        json!({"prompt": "write the company report", "agentProfile": "researcher"})
    );
}

#[test]
fn continue_task_sends_existing_task_id() {
    let (base, requests) = spawn_stub_server(vec![StubResponse::json(
        "200 OK",
        json!({"task_id": "task-9"}),
    )]);

    let task_id = TaskId::parse("task-9").expect("task id");
    let handle = client(&base)
        .with_task_mode("agent")
        .continue_task(&task_id, "now the icp report")
        .expect("continue task");
    assert_eq!(handle.task_id, task_id);
    assert_eq!(handle.task_url, None);

    let request = requests.recv().expect("captured request");
    assert_eq!(
        request.json_body(),
        json!({"prompt": "now the icp report", "taskMode": "agent", "taskId": "task-9"})
    );
}

#[test]
fn task_status_reads_state_and_result_fields() {
    let (base, requests) = spawn_stub_server(vec![StubResponse::json(
        "200 OK",
        json!({
            "task_id": "task-9",
            "status": "completed",
            "result": "  ",
            "output": {"icp_reports": []}
        }),
    )]);

    let task_id = TaskId::parse("task-9").expect("task id");
    let status = client(&base).task_status(&task_id).expect("status");
    assert_eq!(status.status, TaskState::Completed);
    assert_eq!(select_task_result(&status), Some(&json!({"icp_reports": []})));

    let request = requests.recv().expect("captured request");
    assert!(request.request_line.starts_with("GET /v1/tasks/task-9 "));
    assert_eq!(request.header("API_KEY"), Some("key-123"));
}

#[test]
fn unrecognised_task_state_decodes_as_unknown() {
    let (base, _requests) = spawn_stub_server(vec![StubResponse::json(
        "200 OK",
        json!({"status": "paused"}),
    )]);

    let task_id = TaskId::parse("task-9").expect("task id");
    let status = client(&base).task_status(&task_id).expect("status");
    assert_eq!(status.status, TaskState::Unknown);
    assert_eq!(select_task_result(&status), None);
}

#[test]
fn non_success_status_keeps_response_body() {
    let (base, _requests) = spawn_stub_server(vec![StubResponse::json(
        "401 Unauthorized",
        json!({"error": "bad key"}),
    )]);

    let err = client(&base)
        .create_task("prompt")
        .expect_err("unauthorized");
    match err {
        TaskServiceError::Status { status, body, .. } => {
            assert_eq!(status, 401);
            assert!(body.contains("bad key"), "body: {body}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_task_id_in_response_is_rejected() {
    let (base, _requests) = spawn_stub_server(vec![StubResponse::json(
        "200 OK",
        json!({"task_id": "has space"}),
    )]);

    let err = client(&base).create_task("prompt").expect_err("invalid id");
    assert!(matches!(err, TaskServiceError::InvalidTaskId(_)));
}

#[test]
fn output_file_fetch_returns_body_and_content_type() {
    let (base, requests) = spawn_stub_server(vec![StubResponse {
        status_line: "200 OK",
        content_type: "application/json",
        body: r#"{"icp_reports": []}"#.to_string(),
    }]);

    let fetcher = HttpOutputFileFetcher::new(Duration::from_secs(5), 1024);
    let file = fetcher
        .fetch(&format!("{base}/files/icp.json"))
        .expect("fetch");
    assert!(file.declares_json());
    assert_eq!(file.body, r#"{"icp_reports": []}"#);

    let request = requests.recv().expect("captured request");
    assert!(request.request_line.starts_with("GET /files/icp.json "));
}

#[test]
fn output_file_fetch_enforces_size_cap() {
    let (base, _requests) = spawn_stub_server(vec![StubResponse {
        status_line: "200 OK",
        content_type: "text/plain",
        body: "x".repeat(64),
    }]);

    let fetcher = HttpOutputFileFetcher::new(Duration::from_secs(5), 16);
    let err = fetcher
        .fetch(&format!("{base}/files/big.txt"))
        .expect_err("too large");
    assert!(matches!(err, FetchError::TooLarge { max_bytes: 16, .. }));
}

#[test]
fn output_file_fetch_maps_status_and_scheme_errors() {
    let (base, _requests) = spawn_stub_server(vec![StubResponse {
        status_line: "404 Not Found",
        content_type: "text/plain",
        body: "missing".to_string(),
    }]);

    let fetcher = HttpOutputFileFetcher::default();
    let err = fetcher
        .fetch(&format!("{base}/files/missing.json"))
        .expect_err("missing");
    assert!(matches!(err, FetchError::Status { status: 404, .. }));

    let err = fetcher
        .fetch("file:///etc/passwd")
        .expect_err("unsupported scheme");
    assert!(matches!(err, FetchError::UnsupportedScheme { .. }));
}
