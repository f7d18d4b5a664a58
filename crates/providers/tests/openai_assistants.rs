//! HTTP contract tests for the OpenAI Assistants adapter against a mock server.

use serde_json::json;
use wc_domain::config::ProviderConfig;
use wc_domain::error::Error;
use wc_providers::traits::{AssistantSpec, FileUpload, OutgoingMessage, RunStatus};
use wc_providers::{AssistantsApi, OpenAiAssistants, TitleSummarizer};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OpenAiAssistants {
    let cfg = ProviderConfig {
        base_url: server.uri(),
        ..Default::default()
    };
    OpenAiAssistants::with_key(&cfg, "test-key".into()).unwrap()
}

#[tokio::test]
async fn create_thread_sends_beta_header_and_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("openai-beta", "assistants=v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "thread_abc"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = provider(&server).create_thread().await.unwrap();
    assert_eq!(id, "thread_abc");
}

#[tokio::test]
async fn create_message_attaches_files() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/messages"))
        .and(body_partial_json(json!({
            "role": "user",
            "content": "summarize this",
            "attachments": [{"file_id": "file_1"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = provider(&server)
        .create_message(
            "thread_abc",
            OutgoingMessage {
                content: "summarize this".into(),
                file_ids: vec!["file_1".into()],
            },
        )
        .await
        .unwrap();
    assert_eq!(id, "msg_1");
}

#[tokio::test]
async fn run_lifecycle_parses_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/runs"))
        .and(body_partial_json(json!({"assistant_id": "asst_1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "run_1", "status": "queued"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "run_1",
            "status": "failed",
            "last_error": {"code": "rate_limit_exceeded", "message": "slow down"}
        })))
        .mount(&server)
        .await;

    let p = provider(&server);
    let run = p.start_run("thread_abc", "asst_1").await.unwrap();
    assert_eq!(run.status, RunStatus::Queued);

    let polled = p.get_run("thread_abc", &run.id).await.unwrap();
    assert_eq!(polled.status, RunStatus::Failed);
    assert_eq!(polled.last_error.unwrap().message, "slow down");
}

#[tokio::test]
async fn list_messages_requests_newest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/messages"))
        .and(query_param("order", "desc"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {
                    "id": "msg_2", "role": "assistant", "created_at": 20, "run_id": "run_1",
                    "content": [{"type": "text", "text": {"value": "Hi!", "annotations": []}}]
                },
                {
                    "id": "msg_1", "role": "user", "created_at": 10,
                    "content": [{"type": "text", "text": {"value": "Hello", "annotations": []}}]
                }
            ]
        })))
        .mount(&server)
        .await;

    let msgs = provider(&server).list_messages("thread_abc", 20).await.unwrap();
    assert_eq!(msgs.len(), 2);
    assert!(msgs[0].is_assistant());
    assert_eq!(msgs[0].run_id.as_deref(), Some("run_1"));
    assert_eq!(msgs[0].first_text(), Some("Hi!"));
}

#[tokio::test]
async fn upload_file_uses_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file_9"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = provider(&server)
        .upload_file(FileUpload {
            filename: "report.csv".into(),
            mime_type: Some("text/csv".into()),
            bytes: b"a,b\n1,2\n".to_vec(),
        })
        .await
        .unwrap();
    assert_eq!(id, "file_9");

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("assistants"));
    assert!(body.contains("report.csv"));
}

#[tokio::test]
async fn assistant_lookup_maps_404_to_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/assistants/asst_gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {"message": "No assistant found"}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assistants/asst_ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "asst_ok"})))
        .mount(&server)
        .await;

    let p = provider(&server);
    assert!(!p.assistant_exists("asst_gone").await.unwrap());
    assert!(p.assistant_exists("asst_ok").await.unwrap());
}

#[tokio::test]
async fn create_assistant_sends_tools_and_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/assistants"))
        .and(body_partial_json(json!({
            "name": "Support",
            "model": "gpt-4o",
            "tools": [{"type": "code_interpreter"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "asst_new"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = provider(&server)
        .create_assistant(AssistantSpec {
            name: "Support".into(),
            instructions: Some("Be brief.".into()),
            model: "gpt-4o".into(),
            tools: vec!["code_interpreter".into()],
        })
        .await
        .unwrap();
    assert_eq!(id, "asst_new");
}

#[tokio::test]
async fn non_success_maps_to_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream broke"))
        .mount(&server)
        .await;

    let err = provider(&server).create_thread().await.unwrap_err();
    match err {
        Error::Provider { provider, message } => {
            assert_eq!(provider, "openai");
            assert!(message.contains("HTTP 500"));
            assert!(message.contains("upstream broke"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn summarize_title_reads_completion_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "  Budget planning  "}}]
        })))
        .mount(&server)
        .await;

    let title = provider(&server)
        .summarize_title("Let's plan the budget for Q3", 70)
        .await
        .unwrap();
    assert_eq!(title, "Budget planning");
}
