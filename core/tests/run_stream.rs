use std::sync::Arc;
use std::time::Duration;

use opsdeck_core::client::BackendClient;
use opsdeck_core::client::CommandArgs;
use opsdeck_core::default_client::create_client;
use opsdeck_core::stream::SseTransport;
use opsdeck_core::stream::StreamController;
use opsdeck_core::stream::StreamState;
use opsdeck_core::stream::StreamUpdate;
use pretty_assertions::assert_eq;
use url::Url;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

fn backend_client(server: &MockServer) -> BackendClient {
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    BackendClient::with_client(create_client(), base)
}

fn controller_for(server: &MockServer) -> StreamController {
    StreamController::new(Arc::new(SseTransport::new(backend_client(server))), false)
}

fn args(pairs: &[(&str, &str)]) -> CommandArgs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect()
}

async fn drain_until_finished(controller: &mut StreamController) -> Vec<StreamUpdate> {
    let mut updates = Vec::new();
    loop {
        let update = tokio::time::timeout(Duration::from_secs(5), controller.next_update())
            .await
            .expect("no Finished update arrived");
        let done = matches!(update, StreamUpdate::Finished { .. });
        updates.push(update);
        if done {
            return updates;
        }
    }
}

fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

#[tokio::test]
async fn streams_deploy_output_to_completion() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: stdout\n",
        "data: \"Cloning repo...\"\n\n",
        "event: stdout\n",
        "data: \"Building image\"\n\n",
        "event: result\n",
        "data: {\"success\":true,\"exitCode\":0}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/api/run-realtime/deploy-project"))
        // The `args` parameter decodes once to the still-encoded JSON bag.
        .and(query_param("args", "%7B%22name%22%3A%22x%22%7D"))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller
        .start("deploy-project", args(&[("name", "x")]))
        .unwrap();

    let updates = drain_until_finished(&mut controller).await;
    let finished: Vec<_> = updates
        .iter()
        .filter(|update| matches!(update, StreamUpdate::Finished { .. }))
        .collect();
    assert_eq!(finished, vec![&StreamUpdate::Finished { success: true }]);

    let texts: Vec<_> = controller
        .lines()
        .iter()
        .map(|line| line.text.as_str())
        .collect();
    assert_eq!(
        texts,
        vec![
            "▶ Starting command: deploy-project",
            "● Connected to command stream",
            "Cloning repo...",
            "Building image",
            "✔ Command completed (exit code: 0)",
        ]
    );
    assert_eq!(controller.state(), StreamState::Ready);
}

#[tokio::test]
async fn stderr_and_failure_result_are_rendered() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: stderr\n",
        "data: \"permission denied\"\n\n",
        "event: result\n",
        "data: {\"success\":false,\"error\":\"deploy failed\"}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/api/run-realtime/deploy-project"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller
        .start("deploy-project", CommandArgs::new())
        .unwrap();

    let updates = drain_until_finished(&mut controller).await;
    assert!(updates.contains(&StreamUpdate::Finished { success: false }));

    let texts: Vec<_> = controller
        .lines()
        .iter()
        .map(|line| line.text.as_str())
        .collect();
    assert!(texts.contains(&"[ERROR] permission denied"));
    assert_eq!(*texts.last().unwrap(), "✖ Command failed: deploy failed");
}

#[tokio::test]
async fn http_error_status_is_a_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/run-realtime/deploy-project"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller
        .start("deploy-project", CommandArgs::new())
        .unwrap();

    let updates = drain_until_finished(&mut controller).await;
    assert!(updates.contains(&StreamUpdate::Finished { success: false }));
    assert_eq!(controller.state(), StreamState::Error);
}

#[tokio::test]
async fn non_event_stream_response_is_a_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/run-realtime/deploy-project"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller
        .start("deploy-project", CommandArgs::new())
        .unwrap();

    let updates = drain_until_finished(&mut controller).await;
    assert!(updates.contains(&StreamUpdate::Finished { success: false }));
    assert_eq!(controller.state(), StreamState::Error);
}

#[tokio::test]
async fn fire_and_forget_run_posts_argument_bag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/run/restart-tag-server"))
        .and(body_json(serde_json::json!({ "args": { "port": "9001" } })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = backend_client(&server);
    client
        .run_command("restart-tag-server", &args(&[("port", "9001")]))
        .await
        .unwrap();
}

#[tokio::test]
async fn lists_available_commands() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            "deploy-project",
            "restart-tag-server",
        ])))
        .mount(&server)
        .await;

    let client = backend_client(&server);
    assert_eq!(
        client.list_commands().await.unwrap(),
        vec!["deploy-project".to_string(), "restart-tag-server".to_string()]
    );
}
