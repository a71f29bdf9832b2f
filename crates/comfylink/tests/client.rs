//! Integration tests for `ComfyClient`: HTTP through a mock server,
//! realtime through the in-memory transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use comfylink::api::HttpApi;
use comfylink::prelude::*;
use comfylink::session::Session;
use comfylink::transport::{Dial, MemoryConnector};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =========================================================================
// Helpers
// =========================================================================

const PROBE_ROUTE: &str = "/object_info/Primitive%20boolean%20%5BCrystools%5D";

struct Setup {
    server: MockServer,
    connector: MemoryConnector,
    client: ComfyClient,
    events: Arc<Mutex<Vec<Event>>>,
}

impl Setup {
    async fn new(options: ClientOptions) -> Self {
        let server = MockServer::start().await;
        let session = Arc::new(
            Session::with_client_id(server.uri(), "client-1", options.credentials.as_ref())
                .unwrap(),
        );
        let api = Arc::new(HttpApi::new(Arc::clone(&session)).unwrap());
        let connector = MemoryConnector::new();
        let client = ComfyClient::with_parts(session, api, connector.clone(), options);

        let events: Arc<Mutex<Vec<Event>>> = Arc::default();
        for topic in [
            Topic::Connected,
            Topic::ConnectionError,
            Topic::AuthError,
            Topic::AuthSuccess,
            Topic::QueueError,
            Topic::Terminal,
            Topic::Preview,
            Topic::message("status"),
        ] {
            let sink = Arc::clone(&events);
            client.on(topic, move |e| sink.lock().unwrap().push(e.clone()));
        }

        Self {
            server,
            connector,
            client,
            events,
        }
    }

    async fn mount(&self, verb: &str, route: &str, status: u16, body: serde_json::Value) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// A reachable server without the monitoring extension.
    async fn healthy(&self) {
        self.mount("GET", "/prompt", 200, json!({"exec_info": {"queue_remaining": 0}}))
            .await;
        self.mount("GET", PROBE_ROUTE, 200, json!({})).await;
        self.mount("GET", "/system_stats", 200, json!({"system": {"os": "posix"}}))
            .await;
        self.mount("PATCH", "/internal/logs/subscribe", 200, json!({}))
            .await;
    }

    fn count(&self, topic: &Topic) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.topic() == *topic)
            .count()
    }

    async fn requests_to(&self, route: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == route)
            .count()
    }
}

fn fast_init() -> InitOptions {
    InitOptions {
        max_tries: 2,
        delay: Duration::from_millis(10),
    }
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn ready(setup: &Setup) {
    tokio::time::timeout(Duration::from_secs(5), setup.client.wait_for_ready())
        .await
        .expect("client did not become ready")
        .unwrap();
}

// =========================================================================
// Startup
// =========================================================================

#[tokio::test]
async fn test_reachable_server_connects_and_becomes_ready() {
    let s = Setup::new(ClientOptions::default()).await;
    s.healthy().await;

    s.client.init(fast_init());
    ready(&s).await;
    eventually("open channel", || s.client.state() == ConnectionState::Open).await;
    eventually("os type", || s.client.os_type().is_some()).await;

    assert!(s.client.is_ready());
    assert_eq!(s.count(&Topic::Connected), 1);
    assert_eq!(s.count(&Topic::ConnectionError), 0);
    assert_eq!(s.client.os_type().as_deref(), Some("posix"));
    assert_eq!(s.client.available_features().get("monitor"), Some(&false));
    assert_eq!(s.connector.dial_count(), 1);
    assert_eq!(
        s.connector.last_link().unwrap().request().url,
        format!("ws://{}/ws?clientId=client-1", s.server.address())
    );
}

#[tokio::test]
async fn test_unreachable_server_never_becomes_ready() {
    let s = Setup::new(ClientOptions::default()).await;
    s.mount("GET", "/prompt", 503, json!({})).await;

    s.client.init(fast_init());
    let result = tokio::time::timeout(Duration::from_secs(5), s.client.wait_for_ready())
        .await
        .unwrap();

    assert!(matches!(result, Err(ClientError::Closed)));
    assert!(!s.client.is_ready());
    assert_eq!(s.client.state(), ConnectionState::Closed);
    assert_eq!(s.count(&Topic::ConnectionError), 1);
    assert_eq!(s.connector.dial_count(), 0);
    // One initial attempt plus max_tries retries.
    assert_eq!(s.requests_to("/prompt").await, 3);
}

#[tokio::test]
async fn test_not_ready_while_a_feature_probe_is_pending() {
    let s = Setup::new(ClientOptions::default()).await;
    s.mount("GET", "/prompt", 200, json!({})).await;
    Mock::given(method("GET"))
        .and(path(PROBE_ROUTE))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&s.server)
        .await;

    s.client.init(fast_init());
    eventually("open channel", || s.client.state() == ConnectionState::Open).await;

    assert!(!s.client.is_ready());
    ready(&s).await;
    assert!(s.client.is_ready());
    assert_eq!(s.client.available_features().get("monitor"), Some(&false));
}

#[tokio::test]
async fn test_failed_feature_probe_counts_as_unsupported() {
    let s = Setup::new(ClientOptions::default()).await;
    s.mount("GET", "/prompt", 200, json!({})).await;
    s.mount("GET", PROBE_ROUTE, 500, json!({})).await;

    s.client.init(fast_init());
    ready(&s).await;

    assert_eq!(s.client.monitor().support(), Support::Unsupported);
    assert_eq!(s.client.available_features().get("monitor"), Some(&false));
    assert!(!s.client.monitor().switch(true).await.unwrap());
    assert_eq!(s.requests_to("/api/crystools/monitor/switch").await, 0);
}

#[tokio::test]
async fn test_malformed_host_is_a_session_error() {
    let err = ComfyClient::new("ftp://127.0.0.1:8188", ClientOptions::default()).unwrap_err();

    assert!(matches!(err, ClientError::Session(_)));
    assert!(err.to_string().contains("ftp://127.0.0.1:8188"));
}

#[tokio::test]
async fn test_init_twice_is_a_noop() {
    let s = Setup::new(ClientOptions::default()).await;
    s.healthy().await;

    s.client.init(fast_init()).init(fast_init());
    ready(&s).await;
    eventually("open channel", || s.client.state() == ConnectionState::Open).await;

    assert_eq!(s.connector.dial_count(), 1);
    assert_eq!(s.count(&Topic::Connected), 1);
}

#[tokio::test]
async fn test_listen_terminal_subscribes_with_client_id() {
    let s = Setup::new(ClientOptions::default().listen_terminal(true)).await;
    Mock::given(method("PATCH"))
        .and(path("/internal/logs/subscribe"))
        .and(body_json(json!({"clientId": "client-1", "enabled": true})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.server)
        .await;
    s.mount("GET", "/prompt", 200, json!({})).await;
    s.mount("GET", PROBE_ROUTE, 200, json!({})).await;
    s.mount("GET", "/system_stats", 200, json!({"system": {"os": "nt"}}))
        .await;

    s.client.init(fast_init());
    ready(&s).await;
    eventually("subscription call", || s.client.os_type().is_some()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(s.requests_to("/internal/logs/subscribe").await, 1);
}

// =========================================================================
// Credentials
// =========================================================================

#[tokio::test]
async fn test_accepted_credentials_publish_auth_success() {
    let options = ClientOptions::default().with_credentials(Credentials::bearer("t0k"));
    let s = Setup::new(options).await;
    Mock::given(method("GET"))
        .and(path("/prompt"))
        .and(header("authorization", "Bearer t0k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&s.server)
        .await;
    s.mount("GET", PROBE_ROUTE, 200, json!({})).await;

    s.client.init(fast_init());
    ready(&s).await;

    assert_eq!(s.count(&Topic::AuthSuccess), 1);
    assert_eq!(s.count(&Topic::AuthError), 0);
    let link = s.connector.last_link().unwrap();
    assert!(link
        .request()
        .headers
        .contains(&("Authorization".to_string(), "Bearer t0k".to_string())));
}

#[tokio::test]
async fn test_rejected_credentials_publish_auth_error() {
    let options = ClientOptions::default().with_credentials(Credentials::basic("u", "bad"));
    let s = Setup::new(options).await;
    s.mount("GET", "/prompt", 401, json!({})).await;

    s.client.init(InitOptions {
        max_tries: 0,
        delay: Duration::from_millis(10),
    });
    let _ = tokio::time::timeout(Duration::from_secs(5), s.client.wait_for_ready()).await;

    let auth_error = s
        .events
        .lock()
        .unwrap()
        .iter()
        .find(|e| e.topic() == Topic::AuthError)
        .cloned();
    assert_eq!(auth_error, Some(Event::AuthError { status: 401 }));
    assert_eq!(s.count(&Topic::AuthSuccess), 0);
}

// =========================================================================
// Realtime feed
// =========================================================================

#[tokio::test]
async fn test_frames_reach_listeners_and_update_identity() {
    let s = Setup::new(ClientOptions::default()).await;
    s.healthy().await;
    s.client.init(fast_init());
    ready(&s).await;
    eventually("open channel", || s.client.state() == ConnectionState::Open).await;
    let link = s.connector.last_link().unwrap();

    link.send_text(r#"{"type":"status","data":{"status":{},"sid":"srv-42"}}"#);
    link.send_text(r#"{"type":"logs","data":{"entries":[{"t":"0","m":"hello"}]}}"#);
    link.send_binary(vec![0, 0, 0, 1, 0, 0, 0, 1, 0xFF, 0xD8]);
    eventually("preview", || s.count(&Topic::Preview) == 1).await;

    assert_eq!(s.count(&Topic::message("status")), 1);
    assert_eq!(s.count(&Topic::Terminal), 1);
    assert_eq!(s.client.id(), "srv-42");
    let preview = s
        .events
        .lock()
        .unwrap()
        .iter()
        .find_map(|e| match e {
            Event::Preview(p) => Some(p.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(preview.mime, ImageMime::Jpeg);
    assert_eq!(preview.data, vec![0xFF, 0xD8]);
}

#[tokio::test]
async fn test_monitoring_feature_end_to_end() {
    let s = Setup::new(ClientOptions::default()).await;
    s.mount("GET", "/prompt", 200, json!({})).await;
    s.mount("GET", PROBE_ROUTE, 200, json!({"Primitive boolean [Crystools]": {}}))
        .await;
    s.client.init(fast_init());
    ready(&s).await;
    eventually("open channel", || s.client.state() == ConnectionState::Open).await;

    assert_eq!(s.client.available_features().get("monitor"), Some(&true));
    s.connector
        .last_link()
        .unwrap()
        .send_text(r#"{"type":"crystools.monitor","data":{"cpu_utilization":33.0,"gpus":[]}}"#);
    eventually("monitor sample", || s.client.monitor().monitor_data().is_some()).await;

    assert_eq!(s.client.monitor().monitor_data().unwrap().cpu_utilization, 33.0);
}

#[tokio::test]
async fn test_reconnect_after_server_close() {
    let s = Setup::new(ClientOptions::default()).await;
    s.healthy().await;
    s.client.init(fast_init());
    ready(&s).await;
    eventually("open channel", || s.client.state() == ConnectionState::Open).await;
    let reconnected: Arc<Mutex<usize>> = Arc::default();
    let counter = Arc::clone(&reconnected);
    s.client
        .on(Topic::Reconnected, move |_| *counter.lock().unwrap() += 1);

    s.connector.last_link().unwrap().hang_up();
    eventually("reconnect", || *reconnected.lock().unwrap() == 1).await;

    assert_eq!(s.connector.dial_count(), 2);
    assert_eq!(s.client.state(), ConnectionState::Open);
}

// =========================================================================
// Queue
// =========================================================================

#[tokio::test]
async fn test_queue_prompt_returns_response() {
    let s = Setup::new(ClientOptions::default()).await;
    s.mount("POST", "/prompt", 200, json!({"prompt_id": "p-1", "number": 4}))
        .await;

    let queued = s
        .client
        .queue_prompt(QueuePosition::Number(4), json!({"1": {}}))
        .await
        .unwrap();

    assert_eq!(queued.prompt_id, "p-1");
    assert_eq!(s.count(&Topic::QueueError), 0);
}

#[tokio::test]
async fn test_append_prompt_failure_publishes_queue_error() {
    let s = Setup::new(ClientOptions::default()).await;
    s.mount("POST", "/prompt", 500, json!({"error": "boom"})).await;

    let err = s.client.append_prompt(json!({})).await.unwrap_err();

    assert!(matches!(err, ClientError::Api(_)));
    assert_eq!(s.count(&Topic::QueueError), 1);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test]
async fn test_destroy_is_terminal() {
    let s = Setup::new(ClientOptions::default()).await;
    s.healthy().await;
    s.client.init(fast_init());
    ready(&s).await;
    eventually("open channel", || s.client.state() == ConnectionState::Open).await;
    let link = s.connector.last_link().unwrap();

    s.client.destroy().await;
    eventually("transport closed", || link.is_closed()).await;

    assert_eq!(s.client.state(), ConnectionState::Closed);
    assert_eq!(s.client.listener_count(&Topic::Connected), 0);
    assert_eq!(s.client.listener_count(&Topic::All), 0);
    link.send_text(r#"{"type":"status","data":{"sid":"late"}}"#);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(s.client.id(), "client-1");
}

#[tokio::test]
async fn test_destroy_before_ready_unblocks_waiters() {
    let s = Setup::new(ClientOptions::default()).await;
    Mock::given(method("GET"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&s.server)
        .await;
    s.connector.plan(Dial::Hang);
    s.client.init(InitOptions::default());

    let waiter = {
        let client = s.client.clone();
        tokio::spawn(async move { client.wait_for_ready().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    s.client.destroy().await;

    let result = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(ClientError::Closed)));
    assert_eq!(s.connector.dial_count(), 0);
}
