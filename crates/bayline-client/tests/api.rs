//! HTTP-level tests against a mock shop server.

use std::sync::Arc;

use bayline_client::classify::{MSG_SERVER_FAULT, MSG_UNAUTHORIZED};
use bayline_client::{
    ErrorKind, FileSessionStore, LoginRequest, MutationOutcome, SessionCredential, SessionEvent,
    SessionStore, ShopClient, TerminationReason,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_regex, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ShopClient {
    ShopClient::builder()
        .base_url(server.uri())
        .build()
        .expect("client")
}

fn authed_client(server: &MockServer, token: &str) -> ShopClient {
    ShopClient::builder()
        .base_url(server.uri())
        .auth_token(token)
        .build()
        .expect("client")
}

#[tokio::test]
async fn login_then_reads_are_authenticated_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "tech@shop.example", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "t1",
            "user": {"id": 7, "name": "Sam"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/customers"))
        .and(header("Authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let login = client
        .auth()
        .login(&LoginRequest::new("tech@shop.example", "pw"))
        .await
        .expect("login");
    assert_eq!(login.token, "t1");
    assert!(client.is_authenticated());

    let first = client.customers().list(&[]).await.expect("first read");
    let second = client.customers().list(&[]).await.expect("second read");
    assert_eq!(first, json!([{"id": 1}]));
    assert_eq!(first, second);
    assert_eq!(client.cache().stats().hits, 1);
}

#[tokio::test]
async fn rejected_credential_terminates_session_once() {
    let server = MockServer::start().await;
    Mock::given(path_regex("^/api/auth/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "jwt expired"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(FileSessionStore::new(dir.path()));
    store
        .save(&SessionCredential::new("expired", json!({"id": 1})))
        .expect("seed session");

    let client = ShopClient::builder()
        .base_url(server.uri())
        .session_store(store.clone())
        .build()
        .expect("client");
    assert!(client.is_authenticated());
    let mut events = client.subscribe();

    let (jobs_api, customers_api, vehicles_api) =
        (client.jobs(), client.customers(), client.vehicles());
    let (jobs, customers, vehicles) = tokio::join!(
        jobs_api.list(&[]),
        customers_api.list(&[]),
        vehicles_api.list(&[]),
    );
    for result in [jobs, customers, vehicles] {
        let err = result.expect_err("401");
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(err.message, MSG_UNAUTHORIZED);
    }

    assert!(!client.is_authenticated());
    assert!(store.load().expect("load").is_none());

    let mut terminations = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Terminated { reason } = event {
            terminations.push(reason);
        }
    }
    assert_eq!(terminations, vec![TerminationReason::Unauthorized]);
}

#[tokio::test]
async fn persisted_session_is_rehydrated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("Authorization", "Bearer saved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": 3}})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    FileSessionStore::new(dir.path())
        .save(&SessionCredential::new("saved", json!({"id": 3})))
        .expect("seed");

    let client = ShopClient::builder()
        .base_url(server.uri())
        .session_store(Arc::new(FileSessionStore::new(dir.path())))
        .build()
        .expect("client");

    let me = client.auth().me().await.expect("me");
    assert_eq!(me["user"]["id"], 3);
}

#[tokio::test]
async fn validation_failure_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/customers"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Email is required"})),
        )
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    let err = client
        .customers()
        .create(&json!({"name": "No Email"}))
        .await
        .expect_err("422");

    assert_eq!(err.kind, ErrorKind::ValidationFailed);
    assert_eq!(err.message, "Email is required");
    assert_eq!(err.status, Some(422));
    assert!(client.queue().is_empty());
}

#[tokio::test]
async fn server_fault_is_not_queued() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    let err = client
        .vehicles()
        .update("9", &json!({"mileage": 120000}))
        .await
        .expect_err("503");

    assert_eq!(err.kind, ErrorKind::ServerFault);
    assert_eq!(err.message, MSG_SERVER_FAULT);
    assert!(client.queue().is_empty());
    assert!(client.is_online());
}

#[tokio::test]
async fn health_not_found_is_quiet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.health().check().await.expect_err("404");
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(err.is_quiet());
    assert!(!client.health().is_healthy().await);
}

#[tokio::test]
async fn health_check_is_never_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "db": "up"})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    let health = client.health().check().await.expect("health");
    assert_eq!(health.status, "ok");
    assert!(client.health().is_healthy().await);
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn query_params_are_sent_and_keyed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/jobs"))
        .and(query_param("status", "open"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    client
        .jobs()
        .list(&[("status", "open"), ("page", "1")])
        .await
        .expect("jobs");

    assert!(client.cache().contains_raw("/api/auth/jobs?page=1&status=open"));
    // Same parameters in another order hit the same entry.
    client
        .jobs()
        .list(&[("page", "1"), ("status", "open")])
        .await
        .expect("cached jobs");
}

#[tokio::test]
async fn customer_search_uses_q_param() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/customers/search"))
        .and(query_param("q", "smith"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 4}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    let found = client.customers().search("smith").await.expect("search");
    assert_eq!(found, json!([{"id": 4}]));
}

#[tokio::test]
async fn write_invalidates_entity_reads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/jobs/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/auth/jobs/5/status"))
        .and(body_json(json!({"status": "complete"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 5, "status": "complete"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    client.jobs().get("5").await.expect("get");
    let outcome = client
        .jobs()
        .update_status("5", &bayline_client::JobStatusUpdate::new("complete"))
        .await
        .expect("patch");
    assert!(matches!(outcome, MutationOutcome::Completed(_)));
    client.jobs().get("5").await.expect("refetch");
}

#[tokio::test]
async fn migration_analyze_uploads_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/migration/analyze"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    let analysis = client
        .migration()
        .analyze("customers.csv", "text/csv", "name\nA\nB\nC\n")
        .await
        .expect("analyze");
    assert_eq!(analysis["rows"], 3);
}

#[tokio::test]
async fn migration_import_clears_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/migration/import"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"imported": 3})))
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    client.customers().list(&[]).await.expect("customers");
    client.vehicles().list(&[]).await.expect("vehicles");
    assert_eq!(client.cache().len(), 2);

    client
        .migration()
        .import(&json!({"customers": []}))
        .await
        .expect("import");
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn logout_clears_locally_when_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    let mut events = client.subscribe();

    assert!(!client.auth().logout().await);
    assert!(!client.is_authenticated());
    assert!(matches!(
        events.recv().await.expect("event"),
        SessionEvent::Terminated {
            reason: TerminationReason::Logout
        }
    ));
}

#[tokio::test]
async fn refresh_replaces_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("Authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server, "old");
    let generation = client.session().generation();
    client.auth().refresh().await.expect("refresh");

    let credential = client.session().credential().expect("credential");
    assert_eq!(credential.token, "new");
    assert!(client.session().generation() > generation);
}

#[tokio::test]
async fn obd2_lookup_posts_parsed_codes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/obd2/lookup"))
        .and(body_json(json!({"codes": ["P0300", "P0171"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    client
        .obd2()
        .lookup_text("misfire p0300 with lean P0171, P0300")
        .await
        .expect("lookup");
}

#[tokio::test]
async fn migration_analyze_bad_content_type_is_not_network() {
    let server = MockServer::start().await;
    let client = authed_client(&server, "tok");

    let err = client
        .migration()
        .analyze("customers.csv", "not a mime", "name\nA\n")
        .await
        .expect_err("invalid content type");
    assert_eq!(err.kind, ErrorKind::Unknown);
    assert!(client.is_online());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn read_in_flight_across_logout_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/customers"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["user-A record"]))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = authed_client(&server, "token-a");
    let read = {
        let client = client.clone();
        tokio::spawn(async move { client.customers().list(&[]).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(client.auth().logout().await);

    let data = read.await.expect("join").expect("read");
    assert_eq!(data, json!(["user-A record"]));
    assert!(client.cache().is_empty());

    let fetched = client
        .fetch("/api/auth/customers", bayline_client::RequestOptions::new())
        .await
        .expect("signed-out read");
    assert!(!fetched.from_cache);
}

#[tokio::test]
async fn item_id_stays_in_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/jobs/7%2Fstatus%3Fx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "7/status?x"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server, "tok");
    let job = client.jobs().get("7/status?x").await.expect("job");
    assert_eq!(job["id"], "7/status?x");
}
