//! Integration tests for targetd-client
//!
//! An `httptest` server stands in for targetd and matches on the JSON-RPC
//! body of each request. Tests focus on:
//! - Request encoding (method, params, basic auth)
//! - Decoding of results and targetd error codes
//! - HTTP-level and envelope-level failures

use httptest::matchers::{contains, eq, json_decoded, key, not, request};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, ExpectationBuilder, Server, all_of};
use serde::Deserialize;
use serde_json::{Value, json};

use targetd_client::{ClientError, ErrorCode, TargetdApi, TargetdClient, TargetdConfig};

const RPC_PATH: &str = "/targetrpc";

// ============================================================================
// Helpers
// ============================================================================

/// A JSON-RPC request as targetd sees it. The id is random per call and
/// left out of the comparison.
#[derive(Debug, PartialEq, Deserialize)]
struct Rpc {
    jsonrpc: String,
    method: String,
    params: Value,
}

fn rpc(method: &str, params: Value) -> Rpc {
    Rpc {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
    }
}

/// Expect one POST carrying exactly this method and params.
fn expect_call(method: &str, params: Value) -> ExpectationBuilder {
    Expectation::matching(all_of![
        request::method_path("POST", RPC_PATH),
        request::body(json_decoded(eq(rpc(method, params)))),
    ])
}

fn ok(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": "1", "result": result})
}

fn rpc_error(code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": "1", "error": {"code": code, "message": message}})
}

fn client(server: &Server) -> TargetdClient {
    TargetdClient::new(TargetdConfig::new(server.url(RPC_PATH).to_string())).unwrap()
}

// ============================================================================
// Request Encoding Tests
// ============================================================================

#[tokio::test]
async fn test_vol_create_request() {
    let server = Server::run();
    server.expect(
        expect_call("vol_create", json!({"pool": "pool0", "name": "pvc-1", "size": 1u64 << 30}))
            .respond_with(json_encoded(ok(Value::Null))),
    );

    client(&server).vol_create("pool0", "pvc-1", 1 << 30).await.unwrap();
}

#[tokio::test]
async fn test_export_calls_use_vol_and_initiator_wwn() {
    let server = Server::run();
    server.expect(
        expect_call(
            "export_create",
            json!({"pool": "pool0", "vol": "pvc-1", "initiator_wwn": "iqn.1994-05.com.redhat:init1", "lun": 4}),
        )
        .respond_with(json_encoded(ok(Value::Null))),
    );
    server.expect(
        expect_call(
            "export_destroy",
            json!({"pool": "pool0", "vol": "pvc-1", "initiator_wwn": "iqn.1994-05.com.redhat:init1"}),
        )
        .respond_with(json_encoded(ok(Value::Null))),
    );
    let client = client(&server);

    client
        .export_create("pool0", "pvc-1", "iqn.1994-05.com.redhat:init1", 4)
        .await
        .unwrap();
    client
        .export_destroy("pool0", "pvc-1", "iqn.1994-05.com.redhat:init1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_resize_and_destroy_requests() {
    let server = Server::run();
    server.expect(
        expect_call("vol_resize", json!({"pool": "pool0", "name": "pvc-1", "size": 2u64 << 30}))
            .respond_with(json_encoded(ok(Value::Null))),
    );
    server.expect(
        expect_call("vol_destroy", json!({"pool": "pool0", "name": "pvc-1"}))
            .respond_with(json_encoded(ok(Value::Null))),
    );
    let client = client(&server);

    client.vol_resize("pool0", "pvc-1", 2 << 30).await.unwrap();
    client.vol_destroy("pool0", "pvc-1").await.unwrap();
}

#[tokio::test]
async fn test_basic_auth_header() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", RPC_PATH),
            // base64("admin:secret")
            request::headers(contains(("authorization", "Basic YWRtaW46c2VjcmV0"))),
        ])
        .respond_with(json_encoded(ok(Value::Null))),
    );

    let mut config = TargetdConfig::new(server.url(RPC_PATH).to_string());
    config.username = Some("admin".to_string());
    config.password = Some("secret".to_string());

    TargetdClient::new(config)
        .unwrap()
        .vol_destroy("pool0", "pvc-1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_no_auth_header_without_username() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", RPC_PATH),
            not(request::headers(contains(key("authorization")))),
        ])
        .respond_with(json_encoded(ok(Value::Null))),
    );

    client(&server).vol_destroy("pool0", "pvc-1").await.unwrap();
}

// ============================================================================
// Response Decoding Tests
// ============================================================================

#[tokio::test]
async fn test_remote_error_codes_are_decoded() {
    let cases = [
        (-50, ErrorCode::NameConflict),
        (-52, ErrorCode::ExistsInitiator),
        (-103, ErrorCode::VolumeNotFound),
        (-151, ErrorCode::VolumeExportNotFound),
        (-1000, ErrorCode::NoFreeHostLun),
        (-4242, ErrorCode::Other(-4242)),
    ];

    for (code, expected) in cases {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", RPC_PATH))
                .respond_with(json_encoded(rpc_error(code, "boom"))),
        );

        let err = client(&server).vol_create("pool0", "pvc-1", 1).await.unwrap_err();

        assert_eq!(err.kind(), Some(expected), "code {}", code);
        let remote = err.remote().unwrap();
        assert_eq!(remote.code, code);
        assert_eq!(remote.message, "boom");
    }
}

#[tokio::test]
async fn test_export_list_decoding() {
    let server = Server::run();
    server.expect(expect_call("export_list", json!({})).respond_with(json_encoded(ok(json!([
        {"initiator_wwn": "iqn.a", "lun": 0, "vol_name": "pvc-1", "pool": "pool0", "vol_uuid": "u1", "vol_size": 1024},
        {"initiator_wwn": "iqn.b", "lun": 1, "vol_name": "pvc-2", "pool": "pool0", "vol_size": 2048}
    ])))));

    let list = client(&server).export_list().await.unwrap();

    assert_eq!(list.len(), 2);
    assert_eq!(list[0].initiator_wwn, "iqn.a");
    assert_eq!(list[0].vol_uuid, "u1");
    assert_eq!(list[1].lun, 1);
    assert_eq!(list[1].vol_size, 2048);
    assert_eq!(list[1].vol_uuid, "");
}

/// The first available LUN is computed from a single export_list call
#[tokio::test]
async fn test_first_available_lun_from_export_list() {
    let server = Server::run();
    server.expect(expect_call("export_list", json!({})).respond_with(json_encoded(ok(json!([
        {"initiator_wwn": "iqn.a", "lun": 0, "vol_name": "pvc-1", "pool": "pool0", "vol_size": 1},
        {"initiator_wwn": "iqn.b", "lun": 0, "vol_name": "pvc-1", "pool": "pool0", "vol_size": 1},
        {"initiator_wwn": "iqn.a", "lun": 2, "vol_name": "pvc-3", "pool": "pool0", "vol_size": 1}
    ])))));

    let lun = client(&server).get_first_available_lun().await.unwrap();

    assert_eq!(lun, 1);
}

#[tokio::test]
async fn test_first_available_lun_propagates_remote_error() {
    let server = Server::run();
    server.expect(
        expect_call("export_list", json!({}))
            .respond_with(json_encoded(rpc_error(-1000, "no free host LUN"))),
    );

    let err = client(&server).get_first_available_lun().await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorCode::NoFreeHostLun));
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_http_error_status_is_transport_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", RPC_PATH)).respond_with(status_code(401)),
    );

    let err = client(&server).vol_destroy("pool0", "pvc-1").await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert!(err.remote().is_none());
    assert_eq!(err.kind(), None);
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", RPC_PATH))
            .respond_with(status_code(200).body("not json")),
    );

    let err = client(&server).vol_destroy("pool0", "pvc-1").await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidResponse(_)));
    assert!(err.to_string().contains("vol_destroy"));
}

#[tokio::test]
async fn test_unexpected_result_shape_is_invalid_response() {
    let server = Server::run();
    server.expect(
        expect_call("export_list", json!({}))
            .respond_with(json_encoded(ok(json!({"not": "a list"})))),
    );

    let err = client(&server).export_list().await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidResponse(_)));
}

// ============================================================================
// Mock Tests
// ============================================================================

#[tokio::test]
async fn test_mock_is_usable_as_trait_object() {
    use std::sync::Arc;
    use targetd_client::MockTargetd;

    let mock = Arc::new(MockTargetd::new());
    let api: Arc<dyn TargetdApi> = mock.clone();

    api.vol_create("pool0", "pvc-1", 10).await.unwrap();
    let lun = api.get_first_available_lun().await.unwrap();
    api.export_create("pool0", "pvc-1", "iqn.a", lun).await.unwrap();

    assert_eq!(lun, 0);
    assert_eq!(api.export_list().await.unwrap().len(), 1);
    assert_eq!(api.get_first_available_lun().await.unwrap(), 1);
    assert_eq!(
        api.vol_create("pool0", "pvc-1", 10).await.unwrap_err().kind(),
        Some(ErrorCode::NameConflict)
    );
}
