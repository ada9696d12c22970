//! Connection manager behavior against a fake upstream.

mod common;

use common::{connected_manager, manager, memory_entity, FakeConnector, FakeServer, TEST_URL};
use jmx_core::{
    core::{
        ConnectionConfig, ConnectionDescriptor, ConnectionKind, ConnectionStatus, JmxConfig,
        DEFAULT_CONNECTION_ID,
    },
    error::JmxError,
    upstream::REQUEST_TIMEOUT_KEY,
};

const URL_A: &str = "service:jmx:rmi:///jndi/rmi://host-a:9999/jmxrmi";
const URL_B: &str = "service:jmx:rmi:///jndi/rmi://host-b:9999/jmxrmi";

#[tokio::test]
async fn test_connect_success_sets_active() {
    let connector = FakeConnector::new();
    let server = FakeServer::with_entities([memory_entity()]);
    connector.serve(URL_A, server.clone());
    let manager = manager(connector.clone());

    assert!(manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A)));
    let connected = manager.connect("a").await.unwrap();

    assert_eq!(connected.status(), ConnectionStatus::Connected);
    assert_eq!(connected.mbean_count(), Some(1));
    assert!(connected.connected_at().is_some());
    assert!(connected.error().is_none());
    assert_eq!(manager.registry().active_id().as_deref(), Some("a"));
    assert!(manager.connection().is_ok());
}

#[tokio::test]
async fn test_connect_failure_is_data_not_error() {
    let connector = FakeConnector::new();
    let manager = manager(connector);

    manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A));
    let failed = manager.connect("a").await.unwrap();

    assert_eq!(failed.status(), ConnectionStatus::Failed);
    assert!(failed.error().unwrap().contains("Connection refused"));
    assert!(failed.handle().is_none());
    assert_eq!(
        manager.registry().get("a").unwrap().status(),
        ConnectionStatus::Failed
    );
}

#[tokio::test]
async fn test_connect_unknown_id_is_not_found() {
    let manager = manager(FakeConnector::new());
    let err = manager.connect("nope").await.unwrap_err();
    assert!(matches!(err, JmxError::ConnectionNotFound(ref id) if id == "nope"));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_local_connection_rejected() {
    let manager = manager(FakeConnector::new());
    manager
        .registry()
        .add(ConnectionDescriptor::local("local", "Local JVM"))
        .await;

    let result = manager.connect("local").await.unwrap();
    assert_eq!(result.kind(), ConnectionKind::Local);
    assert_eq!(result.status(), ConnectionStatus::Failed);
    assert!(result.error().unwrap().contains("LOCAL connections are deprecated"));
}

#[tokio::test]
async fn test_connection_without_active_fails_fast() {
    let manager = manager(FakeConnector::new());
    assert!(matches!(
        manager.connection(),
        Err(JmxError::NoActiveConnection)
    ));

    manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A));
    assert!(matches!(manager.connection(), Err(JmxError::NotConnected)));
}

#[tokio::test]
async fn test_switch_connection_closes_nothing_else() {
    let connector = FakeConnector::new();
    let server_a = FakeServer::with_entities([memory_entity()]);
    let server_b = FakeServer::new();
    connector.serve(URL_A, server_a.clone());
    connector.serve(URL_B, server_b.clone());
    let manager = manager(connector);

    manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A));
    manager.add_connection(&ConnectionConfig::remote("b", "B", URL_B));
    manager.connect("a").await.unwrap();
    manager.switch_connection("b").await.unwrap();

    assert_eq!(manager.registry().active_id().as_deref(), Some("b"));
    assert!(manager.registry().get("a").unwrap().is_connected());
    assert_eq!(server_a.close_count(), 0);
    assert_eq!(manager.connection_info().unwrap().id, "b");
}

#[tokio::test]
async fn test_reconnect_closes_previous_handle() {
    let connector = FakeConnector::new();
    let server = FakeServer::new();
    connector.serve(URL_A, server.clone());
    let manager = manager(connector.clone());

    manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A));
    manager.connect("a").await.unwrap();
    let again = manager.reconnect().await.unwrap();

    assert!(again.is_connected());
    assert_eq!(server.close_count(), 1);
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test]
async fn test_is_connected_demotes_on_probe_failure() {
    let connector = FakeConnector::new();
    let server = FakeServer::with_entities([memory_entity()]);
    connector.serve(URL_A, server.clone());
    let manager = manager(connector);

    manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A));
    manager.connect("a").await.unwrap();
    assert!(manager.is_connected().await);

    server.set_probe_failure(true);
    assert!(!manager.is_connected().await);

    let descriptor = manager.registry().get("a").unwrap();
    assert_eq!(descriptor.status(), ConnectionStatus::Failed);
    assert!(descriptor.handle().is_none());
    assert_eq!(server.close_count(), 1);
    assert!(matches!(manager.connection(), Err(JmxError::NotConnected)));
}

async fn until_gated(server: &FakeServer) {
    while server.gated_probes() == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_is_connected_yields_to_concurrent_disconnect() {
    let server = FakeServer::with_entities([memory_entity()]);
    let manager = connected_manager(server.clone()).await;
    let gate = server.gate_probes();

    let probing = tokio::spawn({
        let manager = manager.clone();
        async move { manager.is_connected().await }
    });
    until_gated(&server).await;

    assert!(manager.disconnect_id("test").await);
    gate.notify_one();
    assert!(!probing.await.unwrap());

    let descriptor = manager.registry().get("test").unwrap();
    assert_eq!(descriptor.status(), ConnectionStatus::Disconnected);
    assert!(descriptor.handle().is_none());
    assert_eq!(server.close_count(), 1);
    assert!(matches!(manager.connection(), Err(JmxError::NotConnected)));
}

#[tokio::test]
async fn test_stale_liveness_failure_leaves_replacement_alone() {
    let server = FakeServer::with_entities([memory_entity()]);
    let manager = connected_manager(server.clone()).await;
    let gate = server.gate_probes();

    let probing = tokio::spawn({
        let manager = manager.clone();
        async move { manager.is_connected().await }
    });
    until_gated(&server).await;

    // Reconnect installs a fresh handle while the old one is still probing
    let reconnected = manager.reconnect().await.unwrap();
    assert!(reconnected.is_connected());
    assert_eq!(server.close_count(), 1);

    server.set_probe_failure(true);
    gate.notify_one();
    assert!(!probing.await.unwrap());

    let descriptor = manager.registry().get("test").unwrap();
    assert_eq!(descriptor.status(), ConnectionStatus::Connected);
    assert!(manager.connection().is_ok());
    assert_eq!(server.close_count(), 1);
}

#[tokio::test]
async fn test_disconnect_marks_disconnected() {
    let connector = FakeConnector::new();
    let server = FakeServer::new();
    connector.serve(URL_A, server.clone());
    let manager = manager(connector);

    manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A));
    manager.connect("a").await.unwrap();
    assert!(manager.disconnect().await);

    let descriptor = manager.registry().get("a").unwrap();
    assert_eq!(descriptor.status(), ConnectionStatus::Disconnected);
    assert_eq!(server.close_count(), 1);
    assert!(!manager.disconnect_id("ghost").await);
}

#[tokio::test]
async fn test_remove_active_connection_closes_handle() {
    let connector = FakeConnector::new();
    let server = FakeServer::new();
    connector.serve(URL_A, server.clone());
    let manager = manager(connector);

    manager.add_connection(&ConnectionConfig::remote("b", "B", URL_B));
    manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A));
    manager.connect("a").await.unwrap();

    assert!(manager.remove_connection("a").await);
    assert_eq!(server.close_count(), 1);
    assert_eq!(manager.registry().active_id().as_deref(), Some("b"));
    assert!(!manager.remove_connection("a").await);
}

#[tokio::test]
async fn test_replacing_live_descriptor_closes_its_handle() {
    let server = FakeServer::new();
    let manager = connected_manager(server.clone()).await;

    manager
        .registry()
        .add(ConnectionDescriptor::remote("test", "Test again", TEST_URL))
        .await;

    assert_eq!(server.close_count(), 1);
    let descriptor = manager.registry().get("test").unwrap();
    assert_eq!(descriptor.name(), "Test again");
    assert_eq!(descriptor.status(), ConnectionStatus::Disconnected);
    assert_eq!(manager.registry().active_id().as_deref(), Some("test"));
}

#[tokio::test]
async fn test_add_connection_rejects_duplicates() {
    let manager = manager(FakeConnector::new());
    assert!(manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A)));
    assert!(!manager.add_connection(&ConnectionConfig::remote("a", "Other", URL_B)));
    assert_eq!(manager.registry().get("a").unwrap().name(), "A");
    assert_eq!(manager.list_connections().len(), 1);
}

#[tokio::test]
async fn test_credentials_reach_connector() {
    let connector = FakeConnector::new();
    connector.serve(URL_A, FakeServer::new());
    let manager = manager(connector.clone());

    let config = ConnectionConfig::remote("a", "A", URL_A).with_credentials("admin", "s3cret");
    manager.add_connection(&config);
    manager.connect("a").await.unwrap();

    let (endpoint, environment) = connector.environments().remove(0);
    assert_eq!(endpoint, URL_A);
    let credentials = environment.credentials.unwrap();
    assert_eq!(credentials.as_pair(), ["admin", "s3cret"]);
    assert!(!format!("{:?}", credentials).contains("s3cret"));
}

#[tokio::test]
async fn test_initialize_connects_legacy_default() {
    let connector = FakeConnector::new();
    connector.serve(URL_A, FakeServer::with_entities([memory_entity()]));
    let manager = manager(connector);

    let yaml = format!(
        r#"
connection:
  type: REMOTE
  url: "{URL_A}"
connections:
  - id: other
    name: Other
    type: REMOTE
    url: "{URL_B}"
"#
    );
    let config = JmxConfig::from_yaml_str(&yaml).unwrap();
    manager.initialize(&config).await;

    assert_eq!(
        manager.registry().active_id().as_deref(),
        Some(DEFAULT_CONNECTION_ID)
    );
    assert!(manager.connection().is_ok());
    assert_eq!(
        manager.registry().get("other").unwrap().status(),
        ConnectionStatus::Disconnected
    );
}

#[tokio::test]
async fn test_initialize_passes_legacy_timeout_to_transport() {
    let connector = FakeConnector::new();
    connector.serve(URL_A, FakeServer::new());
    let manager = manager(connector.clone());

    let yaml = format!(
        r#"
connection:
  type: REMOTE
  url: "{URL_A}"
  timeout_secs: 5
"#
    );
    manager
        .initialize(&JmxConfig::from_yaml_str(&yaml).unwrap())
        .await;

    let (_, environment) = connector.environments().remove(0);
    assert_eq!(environment.properties[REQUEST_TIMEOUT_KEY], "5000");
}

#[tokio::test]
async fn test_legacy_timeout_property_overrides_derived_value() {
    let connector = FakeConnector::new();
    connector.serve(URL_A, FakeServer::new());
    let manager = manager(connector.clone());

    let yaml = format!(
        r#"
connection:
  type: REMOTE
  url: "{URL_A}"
  timeout_secs: 5
  properties:
    jmx.remote.x.request.waiting.timeout: "2500"
"#
    );
    manager
        .initialize(&JmxConfig::from_yaml_str(&yaml).unwrap())
        .await;

    let (_, environment) = connector.environments().remove(0);
    assert_eq!(environment.properties[REQUEST_TIMEOUT_KEY], "2500");
}

#[tokio::test]
async fn test_initialize_prefers_flagged_default() {
    let connector = FakeConnector::new();
    connector.serve(URL_B, FakeServer::new());
    let manager = manager(connector);

    let config = JmxConfig {
        connections: vec![
            ConnectionConfig::remote("a", "A", URL_A),
            ConnectionConfig::remote("b", "B", URL_B).as_default(),
        ],
        ..JmxConfig::default()
    };
    manager.initialize(&config).await;

    assert_eq!(manager.registry().active_id().as_deref(), Some("b"));
    assert!(manager.connection_info().unwrap().connected);
}

#[tokio::test]
async fn test_initialize_survives_unreachable_default() {
    let manager = manager(FakeConnector::new());
    let config = JmxConfig {
        connections: vec![ConnectionConfig::remote("a", "A", URL_A).as_default()],
        ..JmxConfig::default()
    };
    manager.initialize(&config).await;

    let info = manager.connection_info().unwrap();
    assert_eq!(info.status, ConnectionStatus::Failed);
    assert!(!info.connected);
}

#[tokio::test]
async fn test_shutdown_closes_all() {
    let connector = FakeConnector::new();
    let server = FakeServer::new();
    connector.serve(URL_A, server.clone());
    connector.serve(URL_B, server.clone());
    let manager = manager(connector);

    manager.add_connection(&ConnectionConfig::remote("a", "A", URL_A));
    manager.add_connection(&ConnectionConfig::remote("b", "B", URL_B));
    manager.connect("a").await.unwrap();
    manager.connect("b").await.unwrap();

    manager.shutdown().await;
    assert_eq!(server.close_count(), 2);
    assert!(manager.registry().is_empty());
}
