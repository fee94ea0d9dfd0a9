// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

// Installs the process-wide dispatcher, so kept in its own test binary.

use lokilog::logger;
use lokilog::{ConfigurationError, SinkConfig};
use mockito::Server;

#[tokio::test(flavor = "multi_thread")]
async fn installed_logger_ships_records_and_keeps_diagnostics_local() {
    let mut mock_server = Server::new_async().await;
    let mock = mock_server
        .mock("POST", "/loki/api/v1/push")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let mut config =
        SinkConfig::new(&mock_server.url(), Some("T1"), r#"{job="it"}"#).with_file(&path);
    config.transport.check_status = true;

    let guard = logger::from_config(&config)
        .expect("failed to build logger")
        .install()
        .expect("failed to install logger");

    tracing::info!(order = 7, "order placed");
    guard.sync().unwrap();

    let records: Vec<serde_json::Value> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(records
        .iter()
        .any(|r| r["fields"]["message"] == "order placed" && r["fields"]["order"] == 7));
    assert!(records
        .iter()
        .any(|r| r["fields"]["message"] == "Loki push failed, line dropped"
            && r["level"] == "ERROR"));

    // The push failure itself was not pushed.
    mock.assert_async().await;

    assert!(matches!(
        logger::production().unwrap().install(),
        Err(ConfigurationError::AlreadyInitialized)
    ));
}
