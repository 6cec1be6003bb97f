use httpmock::MockServer;

/// Start a fresh `httpmock::MockServer` for an async unit test.
pub async fn start_mock_server() -> MockServer {
    MockServer::start_async().await
}
