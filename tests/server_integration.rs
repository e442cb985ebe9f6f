use anyhow::Result;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

use graph_file_proxy::auth::components::ProxyComponents;
use graph_file_proxy::{AppConfig, CredentialsConfig, RecordStoreConfig, serve};

/// Client-secret credentials so startup never touches a metadata endpoint.
fn test_config() -> AppConfig {
    AppConfig {
        credentials: CredentialsConfig {
            use_managed_identity: false,
            tenant_id: Some("contoso".to_string()),
            client_id: Some("proxy-app".to_string()),
            client_secret: Some("not-a-real-secret".to_string()),
            ..CredentialsConfig::default()
        },
        records: RecordStoreConfig {
            base_url: "https://org.crm.dynamics.com".to_string(),
            entity_set: "new_expenses".to_string(),
            ..RecordStoreConfig::default()
        },
        ..AppConfig::default()
    }
}

struct RunningServer {
    base_url: String,
    shutdown: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<Result<()>>,
}

async fn start() -> Result<RunningServer> {
    let config = test_config();
    let components = ProxyComponents::new_production(&config)?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);

    let (shutdown, signal) = oneshot::channel::<()>();
    let handle = tokio::spawn(serve(listener, config, components, async move {
        let _ = signal.await;
    }));

    Ok(RunningServer {
        base_url,
        shutdown,
        handle,
    })
}

#[tokio::test]
async fn test_server_serves_health_endpoints() -> Result<()> {
    let server = start().await?;
    let client = reqwest::Client::new();

    let response = timeout(
        Duration::from_secs(5),
        client.get(format!("{}/health", server.base_url)).send(),
    )
    .await??;
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-trace-id"));
    assert_eq!(response.text().await?, "OK");

    let response = client
        .get(format!("{}/health/readiness", server.base_url))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["api"]["status"], "healthy");

    drop(client);
    let _ = server.shutdown.send(());
    timeout(Duration::from_secs(5), server.handle).await???;
    Ok(())
}

#[tokio::test]
async fn test_anonymous_download_is_rejected() -> Result<()> {
    let server = start().await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/file?driveId=d1&itemId=i1", server.base_url))
        .header("x-trace-id", "integration-trace-1")
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    assert_eq!(response.headers()["x-trace-id"], "integration-trace-1");
    assert!(response.text().await?.contains("Authentication required"));

    let _ = server.shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_graceful_shutdown_completes() -> Result<()> {
    let server = start().await?;

    server
        .shutdown
        .send(())
        .map_err(|_| anyhow::anyhow!("server stopped early"))?;

    let result = timeout(Duration::from_secs(5), server.handle).await?;
    assert!(result?.is_ok());
    Ok(())
}
