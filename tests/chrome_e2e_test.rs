//! End-to-end healing against a real headless Chrome
//!
//! Uses the local HTTP server for both the page under test and the embeddings
//! API. Needs a Chrome or Chromium installation, so these are ignored by default:
//!
//! ```sh
//! cargo test --test chrome_e2e_test -- --ignored
//! ```

mod test_server;

use heal_webdriver::{
    fingerprint_page, run_flow, ChromeDriver, ConnectionMode, EmbeddingConfig, ExecutorOptions,
    FlowExecutor, HttpEmbeddingClient, PageDriver, StepStatus, TestFlow, TestStep,
};
use test_server::{TestServer, API_KEY};

/// Helper to create a headless driver for testing
async fn create_headless_driver() -> anyhow::Result<ChromeDriver> {
    ChromeDriver::new(ConnectionMode::Sandboxed {
        chrome_path: None,
        no_sandbox: true, // Required for CI environments
        headless: true,
    })
    .await
    .map_err(|e| anyhow::anyhow!("Failed to launch Chrome: {}", e))
}

fn embedding_client(server: &TestServer) -> HttpEmbeddingClient {
    HttpEmbeddingClient::new(EmbeddingConfig::new(API_KEY).with_base_url(server.embeddings_url()))
}

fn signup_flow(url: &str) -> TestFlow {
    TestFlow::new(
        ".",
        vec![
            TestStep::Goto {
                target: url.to_string(),
            },
            TestStep::Fill {
                query: "#mail".to_string(),
                value: "a@b.c".to_string(),
                fallback: Some("email input".to_string()),
            },
            TestStep::Click {
                query: "#submit".to_string(),
                fallback: Some("submit button".to_string()),
            },
        ],
    )
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_fingerprint_live_page() -> anyhow::Result<()> {
    let server = TestServer::start().await;
    server.wait_ready().await?;
    let driver = create_headless_driver().await?;

    driver.navigate(&server.url()).await?;
    assert!(driver.current_url().await?.starts_with(&server.url()));
    let descriptors = fingerprint_page(&driver).await?;
    let selectors: Vec<&str> = descriptors.iter().map(|d| d.selector.as_str()).collect();

    assert_eq!(selectors, vec!["#email", "text=Submit", "text=Home"]);
    assert_eq!(descriptors[0].description, "input id 'email', type 'email'");
    assert_eq!(descriptors[1].description, "button with text 'Submit'");

    driver.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_broken_selectors_healed_in_chrome() -> anyhow::Result<()> {
    let server = TestServer::start().await;
    server.wait_ready().await?;
    let driver = create_headless_driver().await?;
    let provider = embedding_client(&server);
    let mut flow = signup_flow(&server.url());

    let mut executor = FlowExecutor::new(&driver, &provider, ExecutorOptions::default());
    let report = executor.run(&mut flow).await;

    assert_eq!(report.results[0].status, StepStatus::Passed);
    assert_eq!(report.healed, 2, "report: {:?}", report);
    assert_eq!(flow.test_steps[1].query(), Some("#email"));
    assert_eq!(flow.test_steps[2].query(), Some("text=Submit"));

    // the healed click really reached the button
    assert_eq!(driver.title().await?, "Submitted");
    let value = driver
        .execute_script("document.getElementById('email').value")
        .await?;
    assert_eq!(value, serde_json::json!("a@b.c"));

    driver.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_run_flow_persists_healed_selectors() -> anyhow::Result<()> {
    let server = TestServer::start().await;
    server.wait_ready().await?;
    let driver = create_headless_driver().await?;
    let provider = embedding_client(&server);

    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("signup.json");
    signup_flow(&server.url()).save(&path).await?;

    let report = run_flow(&path, driver, &provider, &ExecutorOptions::default()).await?;

    assert!(report.corrected);
    let saved = TestFlow::load(&path).await?;
    assert_eq!(saved.test_steps[1].query(), Some("#email"));
    assert_eq!(saved.test_steps[2].query(), Some("text=Submit"));
    Ok(())
}
