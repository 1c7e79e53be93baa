//! Run orchestration
//!
//! Owns the browser session for the length of a run and guarantees it is
//! closed on every exit path, including a panic inside the step loop.

use crate::browser::{ChromeDriver, ConnectionMode};
use crate::driver::PageDriver;
use crate::embedding::{EmbeddingConfig, EmbeddingProvider, HttpEmbeddingClient};
use crate::executor::{ExecutorOptions, FlowExecutor};
use crate::flow::{persist_corrections, TestFlow};
use crate::report::RunReport;
use anyhow::{Context, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;

/// Everything needed to run a flow file against Chrome
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub connection: ConnectionMode,
    pub embedding: EmbeddingConfig,
    pub executor: ExecutorOptions,
}

/// Launch Chrome and run the flow at `path`, writing corrected selectors back to it.
pub async fn run_flow_file(path: &Path, options: &RunnerOptions) -> Result<RunReport> {
    let provider = HttpEmbeddingClient::new(options.embedding.clone());

    log::info!("Launching Chrome...");
    let driver = ChromeDriver::new(options.connection.clone())
        .await
        .context("Failed to start browser session")?;

    run_flow(path, driver, &provider, &options.executor).await
}

/// Run the flow at `path` with `driver`, then close `driver`.
///
/// The flow is loaded before the step loop starts and written back to `path`
/// only if a step was healed. The driver is closed after the loop whether it
/// completed, failed to persist, or panicked; a panic is re-raised once the
/// driver is closed.
pub async fn run_flow<D, P>(
    path: &Path,
    driver: D,
    provider: &P,
    options: &ExecutorOptions,
) -> Result<RunReport>
where
    D: PageDriver,
    P: EmbeddingProvider + ?Sized,
{
    let outcome = AssertUnwindSafe(async {
        let mut flow = TestFlow::load(path).await?;
        log::info!(
            "Loaded {} steps from {}",
            flow.test_steps.len(),
            path.display()
        );

        let mut executor = FlowExecutor::new(&driver, provider, options.clone());
        let report = executor.run(&mut flow).await;

        persist_corrections(&flow, report.corrected, path).await?;
        Ok::<_, anyhow::Error>(report)
    })
    .catch_unwind()
    .await;

    let closed = driver.close().await;

    match outcome {
        Err(panic) => {
            if let Err(e) = closed {
                log::error!("Failed to close browser after panic: {}", e);
            }
            std::panic::resume_unwind(panic)
        }
        Ok(Err(e)) => {
            if let Err(close_err) = closed {
                log::error!("Failed to close browser: {}", close_err);
            }
            Err(e)
        }
        Ok(Ok(report)) => {
            closed.context("Failed to close browser session")?;
            Ok(report)
        }
    }
}
