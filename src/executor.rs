//! Step executor
//!
//! Replays a [`TestFlow`] step by step. Literal selectors are authoritative;
//! the semantic index of the current page is consulted only when a literal
//! selector fails and the step carries a fallback description. A fallback
//! selector that works is written into the step in place and the run report
//! is marked `corrected`.

use crate::context::PageContext;
use crate::driver::PageDriver;
use crate::embedding::EmbeddingProvider;
use crate::error::{BrowserError, FallbackUnavailableReason, StepError};
use crate::flow::{resolve_target, TestFlow, TestStep};
use crate::report::{RunReport, StepResult, StepStatus};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Fallback candidates tried per failed step, in distance order.
    /// Values below 1 are treated as 1.
    pub fallback_candidates: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            fallback_candidates: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy)]
enum ElementAction<'v> {
    Click,
    Fill(&'v str),
}

impl fmt::Display for ElementAction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementAction::Click => f.write_str("click"),
            ElementAction::Fill(_) => f.write_str("fill"),
        }
    }
}

enum StepOutcome {
    Passed,
    Healed(String),
    Failed(StepError),
}

pub struct FlowExecutor<'a, D, P: ?Sized> {
    driver: &'a D,
    provider: &'a P,
    options: ExecutorOptions,
    state: RunState,
    context: Option<PageContext>,
}

impl<'a, D, P> FlowExecutor<'a, D, P>
where
    D: PageDriver,
    P: EmbeddingProvider + ?Sized,
{
    pub fn new(driver: &'a D, provider: &'a P, options: ExecutorOptions) -> Self {
        Self {
            driver,
            provider,
            options,
            state: RunState::Idle,
            context: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Context of the page the last `goto` landed on
    pub fn page_context(&self) -> Option<&PageContext> {
        self.context.as_ref()
    }

    /// Run every step of `flow` in order.
    ///
    /// Step failures are recorded in the report and never stop the run.
    /// Healed steps have their `query` rewritten in `flow`.
    pub async fn run(&mut self, flow: &mut TestFlow) -> RunReport {
        self.state = RunState::Running;
        self.context = None;

        log::info!("========== UI Test Started ==========");
        let mut report = RunReport::new(flow.test_steps.len());
        let base_path = &flow.base_path;

        for (i, step) in flow.test_steps.iter_mut().enumerate() {
            let number = i + 1;
            let action = step.action();
            log::info!(
                "--- Step {}: {} ---",
                number,
                action.to_string().to_uppercase()
            );

            let start = Instant::now();
            let (target, outcome) = self.execute_step(base_path, step).await;

            let (status, healed_selector, error) = match outcome {
                StepOutcome::Passed => (StepStatus::Passed, None, None),
                StepOutcome::Healed(selector) => (StepStatus::Healed, Some(selector), None),
                StepOutcome::Failed(e) => {
                    log::error!("Step {} unresolved: {}", number, e);
                    (StepStatus::Failed, None, Some(e.to_string()))
                }
            };

            report.add_result(StepResult {
                step: number,
                action,
                status,
                duration: start.elapsed(),
                target,
                healed_selector,
                error,
            });
        }

        log::info!("========== UI Test Completed ==========");
        log::info!(
            "{} steps: {} passed, {} healed, {} failed",
            report.total_steps,
            report.passed,
            report.healed,
            report.failed
        );

        self.state = RunState::Completed;
        report
    }

    async fn execute_step(&mut self, base_path: &str, step: &mut TestStep) -> (String, StepOutcome) {
        match step {
            TestStep::Goto { target } => {
                let url = resolve_target(base_path, target);
                log::info!("Navigating to: {}", url);

                let outcome = match self.driver.navigate(&url).await {
                    Ok(()) => {
                        log::info!("Navigation successful.");
                        StepOutcome::Passed
                    }
                    Err(source) => {
                        log::error!("Navigation failed: {}", source);
                        StepOutcome::Failed(StepError::Navigation {
                            url: url.clone(),
                            source,
                        })
                    }
                };

                // Whatever the DOM ended up as, it is the page later steps act on
                self.context = Some(PageContext::build(self.driver, self.provider).await);
                (url, outcome)
            }
            TestStep::Click { query, fallback } => {
                log::info!("Clicking element: {}", query);
                let target = query.clone();
                let outcome = self
                    .interact(ElementAction::Click, query, fallback.as_deref())
                    .await;
                (target, outcome)
            }
            TestStep::Fill {
                query,
                value,
                fallback,
            } => {
                log::info!("Filling element: {} with value: {}", query, value);
                let target = query.clone();
                let outcome = self
                    .interact(ElementAction::Fill(value), query, fallback.as_deref())
                    .await;
                (target, outcome)
            }
        }
    }

    async fn interact(
        &self,
        action: ElementAction<'_>,
        query: &mut String,
        fallback: Option<&str>,
    ) -> StepOutcome {
        let source = match self.perform(action, query).await {
            Ok(()) => {
                log::info!("{} successful.", capitalize(&action.to_string()));
                return StepOutcome::Passed;
            }
            Err(source) => source,
        };

        log::warn!(
            "{}. Trying fallback...",
            StepError::SelectorResolution {
                selector: query.clone(),
                source,
            }
        );

        let unavailable = |reason| {
            StepOutcome::Failed(StepError::FallbackUnavailable {
                selector: query.clone(),
                reason,
            })
        };
        let Some(fallback) = fallback else {
            return unavailable(FallbackUnavailableReason::NoFallback);
        };
        let Some(index) = self.context.as_ref().and_then(PageContext::index) else {
            return unavailable(FallbackUnavailableReason::NoIndex);
        };

        let k = self.options.fallback_candidates.max(1);
        let candidates = match index.query(fallback, k, self.provider).await {
            Ok(candidates) => candidates,
            Err(e) => return StepOutcome::Failed(StepError::EmbeddingService(e)),
        };
        if candidates.is_empty() {
            return unavailable(FallbackUnavailableReason::NoCandidates);
        }

        let mut last_failure = None;
        for candidate in candidates {
            log::info!(
                "Using fallback selector: {} ({})",
                candidate.selector,
                candidate.description
            );
            match self.perform(action, &candidate.selector).await {
                Ok(()) => {
                    log::info!("Fallback {} successful.", action);
                    *query = candidate.selector.clone();
                    return StepOutcome::Healed(candidate.selector.clone());
                }
                Err(source) => {
                    log::error!("Fallback {} failed: {}", action, source);
                    last_failure = Some(StepError::FallbackAction {
                        selector: candidate.selector.clone(),
                        source,
                    });
                }
            }
        }

        StepOutcome::Failed(last_failure.unwrap_or_else(|| StepError::FallbackUnavailable {
            selector: query.clone(),
            reason: FallbackUnavailableReason::NoCandidates,
        }))
    }

    async fn perform(&self, action: ElementAction<'_>, selector: &str) -> Result<(), BrowserError> {
        match action {
            ElementAction::Click => self.driver.click(selector).await,
            ElementAction::Fill(value) => self.driver.fill(selector, value).await,
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
