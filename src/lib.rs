pub mod browser;
pub mod context;
pub mod driver;
pub mod embedding;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod flow;
pub mod index;
pub mod report;
pub mod runner;

//  Re-export commonly used items
pub use browser::{ChromeDriver, ConnectionMode};
pub use context::PageContext;
pub use driver::{ElementHandle, PageDriver, INTERACTIVE_TAGS};
pub use embedding::{
    Embedding, EmbeddingConfig, EmbeddingError, EmbeddingProvider, HttpEmbeddingClient,
};
pub use error::{BrowserError, FallbackUnavailableReason, FlowError, StepError};
pub use executor::{ExecutorOptions, FlowExecutor, RunState};
pub use fingerprint::{fingerprint_page, ElementAttributes, ElementDescriptor};
pub use flow::{persist_corrections, resolve_target, StepAction, TestFlow, TestStep};
pub use index::SemanticIndex;
pub use report::{RunReport, StepResult, StepStatus};
pub use runner::{run_flow, run_flow_file, RunnerOptions};
