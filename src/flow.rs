//! Test flow documents
//!
//! A flow file is a JSON document:
//!
//! ```json
//! {
//!   "base_path": "/srv/site",
//!   "test_steps": [
//!     { "action": "goto", "target": "index.html" },
//!     { "action": "click", "query": "#submit", "fallback": "submit button" },
//!     { "action": "fill", "query": "#email", "value": "a@b.c", "fallback": "email field" }
//!   ]
//! }
//! ```

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// One scripted interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TestStep {
    Goto {
        target: String,
    },
    Click {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
    },
    Fill {
        query: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
    },
}

impl TestStep {
    pub fn action(&self) -> StepAction {
        match self {
            TestStep::Goto { .. } => StepAction::Goto,
            TestStep::Click { .. } => StepAction::Click,
            TestStep::Fill { .. } => StepAction::Fill,
        }
    }

    /// Typed fields of the step other than `action`; `None` means absent
    fn fields(&self) -> Vec<(&'static str, Option<&str>)> {
        match self {
            TestStep::Goto { target } => vec![("target", Some(target.as_str()))],
            TestStep::Click { query, fallback } => {
                vec![("query", Some(query.as_str())), ("fallback", fallback.as_deref())]
            }
            TestStep::Fill {
                query,
                value,
                fallback,
            } => vec![
                ("query", Some(query.as_str())),
                ("value", Some(value.as_str())),
                ("fallback", fallback.as_deref()),
            ],
        }
    }

    /// Literal selector of a `click`/`fill` step
    pub fn query(&self) -> Option<&str> {
        match self {
            TestStep::Goto { .. } => None,
            TestStep::Click { query, .. } | TestStep::Fill { query, .. } => Some(query),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Goto,
    Click,
    Fill,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepAction::Goto => "goto",
            StepAction::Click => "click",
            StepAction::Fill => "fill",
        })
    }
}

/// A flow file: navigation root plus ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestFlow {
    /// Directory that relative `goto` targets resolve against
    pub base_path: String,

    pub test_steps: Vec<TestStep>,

    /// Document this flow was parsed from. Saving patches the typed fields
    /// back into it, so unknown keys and key order survive a write-back.
    #[serde(skip)]
    source: Option<Value>,
}

impl TestFlow {
    pub fn new(base_path: impl Into<String>, test_steps: Vec<TestStep>) -> Self {
        Self {
            base_path: base_path.into(),
            test_steps,
            source: None,
        }
    }

    /// Parse a flow document, keeping the raw document for write-back
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let document: Value = serde_json::from_str(json)?;
        let mut flow: TestFlow = serde_json::from_value(document.clone())?;
        flow.source = Some(document);
        Ok(flow)
    }

    /// Load a flow from a JSON file
    pub async fn load(path: &Path) -> Result<Self, FlowError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FlowError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content).map_err(|source| FlowError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pretty-printed JSON with a trailing newline.
    ///
    /// A loaded flow is written as its original document with the typed
    /// fields patched in; a flow built in code is serialized directly.
    pub fn to_json(&self) -> Result<String, FlowError> {
        let document = match self.patched_source() {
            Some(document) => document,
            None => serde_json::to_value(self)?,
        };
        let mut json = serde_json::to_string_pretty(&document)?;
        json.push('\n');
        Ok(json)
    }

    /// The source document with `base_path` and every step's fields
    /// overwritten from `self`. `None` when the step list no longer lines up
    /// with the document (steps added, removed or changed action).
    fn patched_source(&self) -> Option<Value> {
        let mut document = self.source.clone()?;
        let root = document.as_object_mut()?;
        root.insert("base_path".to_string(), Value::from(self.base_path.as_str()));

        let raw_steps = root.get_mut("test_steps")?.as_array_mut()?;
        if raw_steps.len() != self.test_steps.len() {
            return None;
        }
        for (raw, step) in raw_steps.iter_mut().zip(&self.test_steps) {
            let fields = raw.as_object_mut()?;
            let action = step.action().to_string();
            if fields.get("action").and_then(Value::as_str) != Some(action.as_str()) {
                return None;
            }
            for (key, value) in step.fields() {
                match value {
                    Some(value) => {
                        fields.insert(key.to_string(), Value::from(value));
                    }
                    None => {
                        fields.shift_remove(key);
                    }
                }
            }
        }
        Some(document)
    }

    /// Replace the file at `path` with this flow.
    ///
    /// Writes a sibling temporary file and renames it over `path`, so a
    /// failed write never leaves a truncated flow behind.
    pub async fn save(&self, path: &Path) -> Result<(), FlowError> {
        let json = self.to_json()?;
        let tmp = temp_path(path);
        let io_err = |source| FlowError::Io {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        if let Err(source) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(source));
        }
        Ok(())
    }

    /// Absolute URL for a `goto` target.
    pub fn resolve_target(&self, target: &str) -> String {
        resolve_target(&self.base_path, target)
    }
}

/// Write `flow` back to `path` when the run corrected at least one selector.
///
/// Returns whether a write happened. Runs without corrections leave the file
/// untouched.
pub async fn persist_corrections(
    flow: &TestFlow,
    corrected: bool,
    path: &Path,
) -> Result<bool, FlowError> {
    if !corrected {
        log::debug!("No selectors corrected; {} left untouched", path.display());
        return Ok(false);
    }

    flow.save(path).await?;
    log::info!("Saved corrected selectors to {}", path.display());
    Ok(true)
}

/// `http(s)://` targets pass through; anything else is a file under
/// `base_path`, returned as a `file://` URL.
pub fn resolve_target(base_path: &str, target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        return target.to_string();
    }

    let joined = Path::new(base_path).join(target);
    let absolute = if joined.is_absolute() {
        joined
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&joined))
            .unwrap_or(joined)
    };

    match url::Url::from_file_path(&absolute) {
        Ok(url) => url.to_string(),
        Err(()) => format!(
            "file:///{}",
            absolute
                .to_string_lossy()
                .replace('\\', "/")
                .trim_start_matches('/')
        ),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOW_JSON: &str = r##"{
        "base_path": "/srv/site",
        "test_steps": [
            { "action": "goto", "target": "index.html" },
            { "action": "click", "query": "#missing-id", "fallback": "submit button" },
            { "action": "fill", "query": "#email", "value": "a@b.c" }
        ],
        "name": "signup"
    }"##;

    #[test]
    fn test_parse_flow() {
        let flow = TestFlow::from_json(FLOW_JSON).unwrap();
        assert_eq!(flow.base_path, "/srv/site");
        assert_eq!(flow.test_steps.len(), 3);
        assert_eq!(
            flow.test_steps[1],
            TestStep::Click {
                query: "#missing-id".to_string(),
                fallback: Some("submit button".to_string()),
            }
        );
        assert_eq!(flow.test_steps[2].action(), StepAction::Fill);
        assert_eq!(flow.test_steps[2].query(), Some("#email"));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let json = r##"{"base_path": ".", "test_steps": [{"action": "hover", "query": "#x"}]}"##;
        assert!(TestFlow::from_json(json).is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let flow = TestFlow::new(
            "/srv/site",
            vec![
                TestStep::Goto {
                    target: "index.html".into(),
                },
                TestStep::Fill {
                    query: "#email".into(),
                    value: "a@b.c".into(),
                    fallback: None,
                },
            ],
        );
        let value: Value = serde_json::from_str(&flow.to_json().unwrap()).unwrap();
        assert_eq!(value["test_steps"][0]["action"], "goto");
        assert_eq!(value["test_steps"][1]["value"], "a@b.c");
        // absent fallback stays absent
        assert!(value["test_steps"][1].get("fallback").is_none());
    }

    #[test]
    fn test_to_json_is_pretty() {
        let flow = TestFlow::new(".", vec![TestStep::Goto { target: "a.html".into() }]);
        let json = flow.to_json().unwrap();
        assert!(json.contains("\n  \"base_path\": \".\""));
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn test_write_back_only_changes_query() {
        let json = r##"{"name": "signup", "base_path": "/srv/site", "test_steps": [
            {"note": "entry", "action": "goto", "target": "index.html"},
            {"fallback": "submit button", "action": "click", "query": "#gone", "retries": 2}
        ]}"##;
        let mut flow = TestFlow::from_json(json).unwrap();
        if let TestStep::Click { query, .. } = &mut flow.test_steps[1] {
            *query = "text=Submit".to_string();
        }

        let expected = r##"{
  "name": "signup",
  "base_path": "/srv/site",
  "test_steps": [
    {
      "note": "entry",
      "action": "goto",
      "target": "index.html"
    },
    {
      "fallback": "submit button",
      "action": "click",
      "query": "text=Submit",
      "retries": 2
    }
  ]
}
"##;
        assert_eq!(flow.to_json().unwrap(), expected);
    }

    #[test]
    fn test_write_back_after_steps_changed() {
        let json = r#"{"base_path": ".", "test_steps": [{"action": "goto", "target": "a.html"}]}"#;
        let mut flow = TestFlow::from_json(json).unwrap();
        flow.test_steps.push(TestStep::Click {
            query: "#next".into(),
            fallback: None,
        });

        let saved = TestFlow::from_json(&flow.to_json().unwrap()).unwrap();
        assert_eq!(saved.test_steps, flow.test_steps);
    }

    #[test]
    fn test_resolve_http_passthrough() {
        assert_eq!(
            resolve_target("/srv", "https://example.com/a"),
            "https://example.com/a"
        );
        assert_eq!(resolve_target("/srv", "http://localhost:8080"), "http://localhost:8080");
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_local_file() {
        assert_eq!(
            resolve_target("/srv/site", "index.html"),
            "file:///srv/site/index.html"
        );
        assert_eq!(
            resolve_target("/srv/site", "my page.html"),
            "file:///srv/site/my%20page.html"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_relative_base_is_absolute() {
        let url = resolve_target("site", "index.html");
        assert!(url.starts_with("file:///"));
        assert!(url.ends_with("/site/index.html"));
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/tmp/flow.json")),
            PathBuf::from("/tmp/flow.json.tmp")
        );
    }
}
