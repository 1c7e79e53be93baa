//! Element fingerprinting
//!
//! Turns the interactive elements of the current page into
//! [`ElementDescriptor`]s: a selector that re-locates the element and a
//! deterministic textual description used as the unit of semantic search.

use crate::driver::{ElementHandle, PageDriver, INTERACTIVE_TAGS};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A re-targetable element and its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub selector: String,
    pub description: String,
}

/// Observable attributes of one element. Empty strings are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementAttributes {
    pub tag: String,
    pub text: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub input_type: Option<String>,
    pub placeholder: Option<String>,
}

impl ElementAttributes {
    /// Read tag, text and the fingerprinted attributes from a live element.
    pub async fn read<E: ElementHandle>(element: &E) -> Result<Self> {
        Ok(Self {
            tag: element.tag_name().await?.to_lowercase(),
            text: present(normalize_whitespace(&element.text().await?)),
            id: element.attribute("id").await?.and_then(present),
            name: element.attribute("name").await?.and_then(present),
            input_type: element.attribute("type").await?.and_then(present),
            placeholder: element.attribute("placeholder").await?.and_then(present),
        })
    }

    /// `<tag> with text '..', id '..', name '..', type '..', placeholder '..'`,
    /// omitting absent attributes.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            ("with text", &self.text),
            ("id", &self.id),
            ("name", &self.name),
            ("type", &self.input_type),
            ("placeholder", &self.placeholder),
        ]
        .iter()
        .filter_map(|(label, value)| value.as_deref().map(|v| format!("{} '{}'", label, v)))
        .collect();

        if parts.is_empty() {
            self.tag.clone()
        } else {
            format!("{} {}", self.tag, parts.join(", "))
        }
    }

    /// Selector priority: id, then text, then name. `None` when the element
    /// cannot be re-targeted deterministically.
    pub fn selector(&self) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(if is_css_identifier(id) {
                format!("#{}", id)
            } else {
                format!("[id='{}']", escape_quoted(id))
            });
        }
        if let Some(text) = &self.text {
            return Some(format!("text={}", text_selector_value(text)));
        }
        self.name
            .as_ref()
            .map(|name| format!("{}[name='{}']", self.tag, escape_quoted(name)))
    }

    pub fn descriptor(&self) -> Option<ElementDescriptor> {
        self.selector().map(|selector| ElementDescriptor {
            selector,
            description: self.describe(),
        })
    }
}

/// Fingerprint every interactive element on the current page, in DOM order.
///
/// A failed read on one element drops that element only. Only a failure of
/// the element query itself is returned as an error.
pub async fn fingerprint_page<D: PageDriver>(driver: &D) -> Result<Vec<ElementDescriptor>> {
    let elements = driver.query_elements(&INTERACTIVE_TAGS.join(", ")).await?;
    log::debug!("Found {} interactive elements", elements.len());

    let mut descriptors = Vec::with_capacity(elements.len());
    for (position, element) in elements.iter().enumerate() {
        let attributes = match ElementAttributes::read(element).await {
            Ok(attributes) => attributes,
            Err(e) => {
                log::warn!("Skipping element {}: {}", position, e);
                continue;
            }
        };
        match attributes.descriptor() {
            Some(descriptor) => descriptors.push(descriptor),
            None => log::debug!(
                "Dropping untargetable element {}: {}",
                position,
                attributes.describe()
            ),
        }
    }

    Ok(descriptors)
}

fn present(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_css_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    if value.starts_with("--") || (value.starts_with('-') && value.len() == 1) {
        return false;
    }
    if value.starts_with('-') && value[1..].starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Text wrapped in matching quotes would be read back as an exact match on
/// the unquoted text, so it gets an outer pair of the other quote character.
fn text_selector_value(text: &str) -> String {
    let quoted = text.len() >= 2
        && ['"', '\''].iter().any(|q| text.starts_with(*q) && text.ends_with(*q));
    if !quoted {
        text.to_string()
    } else if text.starts_with('"') {
        format!("'{}'", text)
    } else {
        format!("\"{}\"", text)
    }
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
