//! Selector dialect understood by `ChromeDriver`
//!
//! Plain strings are CSS selectors. `text=` selectors locate an element by its
//! rendered text, which is how fingerprinted elements without an id are
//! re-targeted.

/// Attribute used to tag an element found by a text selector so it can be
/// handed back to CSS-based element lookup.
pub const LOCATOR_ATTRIBUTE: &str = "data-heal-locator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector<'a> {
    Css(&'a str),
    Text { text: &'a str, exact: bool },
}

impl<'a> Selector<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        match trimmed.strip_prefix("text=") {
            Some(rest) => match strip_quotes(rest) {
                Some(inner) => Selector::Text {
                    text: inner,
                    exact: true,
                },
                None => Selector::Text {
                    text: rest.trim(),
                    exact: false,
                },
            },
            None => Selector::Css(trimmed),
        }
    }
}

fn strip_quotes(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.len() < 2 {
        return None;
    }
    ['"', '\'']
        .iter()
        .find(|q| value.starts_with(**q) && value.ends_with(**q))
        .map(|_| &value[1..value.len() - 1])
}

/// Build the script that finds the innermost element matching `text` and
/// stamps it with [`LOCATOR_ATTRIBUTE`] = `marker`. Evaluates to `true` when
/// an element was found.
///
/// Loose matching normalizes whitespace and case, and prefers an equal text
/// over a containing one.
pub fn text_locator_script(text: &str, exact: bool, marker: &str) -> String {
    let wanted = serde_json::Value::String(text.to_string()).to_string();
    let marker = serde_json::Value::String(marker.to_string()).to_string();
    let attribute = serde_json::Value::String(LOCATOR_ATTRIBUTE.to_string()).to_string();

    format!(
        r#"
        (() => {{
            const exact = {exact};
            const norm = (s) => {{
                const collapsed = (s || '').replace(/\s+/g, ' ').trim();
                return exact ? collapsed : collapsed.toLowerCase();
            }};
            const wanted = norm({wanted});
            const textOf = (el) => norm(el.innerText !== undefined ? el.innerText : el.textContent);
            const innermost = (test) => {{
                for (const el of document.querySelectorAll('body *')) {{
                    if (!test(textOf(el))) continue;
                    const child = Array.from(el.children).some((c) => test(textOf(c)));
                    if (!child) return el;
                }}
                return null;
            }};
            let found = innermost((t) => t === wanted);
            if (!found && !exact) {{
                found = innermost((t) => t.includes(wanted));
            }}
            document.querySelectorAll('[' + {attribute} + ']')
                .forEach((el) => el.removeAttribute({attribute}));
            if (!found) return false;
            found.setAttribute({attribute}, {marker});
            return true;
        }})()
        "#
    )
}

/// CSS selector for an element stamped by [`text_locator_script`].
pub fn marker_selector(marker: &str) -> String {
    format!("[{}=\"{}\"]", LOCATOR_ATTRIBUTE, marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_css() {
        assert_eq!(Selector::parse("#submit"), Selector::Css("#submit"));
        assert_eq!(
            Selector::parse("  input[name='q'] "),
            Selector::Css("input[name='q']")
        );
    }

    #[test]
    fn test_parse_loose_text() {
        assert_eq!(
            Selector::parse("text=Submit"),
            Selector::Text {
                text: "Submit",
                exact: false
            }
        );
    }

    #[test]
    fn test_parse_quoted_text_is_exact() {
        assert_eq!(
            Selector::parse("text=\"Log in\""),
            Selector::Text {
                text: "Log in",
                exact: true
            }
        );
        assert_eq!(
            Selector::parse("text='Log in'"),
            Selector::Text {
                text: "Log in",
                exact: true
            }
        );
    }

    #[test]
    fn test_single_quote_char_is_loose_text() {
        assert_eq!(
            Selector::parse("text='"),
            Selector::Text {
                text: "'",
                exact: false
            }
        );
    }

    #[test]
    fn test_locator_script_escapes_text() {
        let script = text_locator_script("Say \"hi\"", false, "m-1");
        assert!(script.contains(r#""Say \"hi\"""#));
        assert!(script.contains(r#""m-1""#));
        assert!(script.contains("const exact = false;"));
    }

    #[test]
    fn test_marker_selector() {
        assert_eq!(marker_selector("m-7"), "[data-heal-locator=\"m-7\"]");
    }
}
