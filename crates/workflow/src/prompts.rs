//! Prompt templates: files on disk, registered strings, or inline text.
//!
//! A prompt reference is resolved in order:
//!
//! 1. `<prompts_dir>/<name>.md`, then `<prompts_dir>/<name>.txt`
//! 2. a template registered in memory under `<name>`
//! 3. the reference itself, as inline text
//!
//! Only references that look like a plain name (letters, digits, `-`, `_`)
//! are looked up on disk.

use cadence_core::context::ContextMap;
use cadence_core::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const EXTENSIONS: [&str; 2] = ["md", "txt"];

/// Resolves and renders prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptsManager {
    dir: Option<PathBuf>,
    templates: HashMap<String, String>,
}

impl PromptsManager {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            templates: HashMap::new(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Register an in-memory template.
    pub fn register(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    /// Resolve a reference to template text.
    pub fn resolve(&self, reference: &str) -> Result<String> {
        if is_template_name(reference) {
            if let Some(dir) = &self.dir {
                for ext in EXTENSIONS {
                    let path = dir.join(format!("{reference}.{ext}"));
                    match std::fs::read_to_string(&path) {
                        Ok(text) => {
                            debug!(prompt = %reference, path = %path.display(), "Loaded prompt file");
                            return Ok(text);
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                        Err(e) => {
                            return Err(Error::Config {
                                message: format!("Failed to read prompt {}: {e}", path.display()),
                            });
                        }
                    }
                }
            }

            if let Some(template) = self.templates.get(reference) {
                return Ok(template.clone());
            }
        }

        Ok(reference.to_string())
    }

    /// Resolve a reference and substitute `{{key}}` placeholders from `vars`.
    pub fn load_and_render(&self, reference: &str, vars: &ContextMap) -> Result<String> {
        Ok(render(&self.resolve(reference)?, vars))
    }
}

fn is_template_name(reference: &str) -> bool {
    !reference.is_empty()
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Substitute `{{key}}` (or `{{ a.b }}` for nested objects) with values from
/// `vars`. Strings are inserted verbatim, anything else as compact JSON.
/// Unknown placeholders are left untouched.
pub fn render(template: &str, vars: &ContextMap) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = after[..end].trim();
        match lookup(vars, key) {
            Some(serde_json::Value::String(s)) => out.push_str(s),
            Some(value) => out.push_str(&value.to_string()),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn lookup<'a>(vars: &'a ContextMap, path: &str) -> Option<&'a serde_json::Value> {
    let mut parts = path.split('.');
    let mut current = vars.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> ContextMap {
        json!({
            "athlete": "Sam",
            "metrics": {"ftp": 260},
            "weeks": 4
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn renders_strings_numbers_and_objects() {
        let out = render("Hi {{athlete}}, {{ weeks }} weeks. {{metrics}}", &vars());
        assert_eq!(out, "Hi Sam, 4 weeks. {\"ftp\":260}");
    }

    #[test]
    fn renders_nested_paths() {
        assert_eq!(render("FTP={{metrics.ftp}}", &vars()), "FTP=260");
    }

    #[test]
    fn leaves_unknown_and_unterminated_placeholders() {
        assert_eq!(render("{{missing}} and {{open", &vars()), "{{missing}} and {{open");
    }

    #[test]
    fn file_wins_over_registered_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "From file: {{athlete}}").unwrap();

        let mut prompts = PromptsManager::new(Some(dir.path().to_path_buf()));
        prompts.register("plan", "From memory");
        prompts.register("review", "Review for {{athlete}}");

        assert_eq!(
            prompts.load_and_render("plan", &vars()).unwrap(),
            "From file: Sam"
        );
        assert_eq!(
            prompts.load_and_render("review", &vars()).unwrap(),
            "Review for Sam"
        );
    }

    #[test]
    fn txt_extension_is_used_when_md_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("summary.txt"), "plain").unwrap();
        let prompts = PromptsManager::new(Some(dir.path().to_path_buf()));
        assert_eq!(prompts.resolve("summary").unwrap(), "plain");
    }

    #[test]
    fn unresolved_reference_is_inline_text() {
        let prompts = PromptsManager::default();
        assert_eq!(
            prompts.resolve("You are a coach for {{athlete}}.").unwrap(),
            "You are a coach for {{athlete}}."
        );
        assert_eq!(prompts.resolve("unknown_name").unwrap(), "unknown_name");
    }

    #[test]
    fn path_like_references_never_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let prompts = PromptsManager::new(Some(dir.path().to_path_buf()));
        assert_eq!(prompts.resolve("../secret").unwrap(), "../secret");
    }
}
