//! Named-parameter templates using `{{name}}` placeholders.
//!
//! Single braces are left alone so prompts can contain literal JSON.

use crate::error::TemplateError;
use std::collections::BTreeMap;

/// Renders `template`, asking `lookup` for each placeholder value.
pub fn render_with<F>(template: &str, mut lookup: F) -> Result<String, TemplateError>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or(TemplateError::Unterminated(offset + open))?;
        let name = after_open[..close].trim();
        let value = lookup(name).ok_or_else(|| TemplateError::MissingValue(name.to_string()))?;
        out.push_str(&value);

        let consumed = open + 2 + close + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Names of the placeholders in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let _ = render_with(template, |name| {
        names.push(name.to_string());
        Some(String::new())
    });
    names
}

/// A prompt template with its parameters supplied by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, params: &BTreeMap<&str, String>) -> Result<String, TemplateError> {
        render_with(&self.source, |name| params.get(name).cloned())
    }
}
