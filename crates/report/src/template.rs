//! Placeholder templates and markdown table rendering.
//!
//! A template is a named, versioned text body with `{{TOKEN}}` markers.
//! Rendering walks the body once, left to right, and substitutes each
//! marker from the provided values; replacement text is emitted verbatim
//! and never re-scanned, so tokens cannot reference each other and the
//! substitution order is immaterial.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// Literal rendered for a section with no rows.
pub const NO_DATA: &str = "No data recorded.";

/// Body of the built-in standard report template.
const STANDARD_BODY: &str = "\
# Surface Report: {{PROJECT_NAME}}

Generated on {{GENERATED_AT}}.

## Summary

{{SUMMARY_STATS}}

## Domains

{{DOMAIN_TABLE}}

## Addresses

{{IP_TABLE}}

## Exposed Services

{{SERVICE_TABLE}}

## Technology Fingerprints

{{FINGERPRINT_TABLE}}

## Defacements

{{DEFACEMENT_TABLE}}

## Phishing

{{PHISHING_TABLE}}

## Takedowns

{{TAKEDOWN_TABLE}}

## Leak Sources

{{LEAK_TABLE}}
";

#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template body could not be loaded.
    #[error("template '{name}' could not be read")]
    Unreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The body references a token the caller supplied no value for.
    #[error("template '{name}' references placeholder '{token}' with no value")]
    MissingValue { name: String, token: String },
}

/// A named, versioned placeholder template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTemplate {
    name: String,
    version: u32,
    body: String,
}

impl ReportTemplate {
    pub fn new(name: impl Into<String>, version: u32, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            body: body.into(),
        }
    }

    /// The template shipped with this crate.
    pub fn standard() -> Self {
        Self::new("surface_report", 1, STANDARD_BODY)
    }

    /// Load a template body from disk.
    pub fn from_file(
        name: impl Into<String>,
        version: u32,
        path: impl AsRef<Path>,
    ) -> Result<Self, TemplateError> {
        let name = name.into();
        let body = std::fs::read_to_string(path).map_err(|source| TemplateError::Unreadable {
            name: name.clone(),
            source,
        })?;
        Ok(Self::new(name, version, body))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The fixed set of tokens this template uses, deduplicated, in order
    /// of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        let mut rest = self.body.as_str();
        while let Some((token, tail)) = next_marker(rest) {
            if !seen.contains(&token) {
                seen.push(token);
            }
            rest = tail;
        }
        seen
    }

    /// Substitute every placeholder in one pass.
    ///
    /// Every enumerated token must have a value; a missing one is an error
    /// rather than a marker silently left in the artifact.
    pub fn render(&self, values: &HashMap<&str, String>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                // Unterminated marker; keep the tail verbatim.
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let token = &after[..end];
            match values.get(token) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(TemplateError::MissingValue {
                        name: self.name.clone(),
                        token: token.to_string(),
                    });
                }
            }
            rest = &after[end + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Find the next `{{TOKEN}}` marker; returns the token and the remaining
/// input after it.
fn next_marker(input: &str) -> Option<(&str, &str)> {
    let start = input.find("{{")?;
    let after = &input[start + 2..];
    let end = after.find("}}")?;
    Some((&after[..end], &after[end + 2..]))
}

/// Render rows as a markdown table, or the no-data marker when empty.
pub fn markdown_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return NO_DATA.to_string();
    }

    let header_row = format!("| {} |", headers.join(" | "));
    let separator_row = format!(
        "| {} |",
        headers.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
    );
    let content_rows = rows
        .iter()
        .map(|row| format!("| {} |", row.join(" | ")))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{header_row}\n{separator_row}\n{content_rows}")
}
