//! Extraction prompt rendering.
//!
//! The policy text is opaque data. Rendering substitutes the three reference
//! lists into their placeholders and touches nothing else, so braces in the
//! expected-output section pass through unchanged.

use std::path::Path;

use tracing::{info, warn};

use sismica_core::{Error, Result};

use crate::reference::ReferenceLists;

/// Built-in extraction policy.
pub const DEFAULT_TEMPLATE: &str = include_str!("../prompts/extraction_policy.txt");

pub const CONTRACTORS_PLACEHOLDER: &str = "{contratistas_list}";
pub const OPERATORS_PLACEHOLDER: &str = "{operadoras_list}";
pub const PROCESSING_TYPES_PLACEHOLDER: &str = "{tipos_procesamiento_list}";

const PLACEHOLDERS: [&str; 3] = [
    CONTRACTORS_PLACEHOLDER,
    OPERATORS_PLACEHOLDER,
    PROCESSING_TYPES_PLACEHOLDER,
];

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Load a replacement template. Missing placeholders are logged, not
    /// rejected.
    pub fn from_file(path: &Path) -> Result<Self> {
        let template = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read prompt template {}: {}", path.display(), e))
        })?;
        for placeholder in PLACEHOLDERS.iter().filter(|p| !template.contains(*p)) {
            warn!(
                subsystem = "inference",
                component = "prompt",
                path = %path.display(),
                placeholder,
                "Prompt template has no placeholder for this list"
            );
        }
        info!(
            subsystem = "inference",
            component = "prompt",
            path = %path.display(),
            prompt_len = template.len(),
            "Loaded prompt template"
        );
        Ok(Self::new(template))
    }

    /// Built-in template unless `path` names an override.
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the policy with the three lists. Deterministic and infallible.
    ///
    /// Single left-to-right pass: inserted literals are never rescanned, so
    /// an entry that happens to contain placeholder text stays verbatim.
    pub fn render(&self, lists: &ReferenceLists) -> String {
        let literals = [
            lists.contractors.to_sequence_literal(),
            lists.operators.to_sequence_literal(),
            lists.processing_types.to_sequence_literal(),
        ];
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        loop {
            let next = PLACEHOLDERS
                .iter()
                .zip(literals.iter())
                .filter_map(|(p, lit)| rest.find(p).map(|at| (at, p.len(), lit)))
                .min_by_key(|(at, _, _)| *at);
            match next {
                Some((at, len, literal)) => {
                    out.push_str(&rest[..at]);
                    out.push_str(literal);
                    rest = &rest[at + len..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceList;

    fn lists() -> ReferenceLists {
        ReferenceLists {
            contractors: ReferenceList::from_values(["CGG", "Western Geco"]),
            operators: ReferenceList::from_values(["PEMEX"]),
            processing_types: ReferenceList::from_values(["PSTM", "Migración {final}"]),
        }
    }

    #[test]
    fn test_default_template_has_all_placeholders() {
        for placeholder in PLACEHOLDERS {
            assert!(DEFAULT_TEMPLATE.contains(placeholder), "{}", placeholder);
        }
    }

    #[test]
    fn test_render_includes_every_entry_verbatim() {
        let prompt = PromptBuilder::default().render(&lists());
        for entry in ["CGG", "Western Geco", "PEMEX", "PSTM", "Migración {final}"] {
            assert!(prompt.contains(entry), "missing {}", entry);
        }
        assert!(prompt.contains("['CGG', 'Western Geco']"));
        for placeholder in PLACEHOLDERS {
            assert!(!prompt.contains(placeholder));
        }
    }

    #[test]
    fn test_render_does_not_rescan_inserted_entries() {
        let lists = ReferenceLists {
            contractors: ReferenceList::from_values(["Geo {operadoras_list} SA"]),
            operators: ReferenceList::from_values(["PEMEX {tipos_procesamiento_list}"]),
            processing_types: ReferenceList::from_values(["PSTM"]),
        };
        let prompt = PromptBuilder::new(
            "C={contratistas_list} O={operadoras_list} T={tipos_procesamiento_list}",
        )
        .render(&lists);
        assert_eq!(
            prompt,
            "C=['Geo {operadoras_list} SA'] O=['PEMEX {tipos_procesamiento_list}'] T=['PSTM']"
        );
    }

    #[test]
    fn test_render_repeated_placeholder() {
        let prompt = PromptBuilder::new("{operadoras_list}/{operadoras_list}").render(&lists());
        assert_eq!(prompt, "['PEMEX']/['PEMEX']");
    }

    #[test]
    fn test_render_empty_lists() {
        let prompt = PromptBuilder::new(
            "a {contratistas_list} b {operadoras_list} c {tipos_procesamiento_list}",
        )
        .render(&ReferenceLists::default());
        assert_eq!(prompt, "a [] b [] c []");
    }

    #[test]
    fn test_render_keeps_output_braces() {
        let prompt = PromptBuilder::default().render(&lists());
        assert!(prompt.contains("\"nombre_de_linea\": null"));
        assert!(prompt.trim_end().ends_with('}'));
        assert_eq!(prompt, PromptBuilder::default().render(&lists()));
    }

    #[test]
    fn test_from_file_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("policy.txt");
        std::fs::write(&path, "Solo {operadoras_list}").unwrap();
        let builder = PromptBuilder::from_optional_file(Some(&path)).unwrap();
        assert_eq!(builder.render(&lists()), "Solo ['PEMEX']");

        let missing = dir.path().join("nope.txt");
        assert!(matches!(
            PromptBuilder::from_file(&missing),
            Err(Error::Config(_))
        ));
    }
}
