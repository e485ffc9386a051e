//! Prompt Library for upstream model calls
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tally/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Each prompt file has YAML frontmatter followed by a `# System` section
//! (sent as the system instruction) and a `# User` section (the user turn).

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const CLASSIFY_TRANSACTION: &str =
        include_str!("../../../prompts/classify_transaction.md");
    pub const ANALYZE_INSIGHTS: &str = include_str!("../../../prompts/analyze_insights.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Category, merchant, and transaction flag for one message
    ClassifyTransaction,
    /// Narrative and suggestions for up to three monthly summaries
    AnalyzeInsights,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassifyTransaction => "classify_transaction",
            Self::AnalyzeInsights => "analyze_insights",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[Self::ClassifyTransaction, Self::AnalyzeInsights]
    }

    /// Variables the caller supplies when rendering this prompt
    pub fn supplied_variables(&self) -> &'static [&'static str] {
        match self {
            Self::ClassifyTransaction => &["categories", "fallback", "description"],
            Self::AnalyzeInsights => &["months_json", "month_count"],
        }
    }

    /// Get the default embedded content for this prompt
    fn default_content(&self) -> &'static str {
        match self {
            Self::ClassifyTransaction => defaults::CLASSIFY_TRANSACTION,
            Self::AnalyzeInsights => defaults::ANALYZE_INSIGHTS,
        }
    }
}

impl std::str::FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PromptId::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("Unknown prompt ID: {}", s))
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Name of the output schema the prompt is written against
    pub schema: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Metadata from frontmatter
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    /// Path to override file (if any)
    pub override_path: Option<PathBuf>,
}

/// System instruction and user turn ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Get the system section of the prompt
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    /// Get the user section of the prompt
    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Placeholder names used in the template, in first-seen order
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut rest = self.content.as_str();
        while let Some(start) = rest.find("{{") {
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                break;
            };
            let name = after_open[..end].trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            rest = &after_open[end + 2..];
        }
        names
    }

    /// Render both sections with template variables replaced
    ///
    /// A prompt without a `# User` section is invalid: the user turn is
    /// where the request data goes.
    pub fn render(&self, vars: &HashMap<&str, &str>) -> Result<RenderedPrompt> {
        let user = self.user_section().ok_or_else(|| {
            Error::Config(format!(
                "Prompt {} has no '# User' section",
                self.metadata.id
            ))
        })?;
        let system = self.system_section().unwrap_or_default();

        Ok(RenderedPrompt {
            system: substitute(system, vars),
            user: substitute(user, vars),
        })
    }
}

/// Mustache-style replacement: {{var}}
///
/// One left-to-right pass over the template. Inserted values are copied
/// verbatim and never scanned again, and unknown placeholders are kept as-is.
fn substitute(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            result.push_str(&rest[start..]);
            return result;
        };

        match vars.get(after_open[..end].trim()) {
            Some(value) => result.push_str(value),
            None => result.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    result.push_str(rest);
    result
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    /// Override directory path
    override_dir: Option<PathBuf>,
    /// Cached parsed prompts
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::Config(format!("Prompt {} not cached", id.as_str())))
    }

    /// Fetch and render a prompt in one step
    pub fn render(&mut self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<RenderedPrompt> {
        self.get(id)?.render(vars)
    }

    /// Load a prompt (checking override first, then default)
    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::Config(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                    override_path: Some(override_path),
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    /// List all prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let has_override = self.has_override(id);
                let override_path = if has_override {
                    self.override_dir
                        .as_ref()
                        .map(|d| d.join(format!("{}.md", id.as_str())))
                } else {
                    None
                };
                let prompt = self.get(id).ok();
                PromptInfo {
                    id: id.as_str().to_string(),
                    version: prompt.map(|p| p.metadata.version).unwrap_or(0),
                    schema: prompt.map(|p| p.metadata.schema.clone()).unwrap_or_default(),
                    variables: prompt.map(Prompt::variables).unwrap_or_default(),
                    has_override,
                    override_path,
                }
            })
            .collect()
    }

    /// Check if a prompt has an override file
    pub fn has_override(&self, id: PromptId) -> bool {
        match self.override_dir {
            Some(ref dir) => dir.join(format!("{}.md", id.as_str())).exists(),
            None => false,
        }
    }

    /// Get the override directory path
    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Clear the cache (useful after editing override files)
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    /// Prompt identifier
    pub id: String,
    /// Version from metadata
    pub version: u32,
    /// Output schema name
    pub schema: String,
    /// Placeholders the template uses
    pub variables: Vec<String>,
    /// Whether an override exists
    pub has_override: bool,
    /// Path to override file (if exists)
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let rest = content.strip_prefix("---").ok_or_else(|| {
        Error::Config("Prompt must start with YAML frontmatter (---)".into())
    })?;

    let end = rest.find("---").ok_or_else(|| {
        Error::Config("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::Config(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Runs until the next top-level header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 1
schema: category_result
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 1);
        assert_eq!(metadata.schema, "category_result");
        assert!(body.contains("# System"));
        assert!(body.contains("# User"));
    }

    #[test]
    fn test_parse_prompt_without_frontmatter() {
        assert!(parse_prompt("# User\nhello").is_err());
        assert!(parse_prompt("---\nid: x\n# User\nhello").is_err());
    }

    #[test]
    fn test_extract_section() {
        let content = r#"# System
System content here.

# User
User content here."#;

        assert_eq!(
            extract_section(content, "# System"),
            Some("System content here.")
        );
        assert_eq!(
            extract_section(content, "# User"),
            Some("User content here.")
        );
    }

    #[test]
    fn test_render_substitutes_both_sections() {
        let prompt = Prompt {
            metadata: PromptMetadata {
                id: "test".into(),
                version: 1,
                schema: "category_result".into(),
            },
            content: "# System\nPick one of {{categories}}.\n\n# User\n{{description}}".into(),
            is_override: false,
            override_path: None,
        };

        let mut vars = HashMap::new();
        vars.insert("categories", "[\"Food\"]");
        vars.insert("description", "Rs.99 at Swiggy");

        let rendered = prompt.render(&vars).unwrap();
        assert_eq!(rendered.system, "Pick one of [\"Food\"].");
        assert_eq!(rendered.user, "Rs.99 at Swiggy");
    }

    #[test]
    fn test_substitute_does_not_rescan_values() {
        let mut vars = HashMap::new();
        vars.insert("fallback", "Miscellaneous");
        vars.insert("categories", "[\"Food\"]");
        vars.insert("description", "ref {{fallback}} {{categories}}");

        let template = "Use {{fallback}} from {{categories}}.\n{{description}}";
        for _ in 0..50 {
            assert_eq!(
                substitute(template, &vars),
                "Use Miscellaneous from [\"Food\"].\nref {{fallback}} {{categories}}"
            );
        }
    }

    #[test]
    fn test_default_prompts_use_supplied_variables() {
        let mut lib = PromptLibrary::embedded_only();
        for id in PromptId::all() {
            let mut used = lib.get(*id).unwrap().variables();
            let mut supplied: Vec<String> =
                id.supplied_variables().iter().map(|v| v.to_string()).collect();
            used.sort();
            supplied.sort();
            assert_eq!(used, supplied, "variables for {}", id.as_str());
        }
    }

    #[test]
    fn test_substitute_keeps_unknown_and_unclosed() {
        let mut vars = HashMap::new();
        vars.insert("known", "x");

        assert_eq!(substitute("{{known}} {{other}}", &vars), "x {{other}}");
        assert_eq!(substitute("{{ known }}!", &vars), "x!");
        assert_eq!(substitute("tail {{known", &vars), "tail {{known");
        assert_eq!(substitute("no vars", &vars), "no vars");
    }

    #[test]
    fn test_render_requires_user_section() {
        let prompt = Prompt {
            metadata: PromptMetadata {
                id: "broken".into(),
                version: 1,
                schema: "insight_result".into(),
            },
            content: "# System\nOnly a system section.".into(),
            is_override: false,
            override_path: None,
        };
        assert!(matches!(
            prompt.render(&HashMap::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_prompt_library_embedded() {
        let mut lib = PromptLibrary::embedded_only();

        for id in PromptId::all() {
            let prompt = lib.get(*id).unwrap();
            assert!(!prompt.is_override);
            assert!(prompt.override_path.is_none());
            assert!(prompt.user_section().is_some());
            assert!(prompt.system_section().is_some());
        }
    }

    #[test]
    fn test_prompt_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("classify_transaction.md"),
            "---\nid: classify_transaction\nversion: 9\nschema: category_result\n---\n# System\nCustom.\n# User\n{{description}}\n",
        )
        .unwrap();

        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        assert!(lib.has_override(PromptId::ClassifyTransaction));
        assert!(!lib.has_override(PromptId::AnalyzeInsights));

        let prompt = lib.get(PromptId::ClassifyTransaction).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 9);

        let infos = lib.list();
        assert_eq!(infos.len(), 2);
        assert!(infos[0].has_override);
        assert!(infos[0].override_path.is_some());
        assert!(!infos[1].has_override);
    }

    #[test]
    fn test_prompt_id_from_str() {
        assert_eq!(
            "analyze_insights".parse::<PromptId>().unwrap(),
            PromptId::AnalyzeInsights
        );
        assert!("explain_spending".parse::<PromptId>().is_err());
    }

    #[test]
    fn test_default_prompts_parse() {
        for id in PromptId::all() {
            let content = id.default_content();
            let result = parse_prompt(content);
            assert!(
                result.is_ok(),
                "Failed to parse {}: {:?}",
                id.as_str(),
                result.err()
            );

            let (metadata, _) = result.unwrap();
            assert_eq!(
                metadata.id,
                id.as_str(),
                "Prompt ID mismatch for {}",
                id.as_str()
            );
        }
    }
}
