//! Mapping logical operations onto the tool names a host actually exposes.
//!
//! Hosts label equivalent operations differently (`create_branch`,
//! `github_create_branch`, `createBranch`...). Resolution runs in three
//! steps: exact match on a configured alias or the default name, then
//! keyword match preferring the shortest name, then the default name.

use serde::Deserialize;

use crate::protocol::ToolDescriptor;

/// A source-control operation the caller wants, independent of naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    CreateBranch,
    WriteFile,
    CreatePullRequest,
}

impl Intent {
    pub const ALL: [Intent; 3] = [
        Intent::CreateBranch,
        Intent::WriteFile,
        Intent::CreatePullRequest,
    ];

    /// Name used when the catalog offers nothing better.
    pub fn default_name(self) -> &'static str {
        match self {
            Intent::CreateBranch => "create_branch",
            Intent::WriteFile => "create_or_update_file",
            Intent::CreatePullRequest => "create_pull_request",
        }
    }

    /// Keyword test on a tool name.
    pub fn matches(self, name: &str) -> bool {
        let lower = name.to_lowercase();
        let has = |needle: &str| lower.contains(needle);
        match self {
            Intent::CreateBranch => has("branch") && has("create"),
            Intent::WriteFile => {
                (has("file") || has("content")) && (has("update") || has("create"))
            }
            // "pr" alone would match "protection", "prompt"...
            Intent::CreatePullRequest => {
                (has("pull") || words(name).iter().any(|w| w == "pr")) && has("create")
            }
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Intent::CreateBranch => "create branch",
            Intent::WriteFile => "write file",
            Intent::CreatePullRequest => "create pull request",
        };
        f.write_str(label)
    }
}

/// Resolves intents against a host's catalog.
///
/// The alias lists hold exact names a host is known to use; they are
/// tried before keyword matching.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntentResolver {
    #[serde(default)]
    create_branch: Vec<String>,
    #[serde(default)]
    write_file: Vec<String>,
    #[serde(default)]
    create_pull_request: Vec<String>,
}

impl IntentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, intent: Intent, name: impl Into<String>) -> Self {
        self.aliases_mut(intent).push(name.into());
        self
    }

    pub fn aliases(&self, intent: Intent) -> &[String] {
        match intent {
            Intent::CreateBranch => &self.create_branch,
            Intent::WriteFile => &self.write_file,
            Intent::CreatePullRequest => &self.create_pull_request,
        }
    }

    fn aliases_mut(&mut self, intent: Intent) -> &mut Vec<String> {
        match intent {
            Intent::CreateBranch => &mut self.create_branch,
            Intent::WriteFile => &mut self.write_file,
            Intent::CreatePullRequest => &mut self.create_pull_request,
        }
    }

    /// Pick the catalog name for `intent`, falling back to its default name.
    pub fn resolve(&self, intent: Intent, catalog: &[ToolDescriptor]) -> String {
        let exact = self
            .aliases(intent)
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(intent.default_name()))
            .find_map(|wanted| {
                catalog
                    .iter()
                    .find(|tool| tool.name.eq_ignore_ascii_case(wanted))
            });
        if let Some(tool) = exact {
            return tool.name.clone();
        }

        catalog
            .iter()
            .filter(|tool| intent.matches(&tool.name))
            .min_by_key(|tool| tool.name.len())
            .map(|tool| tool.name.clone())
            .unwrap_or_else(|| intent.default_name().to_string())
    }
}

/// Split a name into lowercase words on separators and camelCase humps.
fn words(name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}
