use serde::{Deserialize, Serialize};

/// Platform a module is resolved and measured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Node,
    Browser,
}

impl Target {
    /// Stable tag used in cache-key hashing. Changing a tag invalidates
    /// every previously persisted entry for that target.
    pub fn tag(&self) -> &'static str {
        match self {
            Target::Node => "node",
            Target::Browser => "browser",
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::Browser
    }
}

/// What an import statement pulls in from a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportMembers {
    /// `import * as foo from "x"` or a dynamic `import("x")`
    AllNamespace,
    /// `import foo from "x"`
    DefaultOnly,
    /// `import { a, b } from "x"`, in source order
    NamedList(Vec<String>),
}

impl ImportMembers {
    /// Tag appended to the hash input for the non-list variants.
    pub(crate) fn tag(&self) -> Option<&'static str> {
        match self {
            ImportMembers::AllNamespace => Some("all"),
            ImportMembers::DefaultOnly => Some("default"),
            ImportMembers::NamedList(_) => None,
        }
    }
}

/// Zero-based source span of one import statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRange {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

/// One import statement or dynamic import expression extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDescriptor {
    /// Module specifier as written in source, e.g. `react` or `lodash/merge`.
    pub name: String,
    pub members: ImportMembers,
    pub range: SourceRange,
}

impl ImportDescriptor {
    /// Relative imports are local files, not packages, and are never measured.
    pub fn is_relative(&self) -> bool {
        self.name.starts_with('.')
    }
}
