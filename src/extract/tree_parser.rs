use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::types::{ImportDescriptor, ImportMembers, SourceRange};
use crate::utils::ImportCostError;

/// Pulls import descriptors out of a document's text.
///
/// Pure and synchronous; callers run it off the main loop when the
/// document is large.
pub trait ImportExtractor: Send + Sync {
    fn extract(&self, text: &str, language: &str)
        -> Result<Vec<ImportDescriptor>, ImportCostError>;
}

/// Tree-sitter based import extractor for JavaScript and TypeScript
pub struct TreeSitterExtractor;

/// Static import statements plus dynamic `import("...")` expressions
const IMPORT_QUERY: &str = r#"
(import_statement) @import

(call_expression
  function: (import)
  arguments: (arguments (string) @dynamic.source)) @dynamic.import
"#;

fn language_for(language_id: &str) -> Option<Language> {
    match language_id {
        "javascript" | "javascriptreact" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "typescript" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "typescriptreact" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        _ => None,
    }
}

impl ImportExtractor for TreeSitterExtractor {
    fn extract(
        &self,
        text: &str,
        language: &str,
    ) -> Result<Vec<ImportDescriptor>, ImportCostError> {
        let lang = language_for(language).ok_or_else(|| {
            ImportCostError::Parse(format!("unrecognized language '{language}'"))
        })?;

        let mut parser = Parser::new();
        parser
            .set_language(&lang)
            .map_err(|err| ImportCostError::Parse(err.to_string()))?;
        let tree = parser
            .parse(text, None)
            .ok_or_else(|| ImportCostError::Parse("tree-sitter produced no tree".to_string()))?;

        let query = Query::new(&lang, IMPORT_QUERY)
            .map_err(|err| ImportCostError::Parse(err.to_string()))?;
        let capture_names = query.capture_names();

        let mut imports = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), text.as_bytes());
        while let Some(query_match) = matches.next() {
            let mut statement = None;
            let mut dynamic_call = None;
            let mut dynamic_source = None;
            for capture in query_match.captures {
                match capture_names[capture.index as usize] {
                    "import" => statement = Some(capture.node),
                    "dynamic.import" => dynamic_call = Some(capture.node),
                    "dynamic.source" => dynamic_source = Some(capture.node),
                    _ => {}
                }
            }

            if let Some(node) = statement {
                if let Some(descriptor) = classify_statement(node, text) {
                    imports.push(descriptor);
                }
            } else if let (Some(call), Some(source)) = (dynamic_call, dynamic_source) {
                imports.push(ImportDescriptor {
                    name: string_content(source, text),
                    members: ImportMembers::AllNamespace,
                    range: node_range(call),
                });
            }
        }

        Ok(imports)
    }
}

fn classify_statement(node: Node, src: &str) -> Option<ImportDescriptor> {
    let source = node.child_by_field_name("source")?;
    let name = string_content(source, src);

    // A bare `import "x"` has no clause and pulls in nothing by name
    let mut members = ImportMembers::NamedList(Vec::new());
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "import_clause" {
            members = classify_clause(child, src);
            break;
        }
    }

    Some(ImportDescriptor {
        name,
        members,
        range: node_range(node),
    })
}

fn classify_clause(clause: Node, src: &str) -> ImportMembers {
    let mut has_default = false;
    let mut has_namespace = false;
    let mut named = Vec::new();

    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => has_default = true,
            "namespace_import" => has_namespace = true,
            "named_imports" => collect_named(child, src, &mut named),
            _ => {}
        }
    }

    // A default specifier wins over the rest, then a namespace specifier
    if has_default {
        ImportMembers::DefaultOnly
    } else if has_namespace {
        ImportMembers::AllNamespace
    } else {
        ImportMembers::NamedList(named)
    }
}

fn collect_named(named_imports: Node, src: &str, out: &mut Vec<String>) {
    let mut cursor = named_imports.walk();
    for specifier in named_imports.named_children(&mut cursor) {
        if specifier.kind() != "import_specifier" {
            continue;
        }
        // The local binding: the alias when present, else the imported name
        let binding = specifier
            .child_by_field_name("alias")
            .or_else(|| specifier.child_by_field_name("name"));
        if let Some(node) = binding {
            if let Ok(name) = node.utf8_text(src.as_bytes()) {
                out.push(name.to_string());
            }
        }
    }
}

fn string_content(node: Node, src: &str) -> String {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "string_fragment" {
            if let Ok(fragment) = child.utf8_text(src.as_bytes()) {
                return fragment.to_string();
            }
        }
    }
    String::new()
}

fn node_range(node: Node) -> SourceRange {
    let start = node.start_position();
    let end = node.end_position();
    SourceRange {
        start_line: start.row,
        start_col: start.column,
        end_line: end.row,
        end_col: end.column,
    }
}
