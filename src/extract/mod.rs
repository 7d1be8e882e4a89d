mod tree_parser;

pub use tree_parser::{ImportExtractor, TreeSitterExtractor};
