pub mod ast;
pub mod error;
pub mod outline;
pub mod parser;
pub mod prim_path;
pub mod serializer;
pub mod tokenizer;
pub mod value;

#[cfg(test)]
mod tests_serializer;

pub use ast::{
    ArcKind, CompositionArc, ListOp, Prim, Property, PropertyType, PropertyValue, Provenance,
    SceneDocument, Specifier,
};
pub use error::{ParseError, ParseResult};
pub use outline::{scan_outline, BlockSpan, Outline};
pub use parser::{parse, parse_prim_block, Parser};
pub use serializer::{
    append_to_document, compose, compose_log_entry, serialize, LogFields, Serializer,
};
pub use tokenizer::{tokenize, Token};
pub use value::{validate_property_value, Validation};

#[cfg(feature = "pretty-errors")]
pub use error::format_error;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer_basic() {
        let source = "def \"World\" {}";
        let tokens = tokenize(source);
        assert_eq!(tokens.len(), 4);
    }
}
