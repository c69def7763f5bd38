use crate::ast::*;
use crate::error::ParseResult;
use crate::outline::{indent_of, line_start, scan_outline};
use crate::prim_path;

/// Header written by `compose`
pub const DOCUMENT_HEADER: &str = "#usda 1.0";

/// Serializer converts the AST back to source text
///
/// Whitespace is normalized to one statement per line with four-space
/// indentation. Opaque statements are written back verbatim after the
/// properties of their block.
pub struct Serializer {
    indent_level: usize,
    indent_string: String,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            indent_level: 0,
            indent_string: "    ".to_string(),
        }
    }

    pub fn with_indent(indent: &str) -> Self {
        Self {
            indent_level: 0,
            indent_string: indent.to_string(),
        }
    }

    /// Start nested `depth` levels deep (used for log fragments)
    pub fn at_depth(mut self, depth: usize) -> Self {
        self.indent_level = depth;
        self
    }

    /// Serialize a complete document
    pub fn serialize(&mut self, doc: &SceneDocument) -> String {
        let mut output = String::new();

        if let Some(header) = &doc.header {
            output.push_str(header);
            output.push('\n');
        }

        if doc.default_prim.is_some() || !doc.metadata.is_empty() {
            output.push_str("(\n");
            if let Some(default_prim) = &doc.default_prim {
                output.push_str(&self.indent_string);
                output.push_str("defaultPrim = ");
                output.push_str(&quote(default_prim));
                output.push('\n');
            }
            for entry in &doc.metadata {
                output.push_str(&self.indent_string);
                output.push_str(entry);
                output.push('\n');
            }
            output.push_str(")\n");
        }

        if !output.is_empty() {
            output.push('\n');
        }

        for statement in &doc.opaque {
            output.push_str(statement);
            output.push('\n');
        }

        if !doc.opaque.is_empty() && !doc.prims.is_empty() {
            output.push('\n');
        }

        for (i, prim) in doc.prims.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            self.serialize_prim(prim, &mut output);
        }

        output
    }

    /// Serialize a single prim block at the current depth
    pub fn serialize_prim(&mut self, prim: &Prim, output: &mut String) {
        self.write_indent(output);
        output.push_str(prim.specifier.as_str());
        if let Some(type_name) = &prim.type_name {
            output.push(' ');
            output.push_str(type_name);
        }
        output.push(' ');
        output.push_str(&quote(&prim.name));

        if prim.arc.is_some() || !prim.metadata.is_empty() {
            output.push_str(" (\n");
            self.indent_level += 1;
            if let Some(arc) = &prim.arc {
                self.write_indent(output);
                output.push_str(&format_arc(arc));
                output.push('\n');
            }
            for entry in &prim.metadata {
                self.write_indent(output);
                output.push_str(entry);
                output.push('\n');
            }
            self.indent_level -= 1;
            self.write_indent(output);
            output.push(')');
        }
        output.push('\n');

        self.write_indent(output);
        output.push_str("{\n");
        self.indent_level += 1;

        for property in &prim.properties {
            self.write_indent(output);
            output.push_str(&format_property(property));
            output.push('\n');
        }

        for statement in &prim.opaque {
            self.write_indent(output);
            output.push_str(statement);
            output.push('\n');
        }

        for (i, child) in prim.children.iter().enumerate() {
            if i > 0 || !prim.properties.is_empty() || !prim.opaque.is_empty() {
                output.push('\n');
            }
            self.serialize_prim(child, output);
        }

        self.indent_level -= 1;
        self.write_indent(output);
        output.push_str("}\n");
    }

    fn write_indent(&self, output: &mut String) {
        for _ in 0..self.indent_level {
            output.push_str(&self.indent_string);
        }
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a document back to text
pub fn serialize(doc: &SceneDocument) -> String {
    let mut serializer = Serializer::new();
    serializer.serialize(doc)
}

/// Write a prim forest as a complete document with `defaultPrim = scene_name`
pub fn compose(prims: &[Prim], scene_name: &str) -> String {
    let doc = SceneDocument {
        header: Some(DOCUMENT_HEADER.to_string()),
        default_prim: Some(scene_name.to_string()),
        prims: prims.to_vec(),
        ..SceneDocument::default()
    };
    serialize(&doc)
}

/// Authored form of a property: `custom string name = "value"`
pub fn format_property(property: &Property) -> String {
    let qualifier = if property.custom { "custom " } else { "" };
    let variability = if property.uniform { "uniform " } else { "" };
    format!(
        "{}{}{} {} = {}",
        qualifier,
        variability,
        property.value.value_type(),
        property.name,
        format_value(&property.value)
    )
}

/// Authored form of a value (text quoted and escaped)
pub fn format_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(s) | PropertyValue::Token(s) => quote(s),
        PropertyValue::Int(i) => i.to_string(),
        PropertyValue::Float(v) | PropertyValue::Double(v) => format_float(*v),
        PropertyValue::Bool(b) => b.to_string(),
    }
}

/// Floats always carry a decimal point so they read back as floats
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// `prepend references = @./box.usda@</Box>`
pub fn format_arc(arc: &CompositionArc) -> String {
    let op = match arc.list_op {
        ListOp::Explicit => "",
        ListOp::Prepend => "prepend ",
        ListOp::Append => "append ",
    };
    format!("{}{} = {}", op, arc.kind.as_str(), arc)
}

/// Quote and escape a string literal
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Field set of one change-log entry
#[derive(Debug, Clone, PartialEq)]
pub struct LogFields {
    pub entry: u64,
    pub fields: Vec<(String, PropertyValue)>,
}

impl LogFields {
    pub fn new(entry: u64) -> Self {
        Self {
            entry,
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Block name of the entry (`Log_7`)
    pub fn block_name(&self) -> String {
        format!("Log_{}", self.entry)
    }
}

/// Emit one `def "Log_<entry>" { ... }` fragment, indented for the log block
pub fn compose_log_entry(fields: &LogFields) -> String {
    let parent = prim_path::join("/", CHANGE_LOG_BLOCK);
    let mut prim = Prim::new(&parent, fields.block_name(), Specifier::Def)
        .with_property("entry", PropertyValue::Int(fields.entry as i64));
    for (name, value) in &fields.fields {
        prim.set_property(name.clone(), value.clone());
    }

    let mut output = String::new();
    Serializer::new().at_depth(1).serialize_prim(&prim, &mut output);
    output
}

/// Insert `fragment` as the last entry of the top-level `block_name` block
///
/// The block is created at the end of the document when it is missing.
/// Existing entries are never reordered.
pub fn append_to_document(doc: &str, fragment: &str, block_name: &str) -> ParseResult<String> {
    let outline = scan_outline(doc)?;
    let body = reindent(fragment, 1);

    let block = outline
        .blocks
        .iter()
        .find(|b| b.parent.is_none() && b.name == block_name);

    let mut output = String::with_capacity(doc.len() + body.len() + 32);
    match block {
        Some(block) => {
            let close = block.close_brace;
            let close_line = line_start(doc, close);
            if doc[close_line..close].trim().is_empty() {
                output.push_str(&doc[..close_line]);
                output.push_str(&body);
                output.push_str(&doc[close_line..]);
            } else {
                // `def "ChangeLog" {}` on a single line
                output.push_str(&doc[..close]);
                output.push('\n');
                output.push_str(&body);
                output.push_str(indent_of(doc, block.header_start));
                output.push_str(&doc[close..]);
            }
        }
        None => {
            output.push_str(doc);
            if !doc.is_empty() && !doc.ends_with('\n') {
                output.push('\n');
            }
            if !doc.trim().is_empty() {
                output.push('\n');
            }
            output.push_str("def ");
            output.push_str(&quote(block_name));
            output.push_str("\n{\n");
            output.push_str(&body);
            output.push_str("}\n");
        }
    }

    Ok(output)
}

/// Strip the common indentation of `block` and indent it `depth` levels
pub fn reindent(block: &str, depth: usize) -> String {
    let common = block
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let prefix = "    ".repeat(depth);
    let mut out = String::with_capacity(block.len() + depth * 4);
    for line in block.trim_matches('\n').lines() {
        if line.trim().is_empty() {
            out.push('\n');
            continue;
        }
        out.push_str(&prefix);
        out.push_str(line.get(common..).unwrap_or_else(|| line.trim_start()));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_compose_layout() {
        let world = Prim::new("/", "World", Specifier::Def)
            .with_type("Xform")
            .with_property("status", PropertyValue::string("WIP"))
            .with_child(Prim::new("/", "Box", Specifier::Def).with_type("Cube"));

        let text = compose(&[world], "World");
        let expected = "#usda 1.0\n(\n    defaultPrim = \"World\"\n)\n\ndef Xform \"World\"\n{\n    custom string status = \"WIP\"\n\n    def Cube \"Box\"\n    {\n    }\n}\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_format_values() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_value(&PropertyValue::Int(-4)), "-4");
        assert_eq!(format_value(&PropertyValue::string("a\"b")), "\"a\\\"b\"");
        assert_eq!(format_value(&PropertyValue::Bool(false)), "false");
    }

    #[test]
    fn test_arc_formatting() {
        let arc = CompositionArc::reference("./box.usda", Some("/Box".to_string()));
        assert_eq!(format_arc(&arc), "prepend references = @./box.usda@</Box>");
        let payload = CompositionArc::payload("./heavy.usda", None);
        assert_eq!(format_arc(&payload), "payload = @./heavy.usda@");
    }

    #[test]
    fn test_compose_log_entry() {
        let fields = LogFields::new(3)
            .with("type", PropertyValue::string("add"))
            .with("user", PropertyValue::string("ana"));
        let fragment = compose_log_entry(&fields);

        assert!(fragment.starts_with("    def \"Log_3\"\n    {\n"));
        assert!(fragment.contains("        custom int entry = 3\n"));
        assert!(fragment.contains("        custom string type = \"add\"\n"));
        assert!(fragment.ends_with("    }\n"));
    }

    #[test]
    fn test_append_creates_block() {
        let doc = "def \"World\"\n{\n}\n";
        let fragment = compose_log_entry(&LogFields::new(1));
        let updated = append_to_document(doc, &fragment, CHANGE_LOG_BLOCK).unwrap();

        let parsed = parse(&updated).unwrap();
        assert_eq!(parsed.prims.len(), 2);
        assert_eq!(parsed.change_log().unwrap().children[0].name, "Log_1");
    }

    #[test]
    fn test_append_keeps_entry_order() {
        let mut doc = "def \"World\"\n{\n}\n".to_string();
        for entry in 1..=3 {
            let fragment = compose_log_entry(&LogFields::new(entry));
            doc = append_to_document(&doc, &fragment, CHANGE_LOG_BLOCK).unwrap();
        }

        let parsed = parse(&doc).unwrap();
        let names: Vec<_> = parsed
            .change_log()
            .unwrap()
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Log_1", "Log_2", "Log_3"]);
    }

    #[test]
    fn test_append_into_single_line_block() {
        let doc = "def \"ChangeLog\" {}\n";
        let fragment = compose_log_entry(&LogFields::new(1));
        let updated = append_to_document(doc, &fragment, CHANGE_LOG_BLOCK).unwrap();
        let parsed = parse(&updated).unwrap();
        assert_eq!(parsed.change_log().unwrap().children.len(), 1);
    }

    #[test]
    fn test_reindent() {
        let block = "        def \"A\"\n        {\n            custom int x = 1\n        }\n";
        assert_eq!(
            reindent(block, 1),
            "    def \"A\"\n    {\n        custom int x = 1\n    }\n"
        );
    }
}
