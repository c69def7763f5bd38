use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::prim_path;
use crate::tokenizer::{newline_between, tokenize, unescape_string, Token};

/// Recursive-descent parser for the scene description subset
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, std::ops::Range<usize>)>,
    pos: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            tokens: tokenize(source),
            pos: 0,
        }
    }

    /// Parse a complete document
    pub fn parse_document(&mut self) -> ParseResult<SceneDocument> {
        let mut doc = SceneDocument::new();
        doc.header = detect_header(self.source);

        if self.check(Token::LParen) {
            self.parse_layer_metadata(&mut doc)?;
        }

        while !self.is_at_end() {
            match self.peek() {
                Some((Token::Def, _)) | Some((Token::Over, _)) | Some((Token::Class, _)) => {
                    let start = self.peek_span().start;
                    let prim = self.parse_prim("/")?;
                    if doc.prims.iter().any(|p| p.name == prim.name) {
                        return Err(ParseError::DuplicatePrim {
                            pos: start,
                            path: prim.path,
                        });
                    }
                    doc.prims.push(prim);
                }
                Some((Token::Semicolon, _)) => {
                    self.advance();
                }
                Some((Token::RBrace, _)) => {
                    return Err(ParseError::unbalanced(
                        self.peek_span().start,
                        "'}' without a matching '{'",
                    ));
                }
                _ => {
                    let raw = self.take_statement()?;
                    doc.opaque.push(raw);
                }
            }
        }

        Ok(doc)
    }

    /// Parse the `( ... )` block at the top of a document
    fn parse_layer_metadata(&mut self, doc: &mut SceneDocument) -> ParseResult<()> {
        self.expect(Token::LParen)?;

        loop {
            match self.peek() {
                None => return Err(ParseError::unexpected_eof(self.source.len(), "')'")),
                Some((Token::RParen, _)) => {
                    self.advance();
                    return Ok(());
                }
                Some((Token::Semicolon, _)) | Some((Token::Comma, _)) => {
                    self.advance();
                }
                Some((Token::Ident("defaultPrim"), _)) => {
                    let save = self.pos;
                    self.advance();
                    let value = if self.match_token(Token::Equals) {
                        self.match_string()
                    } else {
                        None
                    };
                    match value {
                        Some(name) if self.at_statement_end() => doc.default_prim = Some(name),
                        _ => {
                            self.pos = save;
                            let raw = self.take_statement()?;
                            doc.metadata.push(raw);
                        }
                    }
                }
                _ => {
                    let raw = self.take_statement()?;
                    doc.metadata.push(raw);
                }
            }
        }
    }

    /// Parse a `def`/`over`/`class` block and its children
    fn parse_prim(&mut self, parent_path: &str) -> ParseResult<Prim> {
        let token = self.advance().map(|(token, _)| token.clone());
        let specifier = match token {
            Some(Token::Def) => Specifier::Def,
            Some(Token::Over) => Specifier::Over,
            Some(Token::Class) => Specifier::Class,
            other => {
                return Err(ParseError::unexpected_token(
                    self.current_pos(),
                    "'def', 'over' or 'class'",
                    other
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "end of file".to_string()),
                ))
            }
        };

        let type_name = match self.peek() {
            Some((Token::Ident(t), _)) => {
                let t = t.to_string();
                self.advance();
                Some(t)
            }
            _ => None,
        };

        let name_pos = self.peek_span().start;
        let name = self.expect_string()?;
        if !prim_path::is_valid_name(&name) {
            return Err(ParseError::invalid_syntax(
                name_pos,
                format!("'{}' is not a valid prim name", name),
            ));
        }
        let mut prim = Prim::new(parent_path, name, specifier);
        prim.type_name = type_name;

        if self.check(Token::LParen) {
            self.parse_prim_metadata(&mut prim)?;
        }

        let open = self.peek_span().start;
        self.expect(Token::LBrace)?;

        loop {
            match self.peek() {
                None => {
                    return Err(ParseError::unbalanced(
                        open,
                        format!("block for '{}' is never closed", prim.path),
                    ))
                }
                Some((Token::RBrace, _)) => {
                    self.advance();
                    break;
                }
                Some((Token::Def, _)) | Some((Token::Over, _)) | Some((Token::Class, _)) => {
                    let start = self.peek_span().start;
                    let child = self.parse_prim(&prim.path)?;
                    if prim.child(&child.name).is_some() {
                        return Err(ParseError::DuplicatePrim {
                            pos: start,
                            path: child.path,
                        });
                    }
                    prim.children.push(child);
                }
                Some((Token::Semicolon, _)) => {
                    self.advance();
                }
                _ => match self.try_property() {
                    Some(property) => {
                        // Later opinions on the same name win
                        match prim.properties.iter_mut().find(|p| p.name == property.name) {
                            Some(existing) => *existing = property,
                            None => prim.properties.push(property),
                        }
                    }
                    None => {
                        let raw = self.take_statement()?;
                        prim.opaque.push(raw);
                    }
                },
            }
        }

        Ok(prim)
    }

    /// Parse the `( ... )` metadata after a prim name
    fn parse_prim_metadata(&mut self, prim: &mut Prim) -> ParseResult<()> {
        self.expect(Token::LParen)?;

        loop {
            match self.peek() {
                None => return Err(ParseError::unexpected_eof(self.source.len(), "')'")),
                Some((Token::RParen, _)) => {
                    self.advance();
                    return Ok(());
                }
                Some((Token::Semicolon, _)) | Some((Token::Comma, _)) => {
                    self.advance();
                }
                _ => {
                    if prim.arc.is_none() {
                        if let Some(arc) = self.try_arc() {
                            prim.arc = Some(arc);
                            continue;
                        }
                    }
                    let raw = self.take_statement()?;
                    prim.metadata.push(raw);
                }
            }
        }
    }

    /// `[prepend|append] (references|payload) = @file@[</path>]`, optionally in `[...]`
    fn try_arc(&mut self) -> Option<CompositionArc> {
        let save = self.pos;
        let arc = self.parse_arc();
        if arc.is_none() {
            self.pos = save;
        }
        arc
    }

    fn parse_arc(&mut self) -> Option<CompositionArc> {
        let list_op = if self.match_token(Token::Prepend) {
            ListOp::Prepend
        } else if self.match_token(Token::Append) {
            ListOp::Append
        } else {
            ListOp::Explicit
        };

        let kind = if self.match_token(Token::References) {
            ArcKind::References
        } else if self.match_token(Token::Payload) {
            ArcKind::Payload
        } else {
            return None;
        };

        if !self.match_token(Token::Equals) {
            return None;
        }

        let bracketed = self.match_token(Token::LBracket);

        let asset = match self.peek() {
            Some((Token::AssetPath(raw), _)) => raw.trim_matches('@').to_string(),
            _ => return None,
        };
        self.advance();

        let target = match self.peek() {
            Some((Token::PathRef(raw), _)) => {
                let inner = raw.trim_start_matches('<').trim_end_matches('>').to_string();
                self.advance();
                if inner.is_empty() {
                    None
                } else {
                    Some(inner)
                }
            }
            _ => None,
        };

        if bracketed && !self.match_token(Token::RBracket) {
            // Multi-entry lists are kept verbatim
            return None;
        }

        if !self.at_statement_end() {
            return None;
        }

        Some(CompositionArc {
            kind,
            list_op,
            asset,
            target,
        })
    }

    /// `[custom] [uniform] <type> <name> = <scalar>` with a supported type, on one line
    fn try_property(&mut self) -> Option<Property> {
        let save = self.pos;
        let property = self.parse_property();
        if property.is_none() {
            self.pos = save;
        }
        property
    }

    fn parse_property(&mut self) -> Option<Property> {
        let custom = self.match_token(Token::Custom);
        let uniform = self.match_token(Token::Uniform);

        let value_type = match self.peek() {
            Some((Token::Ident(t), _)) => PropertyType::from_keyword(t)?,
            _ => return None,
        };
        self.advance();

        let name = match self.peek() {
            Some((Token::Ident(n), _)) => n.to_string(),
            _ => return None,
        };
        self.advance();

        if !self.match_token(Token::Equals) {
            return None;
        }

        let value = match (self.peek(), value_type) {
            (Some((Token::String(raw), _)), PropertyType::String) => {
                PropertyValue::String(unescape_string(raw))
            }
            (Some((Token::String(raw), _)), PropertyType::Token) => {
                PropertyValue::Token(unescape_string(raw))
            }
            (Some((Token::Number(n), _)), PropertyType::Int) => PropertyValue::Int(n.parse().ok()?),
            (Some((Token::Number(n), _)), PropertyType::Float) => {
                PropertyValue::Float(n.parse().ok()?)
            }
            (Some((Token::Number(n), _)), PropertyType::Double) => {
                PropertyValue::Double(n.parse().ok()?)
            }
            (Some((Token::True, _)), PropertyType::Bool) => PropertyValue::Bool(true),
            (Some((Token::False, _)), PropertyType::Bool) => PropertyValue::Bool(false),
            (Some((Token::Number(n), _)), PropertyType::Bool) => match *n {
                "0" => PropertyValue::Bool(false),
                "1" => PropertyValue::Bool(true),
                _ => return None,
            },
            _ => return None,
        };
        self.advance();

        if !self.at_statement_end() {
            return None;
        }

        Some(Property {
            name,
            value,
            custom,
            uniform,
        })
    }

    /// Consume one statement verbatim: up to the end of its line, with
    /// bracketed groups allowed to span lines
    fn take_statement(&mut self) -> ParseResult<String> {
        let start = self.peek_span().start;
        let mut end = start;
        let mut depth: usize = 0;
        let mut first = true;

        loop {
            let (token, span) = match self.peek() {
                Some((token, span)) => (token.clone(), span.clone()),
                None => {
                    if depth > 0 {
                        return Err(ParseError::unbalanced(start, "unclosed group in statement"));
                    }
                    break;
                }
            };

            if depth == 0 && !first {
                let ends_here = matches!(
                    token,
                    Token::RBrace | Token::RParen | Token::Semicolon
                ) || newline_between(self.source, end, span.start);
                if ends_here {
                    break;
                }
            }

            match token {
                Token::LBrace | Token::LParen | Token::LBracket => depth += 1,
                Token::RBrace | Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                _ => {}
            }

            end = span.end;
            first = false;
            self.advance();
        }

        Ok(self.source[start..end].to_string())
    }

    /// True when the next token starts a new statement
    fn at_statement_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some((Token::RBrace, _)) | Some((Token::RParen, _)) | Some((Token::Semicolon, _)) => {
                true
            }
            Some((_, span)) => newline_between(self.source, self.current_end(), span.start),
        }
    }

    // Helper methods

    fn peek(&self) -> Option<&(Token<'src>, std::ops::Range<usize>)> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&(Token<'src>, std::ops::Range<usize>)> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, token: Token) -> bool {
        if let Some((t, _)) = self.peek() {
            std::mem::discriminant(t) == std::mem::discriminant(&token)
        } else {
            false
        }
    }

    fn match_token(&mut self, token: Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_string(&mut self) -> Option<String> {
        match self.peek() {
            Some((Token::String(s), _)) => {
                let val = unescape_string(s);
                self.advance();
                Some(val)
            }
            _ => None,
        }
    }

    fn expect(&mut self, token: Token) -> ParseResult<()> {
        if self.check(token.clone()) {
            self.advance();
            Ok(())
        } else if self.is_at_end() {
            Err(ParseError::unexpected_eof(self.source.len(), token.to_string()))
        } else {
            Err(ParseError::unexpected_token(
                self.peek_span().start,
                token.to_string(),
                Self::format_token(self.peek()),
            ))
        }
    }

    fn expect_string(&mut self) -> ParseResult<String> {
        match self.match_string() {
            Some(val) => Ok(val),
            None if self.is_at_end() => {
                Err(ParseError::unexpected_eof(self.source.len(), "prim name"))
            }
            None => Err(ParseError::unexpected_token(
                self.peek_span().start,
                "quoted prim name",
                Self::format_token(self.peek()),
            )),
        }
    }

    fn current_pos(&self) -> usize {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|(_, span)| span.start)
            .unwrap_or(0)
    }

    /// End offset of the token we just consumed
    fn current_end(&self) -> usize {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|(_, span)| span.end)
            .unwrap_or(0)
    }

    /// Get the span of the next token (the one we're about to consume)
    fn peek_span(&self) -> std::ops::Range<usize> {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.clone())
            .unwrap_or_else(|| {
                let end = self.source.len();
                end..end
            })
    }

    /// Format a token for display in error messages
    fn format_token(token: Option<&(Token, std::ops::Range<usize>)>) -> String {
        match token {
            None => "end of file".to_string(),
            Some((token, _)) => token.to_string(),
        }
    }
}

/// Capture a leading `#usda 1.0` style header line
fn detect_header(source: &str) -> Option<String> {
    let first = source.trim_start().lines().next()?;
    if first.starts_with("#usda") {
        Some(first.trim_end().to_string())
    } else {
        None
    }
}

/// Parse a document into its prim forest
///
/// Malformed brace nesting is a hard error; no partial tree is returned.
pub fn parse(source: &str) -> ParseResult<SceneDocument> {
    let mut parser = Parser::new(source);
    parser.parse_document()
}

/// Parse a standalone prim block (`def Cube "Box" { ... }`) placed under `parent_path`
pub fn parse_prim_block(source: &str, parent_path: &str) -> ParseResult<Vec<Prim>> {
    let doc = parse(source)?;
    if doc.prims.is_empty() {
        return Err(ParseError::invalid_syntax(0, "no prim block found"));
    }
    if let Some(raw) = doc.opaque.first() {
        return Err(ParseError::invalid_syntax(
            0,
            format!("unexpected statement outside a prim block: {}", raw),
        ));
    }

    let prims = doc
        .prims
        .into_iter()
        .map(|mut prim| {
            let path = prim_path::join(parent_path, &prim.name);
            prim.rebase(&path);
            prim
        })
        .collect();
    Ok(prims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_defs() {
        let source = r#"
            #usda 1.0
            (
                defaultPrim = "World"
                upAxis = "Y"
            )

            def Xform "World"
            {
                custom string status = "WIP"

                def Cube "Box"
                {
                    custom double size = 2.5
                }
            }
        "#;

        let doc = parse(source).unwrap();
        assert_eq!(doc.header.as_deref(), Some("#usda 1.0"));
        assert_eq!(doc.default_prim.as_deref(), Some("World"));
        assert_eq!(doc.metadata, vec!["upAxis = \"Y\"".to_string()]);

        let world = &doc.prims[0];
        assert_eq!(world.path, "/World");
        assert_eq!(world.type_name.as_deref(), Some("Xform"));
        assert_eq!(world.status(), Some("WIP"));

        let cube = &world.children[0];
        assert_eq!(cube.path, "/World/Box");
        assert_eq!(
            cube.property("size").unwrap().value,
            PropertyValue::Double(2.5)
        );
    }

    #[test]
    fn test_parse_typed_properties() {
        let source = r#"
            def "A" {
                custom string label = "say \"hi\""
                custom token kind = "component"
                custom int count = 3
                custom float ratio = 0.5
                custom bool visible = true
                int plain = 7
            }
        "#;

        let doc = parse(source).unwrap();
        let a = &doc.prims[0];
        assert_eq!(a.type_name, None);
        assert_eq!(a.text_property("label"), Some("say \"hi\""));
        assert_eq!(a.property("kind").unwrap().value, PropertyValue::token("component"));
        assert_eq!(a.property("count").unwrap().value, PropertyValue::Int(3));
        assert_eq!(a.property("ratio").unwrap().value, PropertyValue::Float(0.5));
        assert_eq!(a.property("visible").unwrap().value, PropertyValue::Bool(true));
        assert!(!a.property("plain").unwrap().custom);
    }

    #[test]
    fn test_parse_uniform_properties() {
        let source = "def \"A\" {\n    uniform token kind = \"component\"\n    custom uniform string label = \"x\"\n}\n";

        let doc = parse(source).unwrap();
        let a = &doc.prims[0];
        let kind = a.property("kind").unwrap();
        assert_eq!(kind.value, PropertyValue::token("component"));
        assert!(kind.uniform);
        assert!(!kind.custom);
        let label = a.property("label").unwrap();
        assert!(label.uniform && label.custom);
        assert!(a.opaque.is_empty());
    }

    #[test]
    fn test_prim_names_must_be_identifiers() {
        let source = "def \"A\" {\n    def \"B\" {}\n}\ndef \"A/B\" {}\n";
        match parse(source) {
            Err(ParseError::InvalidSyntax { message, .. }) => assert!(message.contains("A/B")),
            other => panic!("expected invalid prim name, got {:?}", other),
        }
        assert!(parse("def \"1st\" {}").is_err());
        assert!(parse("def \"Wall_01\" {}").is_ok());
    }

    #[test]
    fn test_parse_references_and_payload() {
        let source = r#"
            def Xform "Site" (
                prepend references = @./site.usda@</Site>
                kind = "assembly"
            )
            {
            }

            def "Heavy" (
                payload = @./heavy.usda@
            )
            {
            }
        "#;

        let doc = parse(source).unwrap();
        let site = &doc.prims[0];
        let arc = site.arc.as_ref().unwrap();
        assert_eq!(arc.kind, ArcKind::References);
        assert_eq!(arc.list_op, ListOp::Prepend);
        assert_eq!(arc.asset, "./site.usda");
        assert_eq!(arc.target.as_deref(), Some("/Site"));
        assert_eq!(site.metadata, vec!["kind = \"assembly\"".to_string()]);

        let heavy = &doc.prims[1];
        let arc = heavy.arc.as_ref().unwrap();
        assert_eq!(arc.kind, ArcKind::Payload);
        assert_eq!(arc.target, None);
    }

    #[test]
    fn test_unsupported_statements_are_preserved() {
        let source = r#"
            def Xform "World"
            {
                double3 xformOp:translate = (0, 1.5, 0)
                uniform token[] xformOpOrder = ["xformOp:translate"]
                custom string status = "WIP"
            }
        "#;

        let doc = parse(source).unwrap();
        let world = &doc.prims[0];
        assert_eq!(world.properties.len(), 1);
        assert_eq!(
            world.opaque,
            vec![
                "double3 xformOp:translate = (0, 1.5, 0)".to_string(),
                "uniform token[] xformOpOrder = [\"xformOp:translate\"]".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_change_log_block() {
        let source = r#"
            def "ChangeLog"
            {
                def "Log_1"
                {
                    custom int entry = 1; custom string type = "add"
                }
            }
        "#;

        let doc = parse(source).unwrap();
        let log = doc.change_log().unwrap();
        assert_eq!(log.children.len(), 1);
        let entry = &log.children[0];
        assert_eq!(entry.name, "Log_1");
        assert_eq!(entry.property("entry").unwrap().value, PropertyValue::Int(1));
        assert_eq!(entry.text_property("type"), Some("add"));
    }

    #[test]
    fn test_unclosed_block_is_hard_error() {
        let source = r#"
            def "World" {
                def "Box" {
            }
        "#;

        let result = parse(source);
        assert!(matches!(result, Err(ParseError::UnbalancedBraces { .. })));
    }

    #[test]
    fn test_stray_closing_brace_is_hard_error() {
        let result = parse("def \"A\" {}\n}");
        assert!(matches!(result, Err(ParseError::UnbalancedBraces { .. })));
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let source = r#"
            def "World" {
                def "Box" {}
                def "Box" {}
            }
        "#;

        let result = parse(source);
        assert!(matches!(result, Err(ParseError::DuplicatePrim { .. })));
    }

    #[test]
    fn test_parse_prim_block_rebases() {
        let prims = parse_prim_block("def Cube \"Box\" { def \"Lid\" {} }", "/World").unwrap();
        assert_eq!(prims[0].path, "/World/Box");
        assert_eq!(prims[0].children[0].path, "/World/Box/Lid");
    }

    #[test]
    fn test_deterministic() {
        let source = "def \"A\" { def \"B\" {} def \"C\" {} }";
        assert_eq!(parse(source).unwrap(), parse(source).unwrap());
    }
}
