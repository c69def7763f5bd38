use logos::Logos;
use std::fmt;

/// Token types for the scene description subset
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token<'src> {
    // Specifiers
    #[token("def")]
    Def,

    #[token("over")]
    Over,

    #[token("class")]
    Class,

    // Property qualifiers
    #[token("custom")]
    Custom,

    #[token("uniform")]
    Uniform,

    // List-edit operators and composition arcs
    #[token("prepend")]
    Prepend,

    #[token("append")]
    Append,

    #[token("references")]
    References,

    #[token("payload")]
    Payload,

    #[token("true")]
    True,

    #[token("false")]
    False,

    // Identifiers (type names like `token[]`, namespaced names like `xformOp:translate`)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_:\.]*(\[\])?", |lex| lex.slice())]
    Ident(&'src str),

    // String literals (raw slice, quotes included)
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| lex.slice())]
    String(&'src str),

    // Asset paths: @./box.usda@
    #[regex(r"@[^@\n]*@", |lex| lex.slice())]
    AssetPath(&'src str),

    // Prim path references: </World/Box>
    #[regex(r"<[^<>\n]*>", |lex| lex.slice())]
    PathRef(&'src str),

    // Numbers
    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][-+]?[0-9]+)?", |lex| lex.slice())]
    Number(&'src str),

    // Symbols
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("=")]
    Equals,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Def => write!(f, "keyword 'def'"),
            Token::Over => write!(f, "keyword 'over'"),
            Token::Class => write!(f, "keyword 'class'"),
            Token::Custom => write!(f, "keyword 'custom'"),
            Token::Uniform => write!(f, "keyword 'uniform'"),
            Token::Prepend => write!(f, "keyword 'prepend'"),
            Token::Append => write!(f, "keyword 'append'"),
            Token::References => write!(f, "keyword 'references'"),
            Token::Payload => write!(f, "keyword 'payload'"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::String(s) => write!(f, "string {}", s),
            Token::AssetPath(s) => write!(f, "asset path {}", s),
            Token::PathRef(s) => write!(f, "path {}", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Equals => write!(f, "'='"),
            Token::Comma => write!(f, "','"),
            Token::Semicolon => write!(f, "';'"),
        }
    }
}

/// Tokenize a source string
///
/// Characters outside the supported subset are dropped from the token
/// stream; statements containing them survive as raw source slices.
pub fn tokenize(source: &str) -> Vec<(Token, std::ops::Range<usize>)> {
    let lexer = Token::lexer(source);
    lexer
        .spanned()
        .filter_map(|(result, span)| result.ok().map(|token| (token, span)))
        .collect()
}

/// Decode a raw string literal slice (quotes included) into its value
pub fn unescape_string(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// True when a newline separates two byte offsets
pub(crate) fn newline_between(source: &str, from: usize, to: usize) -> bool {
    source
        .get(from..to)
        .map(|gap| gap.contains('\n'))
        .unwrap_or(false)
}
