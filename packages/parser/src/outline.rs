//! Brace-depth block outline
//!
//! Locates every prim block in raw text without building the full AST, so
//! in-place edits can splice the source directly.

use crate::error::{ParseError, ParseResult};
use crate::prim_path;
use crate::tokenizer::{tokenize, unescape_string, Token};
use std::ops::Range;

/// Byte offsets of one prim block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub path: String,
    pub name: String,
    /// Number of prim ancestors
    pub depth: usize,
    /// Start of the line holding the specifier
    pub line_start: usize,
    /// Offset of the `def`/`over`/`class` keyword
    pub header_start: usize,
    /// Quoted name literal, quotes included
    pub name_range: Range<usize>,
    pub open_brace: usize,
    pub close_brace: usize,
    /// End of the block including the rest of the closing line
    pub end: usize,
    /// Index of the enclosing block
    pub parent: Option<usize>,
}

impl BlockSpan {
    /// Text between the braces
    pub fn body_range(&self) -> Range<usize> {
        self.open_brace + 1..self.close_brace
    }

    /// Whole lines covered by the block
    pub fn line_range(&self) -> Range<usize> {
        self.line_start..self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct Outline {
    /// Blocks in source order (parents before children)
    pub blocks: Vec<BlockSpan>,
}

impl Outline {
    pub fn find(&self, path: &str) -> Option<&BlockSpan> {
        self.blocks.iter().find(|b| b.path == path)
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.path == path)
    }

    /// Direct children of the block at `index`, or top-level blocks for `None`
    pub fn children_of(&self, index: Option<usize>) -> impl Iterator<Item = &BlockSpan> {
        self.blocks.iter().filter(move |b| b.parent == index)
    }

    /// Direct children of the prim at `path` (`/` for top level)
    pub fn children_of_path(&self, path: &str) -> Vec<&BlockSpan> {
        if prim_path::is_root(path) {
            return self.children_of(None).collect();
        }
        match self.index_of(path) {
            Some(index) => self.children_of(Some(index)).collect(),
            None => Vec::new(),
        }
    }
}

enum Frame {
    Prim(usize),
    Other,
}

/// Scan `text` for prim blocks
///
/// Unbalanced braces are an error, mirroring `parse`.
pub fn scan_outline(text: &str) -> ParseResult<Outline> {
    let tokens = tokenize(text);
    let mut outline = Outline::default();
    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let (token, span) = &tokens[i];
        match token {
            Token::Def | Token::Over | Token::Class => {
                if let Some((name_index, brace_index)) = prim_header(&tokens, i) {
                    let (name_token, name_span) = &tokens[name_index];
                    let name = match name_token {
                        Token::String(raw) => unescape_string(raw),
                        _ => String::new(),
                    };
                    let parent = stack.iter().rev().find_map(|frame| match frame {
                        Frame::Prim(index) => Some(*index),
                        Frame::Other => None,
                    });
                    let parent_path = parent
                        .map(|index| outline.blocks[index].path.clone())
                        .unwrap_or_else(|| "/".to_string());

                    outline.blocks.push(BlockSpan {
                        path: prim_path::join(&parent_path, &name),
                        depth: parent.map(|index| outline.blocks[index].depth + 1).unwrap_or(0),
                        name,
                        line_start: line_start(text, span.start),
                        header_start: span.start,
                        name_range: name_span.clone(),
                        open_brace: tokens[brace_index].1.start,
                        close_brace: 0,
                        end: 0,
                        parent,
                    });
                    stack.push(Frame::Prim(outline.blocks.len() - 1));
                    i = brace_index + 1;
                    continue;
                }
            }
            Token::LBrace => stack.push(Frame::Other),
            Token::RBrace => match stack.pop() {
                Some(Frame::Prim(index)) => {
                    let block = &mut outline.blocks[index];
                    block.close_brace = span.start;
                    block.end = block_end(text, span.end);
                }
                Some(Frame::Other) => {}
                None => {
                    return Err(ParseError::unbalanced(
                        span.start,
                        "'}' without a matching '{'",
                    ))
                }
            },
            _ => {}
        }
        i += 1;
    }

    if let Some(frame) = stack.last() {
        let pos = match frame {
            Frame::Prim(index) => outline.blocks[*index].open_brace,
            Frame::Other => text.len(),
        };
        return Err(ParseError::unbalanced(pos, "block is never closed"));
    }

    Ok(outline)
}

/// For a specifier at `start`, find the name literal and the opening brace
fn prim_header(tokens: &[(Token, Range<usize>)], start: usize) -> Option<(usize, usize)> {
    let mut j = start + 1;
    if matches!(tokens.get(j), Some((Token::Ident(_), _))) {
        j += 1;
    }
    let name_index = match tokens.get(j) {
        Some((Token::String(_), _)) => j,
        _ => return None,
    };
    j += 1;

    if matches!(tokens.get(j), Some((Token::LParen, _))) {
        let mut depth = 0usize;
        loop {
            match tokens.get(j) {
                Some((Token::LParen, _)) => depth += 1,
                Some((Token::RParen, _)) => {
                    depth -= 1;
                    if depth == 0 {
                        j += 1;
                        break;
                    }
                }
                Some(_) => {}
                None => return None,
            }
            j += 1;
        }
    }

    match tokens.get(j) {
        Some((Token::LBrace, _)) => Some((name_index, j)),
        _ => None,
    }
}

/// Extend past trailing whitespace and the newline after a closing brace
fn block_end(text: &str, after_brace: usize) -> usize {
    let eol = line_end(text, after_brace);
    if text[after_brace..eol].trim().is_empty() {
        (eol + 1).min(text.len())
    } else {
        after_brace
    }
}

/// Offset of the first byte of the line containing `offset`
pub fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Offset of the newline ending the line containing `offset` (or the text length)
pub fn line_end(text: &str, offset: usize) -> usize {
    text[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(text.len())
}

/// Leading whitespace of the line containing `offset`
pub fn indent_of(text: &str, offset: usize) -> &str {
    let start = line_start(text, offset);
    let line = &text[start..line_end(text, start)];
    &line[..line.len() - line.trim_start().len()]
}
