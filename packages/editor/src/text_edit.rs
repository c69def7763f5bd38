//! # In-place text edits
//!
//! Targeted mutations on raw document text. Blocks are located with the
//! brace-depth outline, so untouched regions of the document (comments,
//! unsupported statements, formatting) survive byte for byte.
//!
//! Every function either returns the complete new text or an [`EditError`];
//! the input is never partially modified.

use crate::errors::EditError;
use stagehand_parser::ast::{Property, PropertyType};
use stagehand_parser::outline::{indent_of, line_start, BlockSpan, Outline};
use stagehand_parser::serializer::{format_property, quote, reindent};
use stagehand_parser::tokenizer::{tokenize, Token};
use stagehand_parser::{parse_prim_block, prim_path, scan_outline, validate_property_value};
use std::ops::Range;

/// Result of a rename
#[derive(Debug, Clone, PartialEq)]
pub struct RenameOutcome {
    pub text: String,
    pub new_path: String,
    /// Every moved path, the prim itself first (old, new)
    pub renamed: Vec<(String, String)>,
}

/// Result of an insert or removal
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub text: String,
    /// Paths added or removed, parents before children
    pub affected: Vec<String>,
}

/// Insert or replace `custom <type> <name> = <value>` in the block for `path`
///
/// Applying the same change twice yields the same text as applying it once.
pub fn set_property(
    doc: &str,
    path: &str,
    name: &str,
    raw_value: &str,
    value_type: PropertyType,
) -> Result<String, EditError> {
    if !is_valid_property_name(name) {
        return Err(EditError::InvalidPropertyName(name.to_string()));
    }
    let value = validate_property_value(raw_value, value_type)
        .into_result()
        .map_err(|message| EditError::InvalidValue {
            name: name.to_string(),
            message,
        })?;

    let outline = scan_outline(doc)?;
    let block = find_block(&outline, path)?;
    let mut property = Property::custom(name, value);

    if let Some(range) = find_statement(doc, block, name) {
        property.uniform = tokenize(&doc[range.clone()])
            .iter()
            .any(|(token, _)| *token == Token::Uniform);
        return Ok(splice(doc, range, &format_property(&property)));
    }
    let line = format_property(&property);

    // New properties go after the existing ones, ahead of child blocks
    let first_child = outline.children_of_path(path).into_iter().next();
    let indent = format!("{}    ", indent_of(doc, block.header_start));
    Ok(insert_lines(doc, block, first_child, &format!("{}{}\n", indent, line)))
}

/// Rewrite the name of the prim at `path`
pub fn rename_prim(doc: &str, path: &str, new_name: &str) -> Result<RenameOutcome, EditError> {
    if !prim_path::is_valid_name(new_name) {
        return Err(EditError::InvalidName(new_name.to_string()));
    }

    let outline = scan_outline(doc)?;
    let block = find_block(&outline, path)?;
    let parent_path = prim_path::parent_of(path).unwrap_or("/");
    let new_path = prim_path::join(parent_path, new_name);

    if block.name == new_name {
        return Ok(RenameOutcome {
            text: doc.to_string(),
            new_path,
            renamed: Vec::new(),
        });
    }

    if outline
        .children_of(block.parent)
        .any(|sibling| sibling.name == new_name)
    {
        return Err(EditError::DuplicateSibling {
            parent: parent_path.to_string(),
            name: new_name.to_string(),
        });
    }

    let renamed = outline
        .blocks
        .iter()
        .filter_map(|b| {
            prim_path::rebase(&b.path, path, &new_path).map(|moved| (b.path.clone(), moved))
        })
        .collect();

    Ok(RenameOutcome {
        text: splice(doc, block.name_range.clone(), &quote(new_name)),
        new_path,
        renamed,
    })
}

/// Append `raw_block` as the last child of `parent_path` (`/` for top level)
pub fn insert_prim(doc: &str, parent_path: &str, raw_block: &str) -> Result<EditOutcome, EditError> {
    let prims = parse_prim_block(raw_block, parent_path)
        .map_err(|e| EditError::InvalidBlock(e.to_string()))?;

    let outline = scan_outline(doc)?;
    let parent = if prim_path::is_root(parent_path) {
        None
    } else {
        Some(
            outline
                .find(parent_path)
                .ok_or_else(|| EditError::ParentNotFound(parent_path.to_string()))?,
        )
    };

    let siblings = outline.children_of_path(parent_path);
    for prim in &prims {
        if siblings.iter().any(|s| s.name == prim.name) {
            return Err(EditError::DuplicateSibling {
                parent: parent_path.to_string(),
                name: prim.name.clone(),
            });
        }
    }

    let affected = prims
        .iter()
        .flat_map(|p| p.descendants())
        .map(|p| p.path.clone())
        .collect();

    let text = match parent {
        Some(block) => {
            let depth = block.depth + 1;
            insert_lines(doc, block, None, &reindent(raw_block, depth))
        }
        None => {
            let mut text = doc.to_string();
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            if !text.trim().is_empty() {
                text.push('\n');
            }
            text.push_str(&reindent(raw_block, 0));
            text
        }
    };

    Ok(EditOutcome { text, affected })
}

/// Delete the block for `path` together with its children
pub fn remove_prim(doc: &str, path: &str) -> Result<EditOutcome, EditError> {
    let outline = scan_outline(doc)?;
    let block = find_block(&outline, path)?;

    let affected = outline
        .blocks
        .iter()
        .filter(|b| prim_path::is_same_or_descendant(&b.path, path))
        .map(|b| b.path.clone())
        .collect();

    let owns_lines = doc[block.line_start..block.header_start].trim().is_empty()
        && (block.end == doc.len() || doc[..block.end].ends_with('\n'));
    let range = if owns_lines {
        block.line_range()
    } else {
        block.header_start..block.close_brace + 1
    };

    Ok(EditOutcome {
        text: splice(doc, range, ""),
        affected,
    })
}

/// Point every `@asset@<old_path...>` reference at `new_path` instead
///
/// Returns the new text and the number of rewritten references.
pub fn retarget_references(doc: &str, asset: &str, old_path: &str, new_path: &str) -> (String, usize) {
    let tokens = tokenize(doc);
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for pair in tokens.windows(2) {
        let (Token::AssetPath(raw_asset), _) = &pair[0] else {
            continue;
        };
        let (Token::PathRef(raw_target), target_span) = &pair[1] else {
            continue;
        };
        if pair[0].1.end != target_span.start || !same_asset(raw_asset.trim_matches('@'), asset) {
            continue;
        }

        let target = raw_target.trim_start_matches('<').trim_end_matches('>');
        if let Some(moved) = prim_path::rebase(target, old_path, new_path) {
            edits.push((target_span.clone(), format!("<{}>", moved)));
        }
    }

    let count = edits.len();
    let mut text = doc.to_string();
    for (range, replacement) in edits.into_iter().rev() {
        text.replace_range(range, &replacement);
    }
    (text, count)
}

const KEYWORDS: [&str; 11] = [
    "def", "over", "class", "custom", "uniform", "prepend", "append", "references", "payload",
    "true", "false",
];

/// Property names: identifiers, optionally namespaced with `:`
pub fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty()
        && !KEYWORDS.contains(&name)
        && !name.starts_with(':')
        && !name.ends_with(':')
        && name.split(':').all(prim_path::is_valid_name)
}

fn find_block<'a>(outline: &'a Outline, path: &str) -> Result<&'a BlockSpan, EditError> {
    outline
        .find(path)
        .ok_or_else(|| EditError::PrimNotFound(path.to_string()))
}

fn same_asset(a: &str, b: &str) -> bool {
    a.trim_start_matches("./") == b.trim_start_matches("./")
}

fn splice(doc: &str, range: Range<usize>, replacement: &str) -> String {
    let mut text = String::with_capacity(doc.len() + replacement.len());
    text.push_str(&doc[..range.start]);
    text.push_str(replacement);
    text.push_str(&doc[range.end..]);
    text
}

/// Range of the statement assigning `name` directly inside `block`
fn find_statement(doc: &str, block: &BlockSpan, name: &str) -> Option<Range<usize>> {
    let body = block.body_range();
    let offset = body.start;
    let tokens = tokenize(&doc[body]);
    let breaks = |from: usize, to: usize| doc[offset + from..offset + to].contains('\n');

    let mut depth = 0usize;
    let mut found = None;
    for (i, (token, _)) in tokens.iter().enumerate() {
        match token {
            Token::LBrace | Token::LParen | Token::LBracket => depth += 1,
            Token::RBrace | Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
            Token::Ident(ident) if depth == 0 && *ident == name => {
                if matches!(tokens.get(i + 1), Some((Token::Equals, _))) {
                    found = Some(i);
                }
            }
            _ => {}
        }
    }
    let index = found?;

    // Walk back to the first token of the statement
    let mut start = index;
    while start > 0 {
        let (previous, previous_span) = &tokens[start - 1];
        if matches!(previous, Token::Semicolon | Token::LBrace | Token::RBrace | Token::RParen)
            || breaks(previous_span.end, tokens[start].1.start)
        {
            break;
        }
        start -= 1;
    }

    // Walk forward to the end of the value
    let mut end = index + 1;
    let mut depth = 0usize;
    while end + 1 < tokens.len() {
        let (next, next_span) = &tokens[end + 1];
        if depth == 0
            && end > index + 1
            && (matches!(next, Token::Semicolon | Token::RBrace)
                || breaks(tokens[end].1.end, next_span.start))
        {
            break;
        }
        match next {
            Token::LBrace | Token::LParen | Token::LBracket => depth += 1,
            Token::RBrace | Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
            _ => {}
        }
        end += 1;
    }

    Some(offset + tokens[start].1.start..offset + tokens[end].1.end)
}

/// Insert whole `lines` into `block`, ahead of `before` or at the end of the body
fn insert_lines(doc: &str, block: &BlockSpan, before: Option<&BlockSpan>, lines: &str) -> String {
    let target = before.map(|b| b.header_start).unwrap_or(block.close_brace);
    let target_line = line_start(doc, target);

    if target_line > block.open_brace && doc[target_line..target].trim().is_empty() {
        // Skip back over blank lines so the new lines join the preceding statements
        let mut at = target_line;
        while at > block.open_brace + 1 {
            let previous = line_start(doc, at - 1);
            if previous <= block.open_brace || !doc[previous..at].trim().is_empty() {
                break;
            }
            at = previous;
        }
        return splice(doc, at..at, lines);
    }

    // Target shares a line with other text (`def "A" {}`)
    let mut insertion = String::with_capacity(lines.len() + 8);
    insertion.push('\n');
    insertion.push_str(lines);
    insertion.push_str(indent_of(doc, block.header_start));
    splice(doc, target..target, &insertion)
}
