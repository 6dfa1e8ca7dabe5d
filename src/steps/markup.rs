//! Steps markup: a minimal tag scanner plus decode/render.
//!
//! The remote system stores test steps as
//!
//! ```text
//! <steps id="0" last="2">
//!   <step id="1" type="ValidateStep">
//!     <parameterizedString isformatted="true">&lt;P&gt;Open the app&lt;/P&gt;</parameterizedString>
//!     <parameterizedString isformatted="true">&lt;P&gt;App opens&lt;/P&gt;</parameterizedString>
//!     <description/>
//!   </step>
//! </steps>
//! ```
//!
//! Older records skip the `<step>` wrappers and list the payloads as a flat
//! action/expected/action/expected sequence.

use super::escape::{escape, unescape};
use super::{Step, DEFAULT_EXPECTED_RESULT};
use thiserror::Error;

const STEP_TAG: &str = "step";
const PAYLOAD_TAG: &str = "parameterizedString";

/// Rich-text tags that may appear inside a formatted payload once it is unescaped.
const RICH_TEXT_TAGS: &[&str] = &[
    "div", "p", "br", "span", "b", "i", "u", "strong", "em", "font", "ol", "ul", "li",
];

#[derive(Debug, Error, PartialEq)]
enum MarkupError {
    #[error("unterminated tag at byte {0}")]
    UnterminatedTag(usize),
    #[error("element <{0}> is never closed")]
    UnclosedElement(&'static str),
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Open {
        name: &'a str,
        attrs: &'a str,
        self_closing: bool,
    },
    Close {
        name: &'a str,
    },
    Text(&'a str),
}

/// Split markup into open/close/text tokens. Comments, processing
/// instructions and doctype declarations are dropped.
fn scan(markup: &str) -> Result<Vec<Token<'_>>, MarkupError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < markup.len() {
        let rest = &markup[pos..];
        let Some(lt) = rest.find('<') else {
            tokens.push(Token::Text(rest));
            break;
        };
        if lt > 0 {
            tokens.push(Token::Text(&rest[..lt]));
        }
        let tag_start = pos + lt;
        let tag = &markup[tag_start..];

        if let Some(body) = tag.strip_prefix("<!--") {
            let end = body
                .find("-->")
                .ok_or(MarkupError::UnterminatedTag(tag_start))?;
            pos = tag_start + 4 + end + 3;
            continue;
        }

        let close = find_tag_end(tag).ok_or(MarkupError::UnterminatedTag(tag_start))?;
        let inner = &tag[1..close];
        pos = tag_start + close + 1;

        if inner.starts_with('?') || inner.starts_with('!') {
            continue;
        }
        if let Some(name) = inner.strip_prefix('/') {
            tokens.push(Token::Close { name: name.trim() });
            continue;
        }

        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');
        let name_end = inner
            .find(|c: char| c.is_whitespace())
            .unwrap_or(inner.len());
        tokens.push(Token::Open {
            name: &inner[..name_end],
            attrs: inner[name_end..].trim(),
            self_closing,
        });
    }

    Ok(tokens)
}

/// Byte offset of the `>` closing the tag that starts at `tag[0] == '<'`,
/// skipping over quoted attribute values.
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in tag.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            (None, '<') => return None,
            _ => {}
        }
    }
    None
}

fn is_formatted(attrs: &str) -> bool {
    attrs
        .to_ascii_lowercase()
        .replace(' ', "")
        .contains("isformatted=\"true\"")
}

/// Convert a raw payload into plain text.
fn payload_text(raw: &str, formatted: bool) -> String {
    let text = unescape(raw);
    if formatted {
        // Formatted payloads are escaped HTML; after removing the tags their
        // own entities still need a second pass.
        let stripped = strip_rich_text(&text);
        collapse_whitespace(&unescape(&stripped))
    } else {
        text.trim().to_string()
    }
}

fn rich_tag_len(text: &str) -> Option<usize> {
    let body = text.strip_prefix('<')?;
    let body = body.strip_prefix('/').unwrap_or(body);
    let name_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let name = &body[..name_len];
    if !RICH_TEXT_TAGS.iter().any(|t| t.eq_ignore_ascii_case(name)) {
        return None;
    }
    let after = &body[name_len..];
    if !(after.starts_with('>') || after.starts_with('/') || after.starts_with(char::is_whitespace)) {
        return None;
    }
    find_tag_end(text).map(|end| end + 1)
}

fn strip_rich_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let candidate = &rest[lt..];
        match rich_tag_len(candidate) {
            Some(len) => {
                out.push(' ');
                rest = &candidate[len..];
            }
            None => {
                out.push('<');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn step_from_payloads(mut payloads: Vec<String>) -> Step {
    let expected = if payloads.len() > 1 {
        payloads.swap_remove(1)
    } else {
        String::new()
    };
    let action = payloads.into_iter().next().unwrap_or_default();
    Step::new(action, expected)
}

fn parse(markup: &str) -> Result<Vec<Step>, MarkupError> {
    let tokens = scan(markup)?;

    let mut steps = Vec::new();
    let mut flat: Vec<String> = Vec::new();
    let mut current_step: Option<Vec<String>> = None;
    // (raw text so far, formatted flag) while inside a payload element
    let mut payload: Option<(String, bool)> = None;
    let mut loose_text = String::new();

    let push_payload = |text: String, current: &mut Option<Vec<String>>, flat: &mut Vec<String>| {
        match current {
            Some(step) => step.push(text),
            None => flat.push(text),
        }
    };

    for token in tokens {
        match token {
            Token::Open {
                name,
                attrs,
                self_closing,
            } if name.eq_ignore_ascii_case(PAYLOAD_TAG) => {
                if self_closing {
                    push_payload(String::new(), &mut current_step, &mut flat);
                } else {
                    payload = Some((String::new(), is_formatted(attrs)));
                }
            }
            Token::Close { name } if name.eq_ignore_ascii_case(PAYLOAD_TAG) => {
                if let Some((raw, formatted)) = payload.take() {
                    push_payload(payload_text(&raw, formatted), &mut current_step, &mut flat);
                }
            }
            Token::Open {
                name, self_closing, ..
            } if name.eq_ignore_ascii_case(STEP_TAG) => {
                if !self_closing {
                    current_step = Some(Vec::new());
                }
            }
            Token::Close { name } if name.eq_ignore_ascii_case(STEP_TAG) => {
                if let Some(payloads) = current_step.take() {
                    if payloads.iter().any(|p| !p.is_empty()) {
                        steps.push(step_from_payloads(payloads));
                    }
                }
            }
            Token::Text(text) => match payload.as_mut() {
                Some((raw, _)) => raw.push_str(text),
                None => loose_text.push_str(text),
            },
            _ => {}
        }
    }

    if payload.is_some() {
        return Err(MarkupError::UnclosedElement(PAYLOAD_TAG));
    }
    if current_step.is_some() {
        return Err(MarkupError::UnclosedElement(STEP_TAG));
    }

    if !steps.is_empty() {
        return Ok(steps);
    }

    if flat.iter().any(|p| !p.is_empty()) {
        return Ok(flat
            .chunks(2)
            .map(|pair| step_from_payloads(pair.to_vec()))
            .collect());
    }

    // No step carries text. Loose text outside any element becomes a single
    // action; an empty container means the steps were cleared.
    let text = payload_text(&loose_text, true);
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Step::new(text, String::new())])
}

/// Decode steps markup into structured steps.
///
/// Never fails: malformed markup degrades to a single diagnostic step, and
/// markup without step elements becomes one step whose action is the whole
/// text. Empty markup, or a step container with no text in it, yields no
/// steps.
pub fn decode_markup(markup: &str) -> Vec<Step> {
    if markup.trim().is_empty() {
        return Vec::new();
    }

    match parse(markup) {
        Ok(steps) => steps,
        Err(e) => {
            tracing::warn!("Steps markup could not be decoded: {}", e);
            vec![Step::new(
                format!("Steps could not be processed: {}", e),
                DEFAULT_EXPECTED_RESULT.to_string(),
            )]
        }
    }
}

/// Render steps into the per-step wrapped markup shape.
pub fn render_markup(steps: &[Step]) -> String {
    let mut out = format!(r#"<steps id="0" last="{}">"#, steps.len());
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!(
            concat!(
                r#"<step id="{}" type="ValidateStep">"#,
                r#"<parameterizedString isformatted="false">{}</parameterizedString>"#,
                r#"<parameterizedString isformatted="false">{}</parameterizedString>"#,
                "<description/></step>"
            ),
            i + 1,
            escape(&step.action),
            escape(&step.expected_result),
        ));
    }
    out.push_str("</steps>");
    out
}
