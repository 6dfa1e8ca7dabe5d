//! Escaping for text embedded in the steps markup.
//!
//! Every conversion between raw step text and markup payload text goes through
//! this module, so callers never see half-escaped strings.

/// Escape the five markup control characters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape`], also accepting numeric character references and `&nbsp;`.
///
/// An ampersand that does not start a recognised entity is kept literally.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        match decode_entity(candidate) {
            Some((decoded, consumed)) => {
                out.push(decoded);
                rest = &candidate[consumed..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode the entity at the start of `text` (which begins with `&`).
/// Returns the character and the number of bytes consumed, including `;`.
fn decode_entity(text: &str) -> Option<(char, usize)> {
    // Longest entity we accept is `&#x10FFFF;`
    let end = text.char_indices().take(12).find(|(_, c)| *c == ';')?.0;
    let name = &text[1..end];

    let decoded = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "apos" => '\'',
        "quot" => '"',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            match char::from_u32(code)? {
                '\u{a0}' => ' ',
                c => c,
            }
        }
    };

    Some((decoded, end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_control_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom's & Jerry</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom&apos;s &amp; Jerry&lt;/a&gt;"
        );
    }

    #[test]
    fn test_unescape_reverses_escape() {
        let text = r#"if a < b && c > "d" then 'e'"#;
        assert_eq!(unescape(&escape(text)), text);
    }

    #[test]
    fn test_unescape_numeric_references() {
        assert_eq!(unescape("&#60;tag&#x3E;"), "<tag>");
        assert_eq!(unescape("a&nbsp;b"), "a b");
        assert_eq!(unescape("a&#160;b"), "a b");
    }

    #[test]
    fn test_unescape_keeps_stray_ampersand() {
        assert_eq!(unescape("AT&T rocks"), "AT&T rocks");
        assert_eq!(unescape("fish & chips;"), "fish & chips;");
        assert_eq!(unescape("trailing &"), "trailing &");
        assert_eq!(unescape("&bogus;"), "&bogus;");
    }
}
