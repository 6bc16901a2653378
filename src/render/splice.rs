use html_escape::encode_double_quoted_attribute;

use crate::app::{ChirpError, Result};
use crate::domain::LinkSpan;

/// Wrap each span of `text` in an anchor pointing at its target.
///
/// Text outside the spans is copied through byte for byte. Spans are applied
/// in `start` order regardless of how they are supplied; they must not overlap.
pub fn splice(text: &str, spans: &[LinkSpan]) -> Result<String> {
    if spans.is_empty() {
        return Ok(text.to_string());
    }

    let mut ordered: Vec<&LinkSpan> = spans.iter().collect();
    ordered.sort_by_key(|span| span.start);

    let mut out = String::with_capacity(text.len() + spans.len() * 32);
    let mut cursor = 0;

    for span in ordered {
        validate(text, span, cursor)?;

        out.push_str(&text[cursor..span.start]);
        out.push_str("<a href=\"");
        out.push_str(&encode_double_quoted_attribute(&span.target_url));
        out.push_str("\">");
        out.push_str(&text[span.start..span.end]);
        out.push_str("</a>");
        cursor = span.end;
    }

    out.push_str(&text[cursor..]);
    Ok(out)
}

fn validate(text: &str, span: &LinkSpan, cursor: usize) -> Result<()> {
    let invalid = |reason| ChirpError::InvalidSpan {
        start: span.start,
        end: span.end,
        len: text.len(),
        reason,
    };

    if span.start >= span.end {
        return Err(invalid("start must be before end"));
    }
    if span.end > text.len() {
        return Err(invalid("end is past the end of the text"));
    }
    if !text.is_char_boundary(span.start) || !text.is_char_boundary(span.end) {
        return Err(invalid("offset is not on a character boundary"));
    }
    if span.start < cursor {
        return Err(invalid("overlaps a preceding span"));
    }
    Ok(())
}
