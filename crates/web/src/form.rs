//! Decoding of query strings and form bodies into a keyword map.
//!
//! Repeated keys keep the first value. Multipart bodies yield only their
//! text fields: file parts carry a `filename` disposition parameter and are
//! skipped, matching what the binder consumes from form posts.

use serde_json::{Map, Value};

/// Decodes `application/x-www-form-urlencoded` input (also used for query
/// strings). First value wins for repeated keys.
pub fn parse_urlencoded(input: &[u8]) -> Map<String, Value> {
    let mut values = Map::new();
    for (key, value) in form_urlencoded::parse(input) {
        values.entry(key.into_owned()).or_insert_with(|| Value::String(value.into_owned()));
    }
    values
}

/// Extracts the boundary parameter from a parsed `multipart/form-data` mime.
pub fn multipart_boundary(mime: &mime::Mime) -> Option<String> {
    mime.get_param(mime::BOUNDARY).map(|b| b.as_str().to_string())
}

/// Decodes the text fields of a `multipart/form-data` body. First value wins
/// for repeated names; parts without a `name` and file parts are skipped.
pub fn parse_multipart_fields(body: &[u8], boundary: &str) -> Map<String, Value> {
    let mut values = Map::new();
    let delimiter = format!("--{boundary}");

    for part in split_parts(body, delimiter.as_bytes()) {
        let Some((headers, content)) = split_headers(part) else { continue };
        let Some(disposition) = content_disposition(headers) else { continue };
        if disposition_param(disposition, "filename").is_some() {
            continue;
        }
        let Some(name) = disposition_param(disposition, "name") else { continue };
        let text = String::from_utf8_lossy(content).into_owned();
        values.entry(name.to_string()).or_insert_with(|| Value::String(text));
    }

    values
}

/// Splits the body at every boundary line, dropping the preamble, the final
/// `--` terminator and the CRLF framing around each part.
fn split_parts<'b>(body: &'b [u8], delimiter: &[u8]) -> Vec<&'b [u8]> {
    let mut parts = Vec::new();
    let mut rest = body;

    // preamble up to the first delimiter
    let Some(start) = find(rest, delimiter) else { return parts };
    rest = &rest[start + delimiter.len()..];

    loop {
        if rest.starts_with(b"--") {
            break;
        }
        rest = strip_crlf(rest);
        match find(rest, delimiter) {
            Some(end) => {
                let mut part = &rest[..end];
                // the CRLF before the next delimiter belongs to the framing
                if part.ends_with(b"\r\n") {
                    part = &part[..part.len() - 2];
                }
                parts.push(part);
                rest = &rest[end + delimiter.len()..];
            }
            None => break,
        }
    }

    parts
}

fn split_headers(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let split_at = find(part, b"\r\n\r\n")?;
    Some((&part[..split_at], &part[split_at + 4..]))
}

fn content_disposition(headers: &[u8]) -> Option<&str> {
    for line in std::str::from_utf8(headers).ok()?.split("\r\n") {
        let (name, value) = line.split_once(':')?;
        if name.eq_ignore_ascii_case("content-disposition") {
            return Some(value.trim());
        }
    }
    None
}

/// Reads a `key="value"` or bare `key=value` parameter out of a
/// Content-Disposition header value.
fn disposition_param<'h>(disposition: &'h str, key: &str) -> Option<&'h str> {
    disposition.split(';').map(str::trim).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        (name.eq_ignore_ascii_case(key)).then(|| value.trim_matches('"'))
    })
}

fn strip_crlf(input: &[u8]) -> &[u8] {
    input.strip_prefix(b"\r\n").unwrap_or(input)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
