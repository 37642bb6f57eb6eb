//! Lightweight scanning of serialized message markup
//!
//! Message bodies travel as inner-markup fragments. Only two things are ever
//! read back out of them: the plain text and the inline images.

use crate::constants::policy::SPECIAL_IMAGE_CLASSES;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Image { alt: Option<String>, classes: Vec<String> },
}

/// Split a fragment into text runs and inline images; other tags are dropped
pub fn segments(fragment: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut text = String::new();
    let mut rest = fragment;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let after = &rest[open..];
        let Some(close) = find_tag_end(after) else {
            // unterminated tag: keep it as literal text
            text.push_str(after);
            rest = "";
            break;
        };
        let tag = &after[1..close];
        if let Some(image) = parse_image(tag) {
            flush_text(&mut text, &mut out);
            out.push(image);
        }
        rest = &after[close + 1..];
    }
    text.push_str(rest);
    flush_text(&mut text, &mut out);
    out
}

/// Plain text of a fragment with markup removed and entities decoded
pub fn strip_tags(fragment: &str) -> String {
    segments(fragment)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Text(t) => Some(t),
            Segment::Image { .. } => None,
        })
        .collect()
}

/// True when the fragment carries an emote/sticker image
pub fn has_special_image(fragment: &str) -> bool {
    segments(fragment).iter().any(|s| match s {
        Segment::Image { classes, .. } => classes
            .iter()
            .any(|c| SPECIAL_IMAGE_CLASSES.contains(&c.as_str())),
        Segment::Text(_) => false,
    })
}

fn flush_text(text: &mut String, out: &mut Vec<Segment>) {
    if !text.is_empty() {
        out.push(Segment::Text(decode_entities(text)));
        text.clear();
    }
}

/// Index of the `>` closing a tag that starts at byte 0, honoring quoted values
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in tag.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_image(tag: &str) -> Option<Segment> {
    let name_end = tag
        .find(|c: char| c.is_ascii_whitespace() || c == '/')
        .unwrap_or(tag.len());
    if !tag[..name_end].eq_ignore_ascii_case("img") {
        return None;
    }
    let attrs = parse_attributes(&tag[name_end..]);
    let lookup = |name: &str| {
        attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| decode_entities(v))
    };
    let classes = lookup("class")
        .map(|c| c.split_ascii_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    Some(Segment::Image {
        alt: lookup("alt").filter(|a| !a.is_empty()),
        classes,
    })
}

fn parse_attributes(input: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_ascii_whitespace() || *c == '/') {
            chars.next();
        }
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_whitespace() || c == '=' || c == '/' {
                break;
            }
            name.push(c);
            chars.next();
        }
        if name.is_empty() {
            break;
        }
        while chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            chars.next();
        }
        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            while chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                chars.next();
            }
            match chars.peek().copied() {
                Some(q @ ('"' | '\'')) => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == q {
                            break;
                        }
                        value.push(c);
                    }
                }
                _ => {
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_whitespace() {
                            break;
                        }
                        value.push(c);
                        chars.next();
                    }
                }
            }
        }
        attrs.push((name, value));
    }
    attrs
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
