//! Allowlist sanitizer for article markup.
//!
//! Only formatting and structural tags survive. Elements that can execute or
//! embed code are removed together with their content, all attributes outside
//! a small per-tag allowlist are dropped (this removes every `on*` handler and
//! inline `style`), and links keep their `href` only for http(s), mailto and
//! relative targets. Other unknown tags are unwrapped: the tag goes, the text
//! inside stays.
//!
//! When the input ends inside a tag, comment, quoted attribute value or a
//! dropped element, everything from that point on is discarded. Input that is
//! not text at all (it contains NUL bytes) is rejected with an error.

use tracing::trace;

use crate::domain::FeedError;

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "cite", "code", "dd", "del", "div", "dl", "dt", "em",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "ins", "li", "mark", "ol", "p", "pre", "q", "s",
    "small", "span", "strike", "strong", "sub", "sup", "table", "tbody", "td", "th", "thead", "tr",
    "u", "ul",
];

// Removed together with everything up to their closing tag
const DROP_CONTENT_TAGS: &[&str] = &[
    "script", "style", "iframe", "frame", "frameset", "object", "embed", "applet", "noscript",
    "noembed", "noframes", "template", "textarea", "title", "xmp", "svg", "math", "select",
    "option",
];

const VOID_TAGS: &[&str] = &["br", "hr"];

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

fn allowed_attribute(tag: &str, attr: &str) -> bool {
    matches!(
        (tag, attr),
        ("a", "href")
            | ("a", "title")
            | ("abbr", "title")
            | ("ol", "start")
            | ("td", "colspan")
            | ("td", "rowspan")
            | ("th", "colspan")
            | ("th", "rowspan")
    )
}

/// Sanitize `input`, returning markup that only contains allowed tags.
pub fn sanitize(input: &str) -> Result<String, FeedError> {
    if input.contains('\0') {
        return Err(FeedError::Sanitize("content contains NUL bytes".into()));
    }
    let out = Sanitizer::new(input).run();
    trace!("Sanitized {} bytes of markup into {} bytes", input.len(), out.len());
    Ok(out)
}

/// Escape text so it is never interpreted as markup.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

struct Tag {
    name: String,
    closing: bool,
    attributes: Vec<(String, String)>,
}

struct Sanitizer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    out: String,
}

impl<'a> Sanitizer<'a> {
    fn new(input: &'a str) -> Self {
        Sanitizer {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            out: String::with_capacity(input.len()),
        }
    }

    fn run(mut self) -> String {
        while self.pos < self.bytes.len() {
            let next_tag = self.bytes[self.pos..]
                .iter()
                .position(|&b| b == b'<')
                .map(|p| self.pos + p)
                .unwrap_or(self.bytes.len());
            self.out.push_str(&self.input[self.pos..next_tag]);
            self.pos = next_tag;
            if self.pos < self.bytes.len() && self.markup().is_none() {
                trace!(
                    "Dropped {} bytes of unterminated markup",
                    self.bytes.len() - self.pos
                );
                break;
            }
        }
        self.out
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn starts_with_ignore_case(&self, at: usize, needle: &str) -> bool {
        self.bytes
            .get(at..at + needle.len())
            .map(|s| s.eq_ignore_ascii_case(needle.as_bytes()))
            .unwrap_or(false)
    }

    fn find(&self, from: usize, needle: &str) -> Option<usize> {
        self.input
            .get(from..)
            .and_then(|rest| rest.find(needle))
            .map(|p| from + p)
    }

    // self.pos is on a '<'. None when the input ends before the markup does.
    fn markup(&mut self) -> Option<()> {
        match self.peek(1) {
            Some(b'!') => {
                if self.starts_with_ignore_case(self.pos, "<!--") {
                    let end = self.find(self.pos + 4, "-->")?;
                    self.pos = end + 3;
                } else {
                    self.skip_declaration()?;
                }
            }
            Some(b'?') => self.skip_declaration()?,
            Some(b'/') if self.peek(2).is_some_and(|b| b.is_ascii_alphabetic()) => {
                let tag = self.tag()?;
                self.emit(tag)?;
            }
            Some(b) if b.is_ascii_alphabetic() => {
                let tag = self.tag()?;
                self.emit(tag)?;
            }
            _ => {
                self.out.push_str("&lt;");
                self.pos += 1;
            }
        }
        Some(())
    }

    fn skip_declaration(&mut self) -> Option<()> {
        let end = self.find(self.pos, ">")?;
        self.pos = end + 1;
        Some(())
    }

    fn tag(&mut self) -> Option<Tag> {
        self.pos += 1;
        let closing = self.peek(0) == Some(b'/');
        if closing {
            self.pos += 1;
        }
        let name = self.name();
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek(0) {
                None => return None,
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => self.pos += 1,
                Some(_) => {
                    let attr = self.name();
                    if attr.is_empty() {
                        // Stray quote or '=' without a name
                        self.pos += 1;
                        continue;
                    }
                    self.skip_whitespace();
                    let value = if self.peek(0) == Some(b'=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        self.attribute_value()?
                    } else {
                        String::new()
                    };
                    attributes.push((attr, value));
                }
            }
        }
        Some(Tag {
            name,
            closing,
            attributes,
        })
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek(0) {
            if b.is_ascii_whitespace() || matches!(b, b'>' | b'/' | b'=' | b'"' | b'\'' | b'<') {
                break;
            }
            self.pos += 1;
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    fn attribute_value(&mut self) -> Option<String> {
        match self.peek(0) {
            Some(q @ (b'"' | b'\'')) => {
                let quote = if q == b'"' { "\"" } else { "'" };
                let start = self.pos + 1;
                let end = self.find(start, quote)?;
                self.pos = end + 1;
                Some(self.input[start..end].to_string())
            }
            _ => {
                let start = self.pos;
                while let Some(b) = self.peek(0) {
                    if b.is_ascii_whitespace() || b == b'>' {
                        break;
                    }
                    self.pos += 1;
                }
                Some(self.input[start..self.pos].to_string())
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek(0).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn emit(&mut self, tag: Tag) -> Option<()> {
        let name = tag.name.as_str();
        if DROP_CONTENT_TAGS.contains(&name) {
            if !tag.closing {
                self.skip_element_body(name)?;
            }
            trace!("Dropped <{name}> element");
            return Some(());
        }
        if !ALLOWED_TAGS.contains(&name) {
            return Some(());
        }
        if tag.closing {
            if !VOID_TAGS.contains(&name) {
                self.out.push_str("</");
                self.out.push_str(name);
                self.out.push('>');
            }
            return Some(());
        }
        self.out.push('<');
        self.out.push_str(name);
        for (attr, value) in tag.attributes.iter() {
            if !allowed_attribute(name, attr) {
                continue;
            }
            if attr == "href" && !safe_url(value) {
                trace!("Dropped unsafe href {value:?}");
                continue;
            }
            self.out.push(' ');
            self.out.push_str(attr);
            self.out.push_str("=\"");
            self.out.push_str(&escape_text(&decode_entities(value)));
            self.out.push('"');
        }
        self.out.push('>');
        Some(())
    }

    fn skip_element_body(&mut self, name: &str) -> Option<()> {
        let closing = format!("</{name}");
        let mut at = self.pos;
        loop {
            let candidate = self.find(at, "</")?;
            let after = candidate + closing.len();
            let boundary = self
                .bytes
                .get(after)
                .is_none_or(|b| b.is_ascii_whitespace() || matches!(b, b'>' | b'/'));
            if self.starts_with_ignore_case(candidate, &closing) && boundary {
                let end = self.find(after, ">")?;
                self.pos = end + 1;
                return Some(());
            }
            at = candidate + 2;
        }
    }
}

pub(crate) fn decode_entities(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let window = rest
            .char_indices()
            .nth(12)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let Some(semi) = rest[..window].find(';') else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "colon" => Some(':'),
            "tab" => Some('\t'),
            "newline" => Some('\n'),
            e if e.starts_with("#x") || e.starts_with("#X") => u32::from_str_radix(&e[2..], 16)
                .ok()
                .and_then(char::from_u32),
            e if e.starts_with('#') => e[1..].parse::<u32>().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn safe_url(raw: &str) -> bool {
    // Browsers ignore whitespace and control characters inside the scheme
    let url: String = decode_entities(raw)
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    match url.find(|c| matches!(c, ':' | '/' | '?' | '#')) {
        Some(idx) if url[idx..].starts_with(':') => SAFE_SCHEMES.contains(&&url[..idx]),
        _ => true,
    }
}
