//! Minimal CSS selector matching for the mirror document
//!
//! Supports comma-separated compound selectors built from a tag name, `#id`,
//! `.class`, `[attr]`, `[attr="v"]` and `[attr^="v"]`. Combinators are not
//! needed for the host structures we look for.

use anyhow::{Result, anyhow, bail};

use super::dom::Element;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrTest {
    Exists(String),
    Equals(String, String),
    Prefix(String, String),
}

impl AttrTest {
    fn matches(&self, element: &Element) -> bool {
        match self {
            AttrTest::Exists(name) => element.attr(name).is_some(),
            AttrTest::Equals(name, value) => element.attr(name) == Some(value.as_str()),
            AttrTest::Prefix(name, prefix) => element
                .attr(name)
                .is_some_and(|v| v.starts_with(prefix.as_str())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag
            && !element.tag.eq_ignore_ascii_case(tag)
        {
            return false;
        }
        if let Some(id) = &self.id
            && element.attr("id") != Some(id.as_str())
        {
            return false;
        }
        self.classes.iter().all(|c| element.has_class(c))
            && self.attrs.iter().all(|a| a.matches(element))
    }
}

/// A parsed selector list; matches when any of its compounds matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    compounds: Vec<Compound>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self> {
        let compounds = input
            .split(',')
            .map(|part| parse_compound(part.trim()))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| anyhow!("Invalid selector '{}': {}", input, e))?;
        Ok(Self { compounds })
    }

    /// Parse several selector strings into one list
    pub fn parse_all(inputs: &[&str]) -> Result<Self> {
        let mut compounds = Vec::new();
        for input in inputs {
            compounds.extend(Self::parse(input)?.compounds);
        }
        Ok(Self { compounds })
    }

    pub fn matches(&self, element: &Element) -> bool {
        self.compounds.iter().any(|c| c.matches(element))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        ident.push(c);
        chars.next();
    }
    ident
}

fn parse_compound(input: &str) -> Result<Compound> {
    let mut compound = Compound::default();
    let mut chars = input.chars().peekable();

    if chars.peek().is_some_and(|c| is_ident_char(*c)) {
        compound.tag = Some(take_ident(&mut chars).to_ascii_lowercase());
    }

    while let Some(c) = chars.next() {
        match c {
            '#' => {
                let id = take_ident(&mut chars);
                if id.is_empty() {
                    bail!("empty id");
                }
                compound.id = Some(id);
            }
            '.' => {
                let class = take_ident(&mut chars);
                if class.is_empty() {
                    bail!("empty class");
                }
                compound.classes.push(class);
            }
            '[' => compound.attrs.push(parse_attr(&mut chars)?),
            other => bail!("unexpected character '{}'", other),
        }
    }

    if compound.is_empty() {
        bail!("empty selector");
    }
    Ok(compound)
}

fn parse_attr(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<AttrTest> {
    let name = take_ident(chars);
    if name.is_empty() {
        bail!("empty attribute name");
    }

    let prefix = match chars.next() {
        Some(']') => return Ok(AttrTest::Exists(name)),
        Some('=') => false,
        Some('^') if chars.next() == Some('=') => true,
        other => bail!("unexpected {:?} in attribute selector", other),
    };

    let value = match chars.peek().copied() {
        Some(quote @ ('"' | '\'')) => {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some(c) if c == quote => break,
                    Some(c) => value.push(c),
                    None => bail!("unterminated attribute value"),
                }
            }
            value
        }
        _ => take_ident(chars),
    };

    if chars.next() != Some(']') {
        bail!("missing ']'");
    }

    Ok(if prefix {
        AttrTest::Prefix(name, value)
    } else {
        AttrTest::Equals(name, value)
    })
}
