use crate::transaction::LedgerDate;
use crate::{LedgerError, Result};

use pest::iterators::{Pair, Pairs};
use pest::Parser;

use std::borrow::Cow;

#[derive(Parser)]
#[grammar = "ledger.pest"]
pub struct LedgerParser;

/// `(major, minor, patch)` as reported by `ledger --version`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Parse the first line of a version banner. Anything after the patch
/// number (build suffixes, tagline) is ignored.
pub fn parse_version(banner: &str) -> Result<Version> {
    let first_line = banner.lines().next().unwrap_or_default();
    let unparseable = || LedgerError::VersionParse(first_line.to_string());

    let banner = LedgerParser::parse(Rule::version_banner, first_line)
        .map_err(|_| unparseable())?
        .next()
        .ok_or_else(unparseable)?;

    let mut version = Version::default();
    for part in banner.into_inner() {
        let slot = match part.as_rule() {
            Rule::major => &mut version.major,
            Rule::minor => &mut version.minor,
            Rule::patch => &mut version.patch,
            _ => continue,
        };
        *slot = part.as_str().parse().map_err(|_| unparseable())?;
    }

    Ok(version)
}

/// Parse ledger's written date format, `Y/M/D`. Years run up to 9999,
/// months 1-12 and days 1-31; the day is not checked against the month.
pub fn parse_date(text: &str) -> Result<LedgerDate> {
    let trimmed = text.trim();
    let invalid = || LedgerError::DateParse(text.to_string());

    let date = LedgerParser::parse(Rule::ledger_date, trimmed)
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)?;

    let mut fields = date.into_inner().filter(|p| p.as_rule() != Rule::EOI);
    let mut next_field = || -> Result<u32> {
        fields
            .next()
            .ok_or_else(invalid)?
            .as_str()
            .parse()
            .map_err(|_| invalid())
    };

    let year = next_field()?;
    let month = next_field()?;
    let day = next_field()?;
    if year > 9999 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid());
    }

    Ok(LedgerDate {
        year: i32::try_from(year).map_err(|_| invalid())?,
        month,
        day,
    })
}

/// One step of the markup stream.
#[derive(Clone, Debug, PartialEq)]
pub enum XmlEvent<'x> {
    Start {
        name: &'x str,
        attributes: Vec<(&'x str, Cow<'x, str>)>,
    },
    /// A fragment of character data. One element's text may arrive as
    /// several fragments.
    Text(Cow<'x, str>),
    End {
        name: &'x str,
    },
}

impl<'x> XmlEvent<'x> {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            XmlEvent::Start { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_ref()),
            _ => None,
        }
    }
}

struct Level<'x> {
    name: Option<&'x str>,
    children: Pairs<'x, Rule>,
}

enum Cursor<'x> {
    Unparsed(&'x str),
    Walking(Vec<Level<'x>>),
    Finished,
}

/// Lazy walk over a parsed document, yielding start/text/end events in
/// document order. Exhaustion is end-of-stream; a syntax error is yielded
/// once and then the iterator is finished.
pub struct XmlEvents<'x> {
    cursor: Cursor<'x>,
    pending_end: Option<&'x str>,
}

pub fn xml_events(input: &str) -> XmlEvents<'_> {
    XmlEvents {
        cursor: Cursor::Unparsed(input),
        pending_end: None,
    }
}

impl<'x> XmlEvents<'x> {
    fn start(&mut self, element: Pair<'x, Rule>) -> Result<XmlEvent<'x>> {
        let mut inner = element.into_inner();
        let tag = inner
            .next()
            .ok_or_else(|| LedgerError::XmlSyntax("element without a tag".to_string()))?;
        let is_empty = tag.as_rule() == Rule::empty_tag;

        let mut tag_parts = tag.into_inner();
        let name = tag_parts
            .next()
            .ok_or_else(|| LedgerError::XmlSyntax("tag without a name".to_string()))?
            .as_str();

        let mut attributes = Vec::new();
        for attribute in tag_parts {
            let mut kv = attribute.into_inner();
            let (Some(key), Some(value)) = (kv.next(), kv.next()) else {
                return Err(LedgerError::XmlSyntax(format!(
                    "incomplete attribute on <{}>",
                    name
                )));
            };
            attributes.push((key.as_str(), unescape(value.as_str())?));
        }

        if is_empty {
            self.pending_end = Some(name);
        } else if let Cursor::Walking(stack) = &mut self.cursor {
            stack.push(Level {
                name: Some(name),
                children: inner,
            });
        }

        Ok(XmlEvent::Start { name, attributes })
    }

    fn step(&mut self) -> Option<Result<XmlEvent<'x>>> {
        if let Some(name) = self.pending_end.take() {
            return Some(Ok(XmlEvent::End { name }));
        }

        loop {
            match &mut self.cursor {
                Cursor::Finished => return None,
                Cursor::Unparsed(input) => match LedgerParser::parse(Rule::document, *input) {
                    Ok(mut pairs) => {
                        let children = match pairs.next() {
                            Some(document) => document.into_inner(),
                            None => pairs,
                        };
                        self.cursor = Cursor::Walking(vec![Level {
                            name: None,
                            children,
                        }]);
                    }
                    Err(err) => {
                        self.cursor = Cursor::Finished;
                        return Some(Err(LedgerError::XmlSyntax(err.to_string())));
                    }
                },
                Cursor::Walking(stack) => {
                    let level = stack.last_mut()?;
                    let Some(pair) = level.children.next() else {
                        let closed = stack.pop().and_then(|level| level.name);
                        match closed {
                            Some(name) => return Some(Ok(XmlEvent::End { name })),
                            None => {
                                self.cursor = Cursor::Finished;
                                return None;
                            }
                        }
                    };

                    match pair.as_rule() {
                        Rule::element => return Some(self.start(pair)),
                        Rule::chardata => return Some(Ok(XmlEvent::Text(pair.as_str().into()))),
                        Rule::reference => return Some(resolve_reference(pair).map(XmlEvent::Text)),
                        Rule::cdata => {
                            let text = pair.into_inner().next().map_or("", |t| t.as_str());
                            return Some(Ok(XmlEvent::Text(text.into())));
                        }
                        _ => continue,
                    }
                }
            }
        }
    }
}

impl<'x> Iterator for XmlEvents<'x> {
    type Item = Result<XmlEvent<'x>>;

    fn next(&mut self) -> Option<Self::Item> {
        let event = self.step();
        if matches!(event, Some(Err(_))) {
            self.cursor = Cursor::Finished;
            self.pending_end = None;
        }
        event
    }
}

fn resolve_reference(reference: Pair<'_, Rule>) -> Result<Cow<'static, str>> {
    let raw = reference.as_str();
    let target = reference
        .into_inner()
        .next()
        .ok_or_else(|| LedgerError::XmlSyntax(format!("empty reference {}", raw)))?;

    let resolved = match target.as_rule() {
        Rule::char_ref => {
            let digits = target.as_str();
            let code = match digits.strip_prefix("#x") {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => digits.trim_start_matches('#').parse(),
            };
            code.ok()
                .and_then(char::from_u32)
                .map(String::from)
                .map(Cow::Owned)
        }
        _ => predefined_entity(target.as_str()).map(Cow::Borrowed),
    };

    resolved.ok_or_else(|| LedgerError::XmlSyntax(format!("unknown reference {}", raw)))
}

fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        _ => None,
    }
}

/// Resolve references inside an attribute value.
fn unescape(value: &str) -> Result<Cow<'_, str>> {
    if !value.contains('&') {
        return Ok(Cow::Borrowed(value));
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let semi = tail
            .find(';')
            .ok_or_else(|| LedgerError::XmlSyntax(format!("unterminated reference in '{}'", value)))?;
        let reference = LedgerParser::parse(Rule::reference, &tail[..=semi])
            .map_err(|err| LedgerError::XmlSyntax(err.to_string()))?
            .next()
            .ok_or_else(|| LedgerError::XmlSyntax(format!("bad reference in '{}'", value)))?;
        out.push_str(&resolve_reference(reference)?);
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);

    Ok(Cow::Owned(out))
}
