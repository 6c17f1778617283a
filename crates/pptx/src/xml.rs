//! Event-buffered XML parts.
//!
//! A part is held as the flat list of events quick-xml produced. Untouched
//! events are written back as-is, so anything the stripper does not remove
//! keeps its exact markup (attribute order, namespace prefixes, whitespace).

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashSet;
use std::ops::Range;
use unmark_core::{Error, Result};

/// Inclusive range of event indices covering one element.
///
/// For an empty element (`<a:off/>`) `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Whether `other` lies inside this span (or is this span).
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    fn contains_index(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }
}

/// One XML part of a package, held as owned events.
#[derive(Debug, Clone)]
pub struct XmlPart {
    name: String,
    events: Vec<Event<'static>>,
    /// For each `Start` event, the index of its matching `End`; every other event maps to itself.
    pairs: Vec<usize>,
}

impl XmlPart {
    /// Parse a part. Malformed markup is reported as a corrupt document.
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| Error::CorruptDocument(format!("'{}' is not valid UTF-8: {}", name, e)))?;

        let mut reader = Reader::from_str(content);
        // Keep whitespace text so untouched content round-trips
        reader.trim_text(false);

        let mut events = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(event) => events.push(event.into_owned()),
                Err(e) => {
                    return Err(Error::CorruptDocument(format!(
                        "XML error in '{}' at byte {}: {}",
                        name,
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        let pairs = match_pairs(name, &events)?;

        Ok(Self {
            name: name.to_string(),
            events,
            pairs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All elements with the given local name, in document order.
    pub fn elements(&self, local: &[u8]) -> Vec<Span> {
        self.collect_elements(0..self.events.len(), local)
    }

    /// Elements with the given local name strictly inside `scope`.
    pub fn elements_in(&self, scope: Span, local: &[u8]) -> Vec<Span> {
        self.collect_elements(scope.start + 1..scope.end, local)
    }

    /// Direct child elements of `parent`.
    pub fn children(&self, parent: Span) -> Vec<Span> {
        let mut children = Vec::new();
        let mut i = parent.start + 1;
        while i < parent.end {
            if self.is_element(i) {
                let span = self.span_at(i);
                children.push(span);
                i = span.end + 1;
            } else {
                i += 1;
            }
        }
        children
    }

    /// Local name of the element starting a span.
    pub fn local_name_of(&self, span: Span) -> Option<&[u8]> {
        self.start_tag(span.start)
            .map(|e| local_name(e.name().into_inner()))
    }

    /// Value of the first attribute on the span's start tag whose local name matches.
    pub fn attribute(&self, span: Span, local: &[u8]) -> Option<String> {
        self.start_tag(span.start).and_then(|e| attribute_value(e, local))
    }

    /// Value of a namespace-prefixed attribute (`r:id`, `r:embed`) on the span's start tag.
    ///
    /// Elements like `p:sldId` carry both a plain `id` and an `r:id`; only the
    /// prefixed one is a relationship id.
    pub fn relationship_attribute(&self, span: Span, local: &[u8]) -> Option<String> {
        let tag = self.start_tag(span.start)?;
        tag.attributes()
            .flatten()
            .find(|attr| {
                let key = attr.key.as_ref();
                key.contains(&b':') && !key.starts_with(b"xmlns") && local_name(key) == local
            })
            .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
    }

    /// Concatenated text of every `text_local` element inside `span`.
    pub fn text_of(&self, span: Span, text_local: &[u8]) -> String {
        let mut text = String::new();
        for inner in self.elements_in(span, text_local) {
            for event in &self.events[inner.start..=inner.end] {
                match event {
                    Event::Text(t) => text.push_str(&t.unescape().unwrap_or_default()),
                    Event::CData(c) => text.push_str(&String::from_utf8_lossy(c)),
                    _ => {}
                }
            }
        }
        text
    }

    /// Values of all namespace-prefixed attributes outside the removed spans.
    ///
    /// Relationship ids (`r:id`, `r:embed`, `r:link`) are always prefixed, so
    /// this is the set of ids the remaining markup still points at.
    pub fn prefixed_attribute_values(&self, removed: &[Span]) -> HashSet<String> {
        let mut values = HashSet::new();
        for i in 0..self.events.len() {
            if removed.iter().any(|s| s.contains_index(i)) {
                continue;
            }
            let Some(tag) = self.start_tag(i) else {
                continue;
            };
            for attr in tag.attributes().flatten() {
                let key = attr.key.as_ref();
                if key.starts_with(b"xmlns") || !key.contains(&b':') {
                    continue;
                }
                if let Ok(value) = attr.unescape_value() {
                    values.insert(value.into_owned());
                }
            }
        }
        values
    }

    /// Replace the content of every non-empty `local` element with `text`.
    ///
    /// Returns how many elements were rewritten.
    pub fn set_element_text(&mut self, local: &[u8], text: &str) -> Result<usize> {
        let targets: Vec<Span> = self
            .elements(local)
            .into_iter()
            .filter(|s| s.start != s.end)
            .collect();
        if targets.is_empty() {
            return Ok(0);
        }

        let mut events = Vec::with_capacity(self.events.len());
        let mut next = 0;
        for span in &targets {
            if span.start < next {
                // Nested inside an element we already rewrote
                continue;
            }
            events.extend(self.events[next..=span.start].iter().cloned());
            if !text.is_empty() {
                events.push(Event::Text(BytesText::new(text).into_owned()));
            }
            next = span.end;
        }
        events.extend(self.events[next..].iter().cloned());

        self.pairs = match_pairs(&self.name, &events)?;
        self.events = events;
        Ok(targets.len())
    }

    /// Serialize the part, leaving out every removed span.
    pub fn serialize(&self, removed: &[Span]) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::with_capacity(self.events.len() * 32));
        for (i, event) in self.events.iter().enumerate() {
            if removed.iter().any(|s| s.contains_index(i)) {
                continue;
            }
            writer
                .write_event(event)
                .map_err(|e| Error::WriteError(format!("Failed to write '{}': {}", self.name, e)))?;
        }
        Ok(writer.into_inner())
    }

    fn collect_elements(&self, range: Range<usize>, local: &[u8]) -> Vec<Span> {
        range
            .filter(|&i| {
                self.start_tag(i)
                    .is_some_and(|e| local_name(e.name().as_ref()) == local)
            })
            .map(|i| self.span_at(i))
            .collect()
    }

    fn is_element(&self, index: usize) -> bool {
        matches!(self.events.get(index), Some(Event::Start(_)) | Some(Event::Empty(_)))
    }

    fn span_at(&self, index: usize) -> Span {
        Span {
            start: index,
            end: self.pairs[index],
        }
    }

    fn start_tag(&self, index: usize) -> Option<&BytesStart<'static>> {
        match self.events.get(index) {
            Some(Event::Start(e)) | Some(Event::Empty(e)) => Some(e),
            _ => None,
        }
    }
}

/// Pair every start tag with its end tag, rejecting unbalanced markup.
fn match_pairs(name: &str, events: &[Event<'static>]) -> Result<Vec<usize>> {
    let mut pairs: Vec<usize> = (0..events.len()).collect();
    let mut open: Vec<usize> = Vec::new();

    for (i, event) in events.iter().enumerate() {
        match event {
            Event::Start(_) => open.push(i),
            Event::End(_) => {
                let start = open.pop().ok_or_else(|| {
                    Error::CorruptDocument(format!("Unexpected closing tag in '{}'", name))
                })?;
                pairs[start] = i;
            }
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(Error::CorruptDocument(format!(
            "'{}' ends with {} unclosed element(s)",
            name,
            open.len()
        )));
    }

    Ok(pairs)
}

/// Value of the first attribute whose local name matches, unescaped.
pub fn attribute_value(tag: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    tag.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == local)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Extract the local name from a potentially namespaced XML element name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}
