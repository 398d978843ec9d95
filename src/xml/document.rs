use super::Tag;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, QName, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;
use std::borrow::Cow;

/// A parsed document: one root element plus whatever surrounds it.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    prolog: Vec<Event<'static>>,
    root: Element,
    epilog: Vec<Event<'static>>,
}

#[derive(Debug, Clone)]
pub struct Element {
    qname: String,
    namespace: Option<String>,
    /// Attribute values are kept escaped, exactly as they appear in the source.
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    self_closing: bool,
}

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Other(Event<'static>),
}

impl XmlDocument {
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut reader = NsReader::from_str(text);
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let (resolved, event) = reader.read_resolved_event().map_err(|err| err.to_string())?;
            let namespace = namespace_of(&resolved);
            match event {
                Event::Start(start) => stack.push(Element::from_start(&start, namespace, false)?),
                Event::Empty(start) => {
                    let element = Element::from_start(&start, namespace, true)?;
                    attach(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| "closing tag without an open element".to_string())?;
                    attach(element, &mut stack, &mut root)?;
                }
                Event::Eof => break,
                other => {
                    let owned = other.into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Other(owned));
                    } else if root.is_none() {
                        prolog.push(owned);
                    } else {
                        epilog.push(owned);
                    }
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed element <{}>", open.qname));
        }
        let root = root.ok_or_else(|| "document has no root element".to_string())?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// New document with an XML declaration ahead of `root`.
    pub fn with_declaration(root: Element) -> Self {
        Self {
            prolog: vec![
                Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
                Event::Text(BytesText::new("\n").into_owned()),
            ],
            root,
            epilog: vec![Event::Text(BytesText::new("\n").into_owned())],
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    #[cfg(test)]
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Follow `path` from the root, taking the first matching child at each level.
    #[cfg(test)]
    pub fn find(&self, path: &[Tag]) -> Option<&Element> {
        path.iter()
            .try_fold(&self.root, |element, tag| element.child(tag))
    }

    pub fn find_mut(&mut self, path: &[Tag]) -> Option<&mut Element> {
        let mut current = &mut self.root;
        for tag in path {
            current = current.child_mut(tag)?;
        }
        Some(current)
    }

    pub fn render(&self) -> Result<String, String> {
        let mut writer = Writer::new(Vec::new());
        for event in &self.prolog {
            writer
                .write_event(event.clone())
                .map_err(|err| err.to_string())?;
        }
        self.root.write(&mut writer)?;
        for event in &self.epilog {
            writer
                .write_event(event.clone())
                .map_err(|err| err.to_string())?;
        }
        String::from_utf8(writer.into_inner()).map_err(|err| err.to_string())
    }
}

impl Element {
    pub fn new(local: &str) -> Self {
        Self {
            qname: local.to_string(),
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: true,
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children
            .push(Node::Other(Event::Text(BytesText::new(text).into_owned())));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn local_name(&self) -> &str {
        self.qname
            .rsplit_once(':')
            .map_or(self.qname.as_str(), |(_, local)| local)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.qname.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn matches(&self, tag: &Tag) -> bool {
        self.local_name() == tag.local && self.namespace() == tag.namespace
    }

    /// Unescaped value of an attribute, looked up by its name as written.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, raw)| match unescape(raw) {
                Ok(value) => value.into_owned(),
                Err(_) => raw.clone(),
            })
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let escaped = escape(value).into_owned();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = escaped,
            None => self.attributes.push((name.to_string(), escaped)),
        }
    }

    #[cfg(test)]
    pub fn child(&self, tag: &Tag) -> Option<&Element> {
        self.elements().find(|element| element.matches(tag))
    }

    pub fn child_mut(&mut self, tag: &Tag) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.matches(tag) => Some(element),
            _ => None,
        })
    }

    #[cfg(test)]
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Other(_) => None,
        })
    }

    /// Concatenated, unescaped text content of this element's direct children.
    #[cfg(test)]
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            if let Node::Other(Event::Text(raw)) = node {
                let raw = String::from_utf8_lossy(raw);
                match unescape(&raw) {
                    Ok(value) => text.push_str(&value),
                    Err(_) => text.push_str(&raw),
                }
            }
        }
        text
    }

    /// Whitespace that precedes the first child element, used to indent new ones.
    pub(super) fn child_indent(&self) -> Option<String> {
        self.children.windows(2).find_map(|pair| match pair {
            [Node::Other(Event::Text(raw)), Node::Element(_)] if is_blank(raw) => {
                Some(String::from_utf8_lossy(raw).into_owned())
            }
            _ => None,
        })
    }

    /// Remove every child element matching `tag` along with the blank text
    /// directly in front of it.
    pub(super) fn remove_children(&mut self, tag: &Tag) -> Vec<Element> {
        let mut removed = Vec::new();
        let mut kept: Vec<Node> = Vec::with_capacity(self.children.len());
        for node in self.children.drain(..) {
            match node {
                Node::Element(element) if element.matches(tag) => {
                    if matches!(kept.last(), Some(Node::Other(Event::Text(raw))) if is_blank(raw))
                    {
                        kept.pop();
                    }
                    removed.push(element);
                }
                other => kept.push(other),
            }
        }
        self.children = kept;
        removed
    }

    /// Append `child` after the last existing content, before any trailing
    /// blank text that indents the closing tag.
    pub(super) fn append_child(&mut self, child: Element, indent: Option<&str>) {
        let trailing_blank =
            matches!(self.children.last(), Some(Node::Other(Event::Text(raw))) if is_blank(raw));
        let at = if trailing_blank {
            self.children.len() - 1
        } else {
            self.children.len()
        };
        let mut nodes = Vec::with_capacity(2);
        if let Some(indent) = indent {
            nodes.push(Node::Other(Event::Text(
                BytesText::from_escaped(indent.to_string()).into_owned(),
            )));
        }
        nodes.push(Node::Element(child));
        self.children.splice(at..at, nodes);
    }

    /// Place this element and any unqualified descendants in `namespace`.
    pub(super) fn qualify(&mut self, namespace: &str, prefix: Option<&str>) {
        if self.namespace.is_some() {
            return;
        }
        let local = self.local_name().to_string();
        self.qname = match prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local,
        };
        self.namespace = Some(namespace.to_string());
        for node in &mut self.children {
            if let Node::Element(element) = node {
                element.qualify(namespace, prefix);
            }
        }
    }

    fn from_start(
        start: &BytesStart<'_>,
        namespace: Option<String>,
        self_closing: bool,
    ) -> Result<Self, String> {
        let qname = String::from_utf8_lossy(start.name().into_inner()).into_owned();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|err| format!("<{qname}>: {err}"))?;
            attributes.push((
                String::from_utf8_lossy(attribute.key.into_inner()).into_owned(),
                String::from_utf8_lossy(&attribute.value).into_owned(),
            ));
        }
        Ok(Self {
            qname,
            namespace,
            attributes,
            children: Vec::new(),
            self_closing,
        })
    }

    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), String> {
        let mut start = BytesStart::new(self.qname.as_str());
        for (key, value) in &self.attributes {
            // Values read from single-quoted attributes may hold a bare `"`.
            let value: Cow<'_, [u8]> = if value.contains('"') {
                Cow::Owned(value.replace('"', "&quot;").into_bytes())
            } else {
                Cow::Borrowed(value.as_bytes())
            };
            start.push_attribute(Attribute {
                key: QName(key.as_bytes()),
                value,
            });
        }
        if self.children.is_empty() && self.self_closing {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|err| err.to_string());
        }
        writer
            .write_event(Event::Start(start))
            .map_err(|err| err.to_string())?;
        for node in &self.children {
            match node {
                Node::Element(element) => element.write(writer)?,
                Node::Other(event) => writer
                    .write_event(event.clone())
                    .map_err(|err| err.to_string())?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.qname.as_str())))
            .map_err(|err| err.to_string())
    }
}

fn namespace_of(resolved: &ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    }
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(format!("second root element <{}>", element.qname));
    }
    *root = Some(element);
    Ok(())
}

fn is_blank(raw: &[u8]) -> bool {
    raw.iter().all(u8::is_ascii_whitespace)
}
