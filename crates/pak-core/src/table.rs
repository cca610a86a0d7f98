//! Core document types for representing XML game tables

use serde::{Deserialize, Serialize};

/// Ordered attribute list of an element
///
/// Keeps source order so that rewritten rows stay byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute value by name
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, keeping its position if it already exists
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys whose values differ between `self` and `other`
    ///
    /// A key present on only one side counts as different. Keys are reported in
    /// `self` order, followed by keys that only `other` has.
    pub fn diff<'a>(&'a self, other: &'a Attributes) -> Vec<&'a str> {
        let mut keys: Vec<&str> = self
            .iter()
            .filter(|(k, v)| other.get(k) != Some(*v))
            .map(|(k, _)| k)
            .collect();
        keys.extend(
            other
                .iter()
                .filter(|(k, _)| self.get(k).is_none())
                .map(|(k, _)| k),
        );
        keys
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (k, v) in iter {
            attributes.set(k, v);
        }
        attributes
    }
}

/// A node in the markup tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

/// An element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }

    /// Whether the element name matches, ignoring ASCII case
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Child elements in order
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Concatenated text and CDATA content of direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace text content; an empty string leaves no text node
    pub fn set_text(&mut self, text: &str) {
        self.children
            .retain(|node| !matches!(node, Node::Text(_) | Node::CData(_)));
        if !text.is_empty() {
            self.children.push(Node::Text(text.to_string()));
        }
    }
}

/// A table row: an element whose attributes (data tables) or cells
/// (localization tables) carry its values
pub type Row = Element;

/// One item of a rows container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    /// A regular row
    Row(Row),
    /// A sentinel-patched duplicate emitted after an explanatory comment
    Workaround { marker: String, row: Row },
    /// Any other node found in the container (comments, foreign elements)
    Other(Node),
}

impl Entry {
    /// The regular row in this entry, if any
    pub fn row(&self) -> Option<&Row> {
        match self {
            Entry::Row(row) => Some(row),
            _ => None,
        }
    }
}

/// A parsed table: structural wrapper plus an indexable list of row entries
///
/// The rows container is stored emptied inside `root`; `container_path` is the
/// list of child indices leading from `root` to it. Entries are spliced back in
/// when the document is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularDocument {
    /// Name used in diagnostics (usually the source path)
    pub source_name: String,
    /// Row element name
    pub row_element: String,
    /// Comments before the root element
    pub prologue: Vec<Node>,
    pub root: Element,
    pub container_path: Vec<usize>,
    pub entries: Vec<Entry>,
}

impl TabularDocument {
    /// Create a document whose root element is the rows container
    pub fn with_root(source_name: impl Into<String>, root: Element, row_element: &str) -> Self {
        Self {
            source_name: source_name.into(),
            row_element: row_element.to_string(),
            prologue: Vec::new(),
            root,
            container_path: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Regular rows in order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.entries.iter().filter_map(Entry::row)
    }

    /// Number of regular rows
    pub fn row_count(&self) -> usize {
        self.rows().count()
    }

    /// Take the regular rows out of the document, leaving other entries
    pub fn take_rows(&mut self) -> Vec<Row> {
        let entries = std::mem::take(&mut self.entries);
        let mut rows = Vec::new();
        for entry in entries {
            match entry {
                Entry::Row(row) => rows.push(row),
                other => self.entries.push(other),
            }
        }
        rows
    }

    /// Rebuild the full element tree with entries spliced into the container
    pub fn to_tree(&self) -> Element {
        let mut nodes = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry {
                Entry::Row(row) => nodes.push(Node::Element(row.clone())),
                Entry::Workaround { marker, row } => {
                    nodes.push(Node::Comment(marker.clone()));
                    nodes.push(Node::Element(row.clone()));
                }
                Entry::Other(node) => nodes.push(node.clone()),
            }
        }

        let mut root = self.root.clone();
        match descend_mut(&mut root, &self.container_path) {
            Some(container) => container.children.extend(nodes),
            // stale path: keep the rows at the root level rather than dropping them
            None => root.children.extend(nodes),
        }
        root
    }
}

/// Follow a path of child indices down from `element`
pub(crate) fn descend_mut<'a>(mut element: &'a mut Element, path: &[usize]) -> Option<&'a mut Element> {
    for &index in path {
        element = match element.children.get_mut(index)? {
            Node::Element(child) => child,
            _ => return None,
        };
    }
    Some(element)
}
