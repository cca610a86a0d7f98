//! XML parser for game table files

use crate::error::{Error, Result};
use crate::table::{descend_mut, Attributes, Element, Entry, Node, TabularDocument};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;

/// Parse an XML table file into a TabularDocument
pub fn parse_table<P: AsRef<Path>>(path: P, row_element: &str) -> Result<TabularDocument> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_table_bytes(&bytes, &path.display().to_string(), row_element)
}

/// Parse raw bytes (e.g. an archive member) into a TabularDocument
pub fn parse_table_bytes(bytes: &[u8], source_name: &str, row_element: &str) -> Result<TabularDocument> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let content = std::str::from_utf8(bytes).map_err(|e| Error::xml(source_name, e))?;
    parse_table_str(content, source_name, row_element)
}

/// Parse XML from a string (useful for testing)
pub fn parse_table_str(content: &str, source_name: &str, row_element: &str) -> Result<TabularDocument> {
    let (prologue, mut root) = parse_tree(content, source_name)?;

    let container_path = find_container(&root, row_element);
    let container = descend_mut(&mut root, &container_path)
        .ok_or_else(|| Error::xml(source_name, "rows container vanished while parsing"))?;

    let entries = std::mem::take(&mut container.children)
        .into_iter()
        .map(|node| match node {
            Node::Element(element) if element.is_named(row_element) => Entry::Row(element),
            other => Entry::Other(other),
        })
        .collect();

    Ok(TabularDocument {
        source_name: source_name.to_string(),
        row_element: row_element.to_string(),
        prologue,
        root,
        container_path,
        entries,
    })
}

/// Build the element tree, dropping whitespace-only text
fn parse_tree(content: &str, source_name: &str) -> Result<(Vec<Node>, Element)> {
    let mut reader = Reader::from_str(content);
    let mut prologue = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::xml(
                source_name,
                format!("{} (at byte {})", e, reader.buffer_position()),
            )
        })?;

        let node = match event {
            Event::Start(start) => {
                stack.push(start_element(&start, source_name)?);
                continue;
            }
            Event::End(_) => match stack.pop() {
                Some(element) => Node::Element(element),
                None => return Err(Error::xml(source_name, "unexpected closing tag")),
            },
            Event::Empty(start) => Node::Element(start_element(&start, source_name)?),
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| Error::xml(source_name, e))?;
                if text.trim().is_empty() {
                    continue;
                }
                Node::Text(text.into_owned())
            }
            Event::CData(data) => Node::CData(utf8(&data, source_name)?),
            Event::Comment(comment) => Node::Comment(utf8(&comment, source_name)?),
            Event::Eof => break,
            // declaration is regenerated by the writer; doctype and PIs are not kept
            _ => continue,
        };

        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => match node {
                Node::Element(element) => {
                    if root.is_some() {
                        return Err(Error::xml(source_name, "multiple root elements"));
                    }
                    root = Some(element);
                }
                Node::Text(_) | Node::CData(_) => {
                    return Err(Error::xml(source_name, "text outside the root element"));
                }
                other if root.is_none() => prologue.push(other),
                _ => {}
            },
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::xml(source_name, format!("unclosed element <{}>", open.name)));
    }
    let root = root.ok_or_else(|| Error::xml(source_name, "no root element"))?;
    Ok((prologue, root))
}

fn start_element(start: &BytesStart<'_>, source_name: &str) -> Result<Element> {
    let name = utf8(start.name().as_ref(), source_name)?;
    let mut attributes = Attributes::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::xml(source_name, e))?;
        let key = utf8(attr.key.as_ref(), source_name)?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::xml(source_name, e))?;
        attributes.set(key, value.into_owned());
    }
    Ok(Element::new(name).with_attributes(attributes))
}

fn utf8(bytes: &[u8], source_name: &str) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| Error::xml(source_name, e))
}

/// Locate the rows container: the first element (pre-order) holding a row element,
/// else the first element named `rows`, else the root
fn find_container(root: &Element, row_element: &str) -> Vec<usize> {
    find_path(root, &|e: &Element| e.child_elements().any(|c| c.is_named(row_element)))
        .or_else(|| find_path(root, &|e: &Element| e.is_named("rows")))
        .unwrap_or_default()
}

fn find_path(element: &Element, matches: &dyn Fn(&Element) -> bool) -> Option<Vec<usize>> {
    if matches(element) {
        return Some(Vec::new());
    }
    for (index, node) in element.children.iter().enumerate() {
        if let Node::Element(child) = node {
            if let Some(mut path) = find_path(child, matches) {
                path.insert(0, index);
                return Some(path);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!-- exported -->
<database name="barbora">
  <table name="buff">
    <columns>
      <column name="buff_id" type="int" />
    </columns>
    <rows>
      <row buff_id="1" buff_name="a &amp; b" />
      <!-- legacy -->
      <row buff_id="2" buff_name="c" />
    </rows>
  </table>
</database>
"#;

    #[test]
    fn test_parse_data_table() {
        let doc = parse_table_str(DATA, "buff.xml", "row").unwrap();

        assert_eq!(doc.root.name, "database");
        assert_eq!(doc.container_path, vec![0, 1]);
        assert_eq!(doc.row_count(), 2);
        assert_eq!(doc.entries.len(), 3);
        assert_eq!(doc.prologue, vec![Node::Comment(" exported ".into())]);

        let rows: Vec<&Element> = doc.rows().collect();
        assert_eq!(rows[0].attribute("buff_name"), Some("a & b"));
        assert_eq!(rows[1].attribute("buff_id"), Some("2"));
        assert!(matches!(&doc.entries[1], Entry::Other(Node::Comment(c)) if c == " legacy "));
    }

    #[test]
    fn test_parse_localization_table() {
        let xml = "<Table><Row><Cell>K1</Cell><Cell>Hello</Cell><Cell>Ahoj</Cell></Row>\
                   <Row><Cell>K2</Cell><Cell><![CDATA[a < b]]></Cell></Row></Table>";
        let doc = parse_table_str(xml, "text_ui_items.xml", "Row").unwrap();

        assert!(doc.container_path.is_empty());
        assert_eq!(doc.row_count(), 2);
        let second = doc.rows().nth(1).unwrap();
        let cells: Vec<String> = second.child_elements().map(Element::text).collect();
        assert_eq!(cells, vec!["K2".to_string(), "a < b".to_string()]);
    }

    #[test]
    fn test_row_element_matches_case_insensitively() {
        let xml = "<table><rows><Row id=\"1\"/></rows></table>";
        let doc = parse_table_str(xml, "t.xml", "row").unwrap();
        assert_eq!(doc.container_path, vec![0]);
        assert_eq!(doc.row_count(), 1);
    }

    #[test]
    fn test_empty_rows_container_is_found_by_name() {
        let xml = "<database><table><columns/><rows/></table></database>";
        let doc = parse_table_str(xml, "t.xml", "row").unwrap();
        assert_eq!(doc.container_path, vec![0, 1]);
        assert_eq!(doc.row_count(), 0);
    }

    #[test]
    fn test_parse_bytes_strips_bom() {
        let bytes = b"\xEF\xBB\xBF<Table><Row><Cell>K</Cell></Row></Table>";
        let doc = parse_table_bytes(bytes, "t.xml", "Row").unwrap();
        assert_eq!(doc.row_count(), 1);
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse_table_str("<table><rows></table>", "bad.xml", "row").unwrap_err();
        assert!(matches!(err, Error::Xml { ref source_name, .. } if source_name == "bad.xml"));

        assert!(parse_table_str("<a/><b/>", "two.xml", "row").is_err());
        assert!(parse_table_str("<!-- only -->", "none.xml", "row").is_err());
        assert!(parse_table_str("<table><rows>", "open.xml", "row").is_err());
    }

    #[test]
    fn test_parse_missing_file() {
        let err = parse_table("does/not/exist.xml", "row").unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
