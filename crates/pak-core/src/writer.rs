//! Serialize merged documents back to indented XML

use crate::error::{Error, Result};
use crate::table::{Element, Node, TabularDocument};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Output flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Data tables: explicit utf-8 declaration
    Data,
    /// String tables: no declaration, minimal text escaping
    Localization,
}

/// Render a document to a string
pub fn render(document: &TabularDocument, mode: WriteMode) -> Result<String> {
    let name = document.source_name.as_str();
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    if mode == WriteMode::Data {
        emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)), name)?;
    }
    for node in &document.prologue {
        write_node(&mut writer, node, mode, name)?;
    }
    write_element(&mut writer, &document.to_tree(), mode, name)?;

    let mut output = String::from_utf8(writer.into_inner()).map_err(|e| Error::xml(name, e))?;
    output.push('\n');
    Ok(output)
}

/// Render a document and write it to `path`, creating parent directories
pub fn write_document<P: AsRef<Path>>(document: &TabularDocument, path: P, mode: WriteMode) -> Result<()> {
    let path = path.as_ref();
    let output = render(document, mode)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::FileWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, output).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!(path = %path.display(), "wrote document");
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element, mode: WriteMode, name: &str) -> Result<()> {
    let start = BytesStart::new(element.name.as_str()).with_attributes(element.attributes.iter());
    if element.children.is_empty() {
        return emit(writer, Event::Empty(start), name);
    }

    emit(writer, Event::Start(start), name)?;
    for child in &element.children {
        write_node(writer, child, mode, name)?;
    }
    emit(writer, Event::End(BytesEnd::new(element.name.as_str())), name)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node, mode: WriteMode, name: &str) -> Result<()> {
    match node {
        Node::Element(element) => write_element(writer, element, mode, name),
        Node::Text(text) => {
            let text = match mode {
                WriteMode::Data => BytesText::new(text.as_str()),
                WriteMode::Localization => BytesText::from_escaped(partial_escape(text.as_str())),
            };
            emit(writer, Event::Text(text), name)
        }
        Node::CData(text) => emit(writer, Event::CData(BytesCData::new(text.as_str())), name),
        Node::Comment(text) => emit(writer, Event::Comment(BytesText::from_escaped(text.as_str())), name),
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>, name: &str) -> Result<()> {
    writer.write_event(event).map_err(|e| Error::xml(name, e))
}
