use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{Child, Element, ElementData};
use crate::errors::{Error, Result};

pub type OsmSource = Box<dyn BufRead>;

enum ElementKind {
    Node,
    Way,
    Other(String),
}

/// Element currently being read, between its start and end tags.
struct OpenElement {
    kind: ElementKind,
    name: Vec<u8>,
    data: ElementData,
    depth: usize,
}

impl OpenElement {
    fn finish(self) -> Element {
        match self.kind {
            ElementKind::Node => Element::Node(self.data),
            ElementKind::Way => Element::Way(self.data),
            ElementKind::Other(name) => Element::Other(name),
        }
    }
}

/// Streams the elements of an .osm file one at a time. Only the element being
/// assembled is held in memory.
pub struct OsmElements<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl OsmElements<OsmSource> {
    /// Opens a plain or xz compressed (`.xz`) .osm file.
    pub fn open(path: &Path) -> Result<OsmElements<OsmSource>> {
        let file = fs::File::open(path)?;
        let file_reader = BufReader::new(file);
        let source: OsmSource = if path.extension().is_some_and(|ext| ext == "xz") {
            Box::new(BufReader::new(XzDecoder::new(file_reader)))
        } else {
            Box::new(file_reader)
        };
        Ok(OsmElements::new(source))
    }
}

impl<R: BufRead> OsmElements<R> {
    pub fn new(source: R) -> OsmElements<R> {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);

        OsmElements {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }

    fn read_attributes(el: &BytesStart) -> Result<BTreeMap<String, String>> {
        let mut attributes = BTreeMap::new();
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            let key = str::from_utf8(attribute.key.as_ref())?.to_string();
            let value = attribute.unescape_value()?.into_owned();
            attributes.insert(key, value);
        }
        Ok(attributes)
    }

    /// Starts a top level element, `None` for elements we don't yield (`osm`, `bounds`, ...).
    fn open_element(el: &BytesStart) -> Result<Option<OpenElement>> {
        let kind = match el.name().as_ref() {
            b"node" => ElementKind::Node,
            b"way" => ElementKind::Way,
            b"relation" => ElementKind::Other("relation".to_string()),
            _ => return Ok(None),
        };

        let data = match kind {
            ElementKind::Other(_) => ElementData::default(),
            _ => {
                let attributes = Self::read_attributes(el)?;
                let id = attributes.get("id")
                    .ok_or_else(|| Error::from(format!(
                        "{} element without id", String::from_utf8_lossy(el.name().as_ref())
                    )))?
                    .clone();
                ElementData {
                    id,
                    attributes,
                    children: Vec::new(),
                }
            },
        };

        Ok(Some(OpenElement {
            kind,
            name: el.name().as_ref().to_vec(),
            data,
            depth: 0,
        }))
    }

    fn read_child(open: &mut OpenElement, el: &BytesStart) -> Result<()> {
        if let ElementKind::Other(_) = open.kind {
            return Ok(());
        }

        let child = match el.name().as_ref() {
            b"tag" => {
                let mut attributes = Self::read_attributes(el)?;
                let key = attributes.remove("k")
                    .ok_or_else(|| format!("tag without k on element {}", open.data.id))?;
                let value = attributes.remove("v")
                    .ok_or_else(|| format!("tag without v on element {}", open.data.id))?;
                Child::Tag { key, value }
            },
            b"nd" => {
                let mut attributes = Self::read_attributes(el)?;
                let node_id = attributes.remove("ref")
                    .ok_or_else(|| format!("nd without ref on element {}", open.data.id))?;
                Child::NodeRef { node_id }
            },
            _ => return Ok(()),
        };
        open.data.children.push(child);
        Ok(())
    }

    fn read_element(&mut self) -> Result<Option<Element>> {
        let mut current: Option<OpenElement> = None;

        loop {
            let finished = match self.reader.read_event_into(&mut self.buf)? {
                Event::Eof => {
                    if current.is_some() {
                        return Err("Unexpected end of file inside an element.".into());
                    }
                    return Ok(None);
                },
                Event::Start(e) => {
                    match current.as_mut() {
                        None => current = Self::open_element(&e)?,
                        Some(open) => {
                            Self::read_child(open, &e)?;
                            open.depth += 1;
                        },
                    }
                    None
                },
                Event::Empty(e) => match current.as_mut() {
                    None => Self::open_element(&e)?.map(OpenElement::finish),
                    Some(open) => {
                        Self::read_child(open, &e)?;
                        None
                    },
                },
                Event::End(e) => match current.take() {
                    Some(open) if open.depth == 0 && e.name().as_ref() == open.name.as_slice() => Some(open.finish()),
                    Some(mut open) => {
                        open.depth = open.depth.saturating_sub(1);
                        current = Some(open);
                        None
                    },
                    None => None,
                },
                // Text, comments, declarations and the like carry nothing we keep.
                _ => None,
            };
            // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
            self.buf.clear();

            if finished.is_some() {
                return Ok(finished);
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmElements<R> {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}
