//! Drawing parts: the per-sheet layer holding charts, pictures and text
//! boxes anchored between two cells.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::Result;
use crate::geometry::{AnchorPoint, TwoCellAnchor};
use crate::relationships::{rel_types, Relationships};
use crate::xml::{ns, Element};

/// Image payload of a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub media_type: &'static str,
    pub extension: &'static str,
    /// Base64 text, still encoded.
    pub payload: &'a str,
}

fn data_uri_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)^data:image/(png|jpe?g|gif|bmp);base64,(.*)$").expect("static regex")
    })
}

/// Split an image data URI. Only base64 PNG, JPEG, GIF and BMP are accepted.
///
/// ```
/// use xlport_xlsx::drawing::parse_data_uri;
///
/// let uri = parse_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
/// assert_eq!((uri.extension, uri.payload), ("png", "iVBORw0KGgo="));
/// assert!(parse_data_uri("data:image/svg+xml;base64,PHN2Zz4=").is_none());
/// assert!(parse_data_uri("https://example.com/a.png").is_none());
/// ```
pub fn parse_data_uri(source: &str) -> Option<DataUri<'_>> {
    let captures = data_uri_pattern().captures(source.trim())?;
    let (media_type, extension) = match captures.get(1)?.as_str().to_ascii_lowercase().as_str() {
        "png" => ("image/png", "png"),
        "jpg" | "jpeg" => ("image/jpeg", "jpeg"),
        "gif" => ("image/gif", "gif"),
        _ => ("image/bmp", "bmp"),
    };
    Some(DataUri {
        media_type,
        extension,
        payload: captures.get(2)?.as_str(),
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Chart { rel_id: String },
    Picture { rel_id: String },
    TextBox { text: String },
}

#[derive(Debug, Clone, PartialEq)]
struct AnchoredObject {
    anchor: TwoCellAnchor,
    name: String,
    content: Content,
}

/// One sheet's drawing part under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drawing {
    objects: Vec<AnchoredObject>,
    relationships: Relationships,
}

impl Drawing {
    pub fn new() -> Self {
        Drawing {
            objects: Vec::new(),
            relationships: Relationships::new(),
        }
    }

    /// `target` is relative to the drawing part, e.g. `../charts/chart1.xml`.
    pub fn add_chart(&mut self, anchor: TwoCellAnchor, name: Option<&str>, target: &str) {
        let rel_id = self.relationships.add(rel_types::CHART, target);
        let name = self.object_name(name, "Chart");
        self.objects.push(AnchoredObject {
            anchor,
            name,
            content: Content::Chart { rel_id },
        });
    }

    /// `target` is relative to the drawing part, e.g. `../media/image1.png`.
    pub fn add_picture(&mut self, anchor: TwoCellAnchor, name: Option<&str>, target: &str) {
        let rel_id = self.relationships.add(rel_types::IMAGE, target);
        let name = self.object_name(name, "Picture");
        self.objects.push(AnchoredObject {
            anchor,
            name,
            content: Content::Picture { rel_id },
        });
    }

    pub fn add_text_box(&mut self, anchor: TwoCellAnchor, name: Option<&str>, text: &str) {
        let name = self.object_name(name, "TextBox");
        self.objects.push(AnchoredObject {
            anchor,
            name,
            content: Content::TextBox {
                text: text.to_string(),
            },
        });
    }

    fn object_name(&self, name: Option<&str>, kind: &str) -> String {
        match name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("{kind} {}", self.objects.len() + 1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    pub fn to_xml(&self) -> Result<String> {
        Element::new("xdr:wsDr")
            .attr("xmlns:xdr", ns::DRAWING)
            .attr("xmlns:a", ns::DRAWINGML)
            .attr("xmlns:r", ns::REL)
            .children(
                self.objects
                    .iter()
                    .enumerate()
                    .map(|(index, object)| object.to_element(index as u32 + 2)),
            )
            .to_document()
    }
}

impl AnchoredObject {
    fn to_element(&self, shape_id: u32) -> Element {
        let body = match &self.content {
            Content::Chart { rel_id } => graphic_frame(shape_id, &self.name, rel_id),
            Content::Picture { rel_id } => picture(shape_id, &self.name, rel_id),
            Content::TextBox { text } => text_box(shape_id, &self.name, text),
        };
        Element::new("xdr:twoCellAnchor")
            .attr("editAs", "oneCell")
            .child(marker("xdr:from", &self.anchor.from))
            .child(marker("xdr:to", &self.anchor.to))
            .child(body)
            .child(Element::new("xdr:clientData"))
    }
}

fn marker(name: &str, point: &AnchorPoint) -> Element {
    Element::new(name)
        .child(Element::new("xdr:col").text(point.col.to_string()))
        .child(Element::new("xdr:colOff").text(point.col_offset.to_string()))
        .child(Element::new("xdr:row").text(point.row.to_string()))
        .child(Element::new("xdr:rowOff").text(point.row_offset.to_string()))
}

fn non_visual(shape_id: u32, name: &str) -> Element {
    Element::new("xdr:cNvPr").attr("id", shape_id).attr("name", name)
}

fn transform(name: &str) -> Element {
    Element::new(name)
        .child(Element::new("a:off").attr("x", 0).attr("y", 0))
        .child(Element::new("a:ext").attr("cx", 0).attr("cy", 0))
}

fn rect_geometry() -> Element {
    Element::new("a:prstGeom")
        .attr("prst", "rect")
        .child(Element::new("a:avLst"))
}

fn graphic_frame(shape_id: u32, name: &str, rel_id: &str) -> Element {
    Element::new("xdr:graphicFrame")
        .attr("macro", "")
        .child(
            Element::new("xdr:nvGraphicFramePr")
                .child(non_visual(shape_id, name))
                .child(Element::new("xdr:cNvGraphicFramePr")),
        )
        .child(transform("xdr:xfrm"))
        .child(
            Element::new("a:graphic").child(
                Element::new("a:graphicData").attr("uri", ns::CHART).child(
                    Element::new("c:chart")
                        .attr("xmlns:c", ns::CHART)
                        .attr("r:id", rel_id),
                ),
            ),
        )
}

fn picture(shape_id: u32, name: &str, rel_id: &str) -> Element {
    Element::new("xdr:pic")
        .child(
            Element::new("xdr:nvPicPr")
                .child(non_visual(shape_id, name))
                .child(
                    Element::new("xdr:cNvPicPr")
                        .child(Element::new("a:picLocks").attr("noChangeAspect", 1)),
                ),
        )
        .child(
            Element::new("xdr:blipFill")
                .child(Element::new("a:blip").attr("r:embed", rel_id))
                .child(Element::new("a:stretch").child(Element::new("a:fillRect"))),
        )
        .child(
            Element::new("xdr:spPr")
                .child(transform("a:xfrm"))
                .child(rect_geometry()),
        )
}

fn text_box(shape_id: u32, name: &str, text: &str) -> Element {
    let paragraphs = text.split('\n').map(|line| {
        let line = line.trim_end_matches('\r');
        let paragraph = Element::new("a:p");
        if line.is_empty() {
            return paragraph.child(Element::new("a:endParaRPr").attr("lang", "en-US").attr("sz", 1100));
        }
        paragraph.child(
            Element::new("a:r")
                .child(Element::new("a:rPr").attr("lang", "en-US").attr("sz", 1100))
                .child(Element::new("a:t").text(line)),
        )
    });

    Element::new("xdr:sp")
        .attr("macro", "")
        .attr("textlink", "")
        .child(
            Element::new("xdr:nvSpPr")
                .child(non_visual(shape_id, name))
                .child(Element::new("xdr:cNvSpPr").attr("txBox", 1)),
        )
        .child(
            Element::new("xdr:spPr")
                .child(transform("a:xfrm"))
                .child(rect_geometry())
                .child(Element::new("a:solidFill").child(Element::val("a:schemeClr", "lt1")))
                .child(
                    Element::new("a:ln").attr("w", 9525).child(
                        Element::new("a:solidFill").child(Element::val("a:schemeClr", "dk1")),
                    ),
                ),
        )
        .child(
            Element::new("xdr:txBody")
                .child(
                    Element::new("a:bodyPr")
                        .attr("wrap", "square")
                        .attr("rtlCol", 0)
                        .attr("anchor", "t"),
                )
                .child(Element::new("a:lstStyle"))
                .children(paragraphs),
        )
}
