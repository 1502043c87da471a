use serde::{Deserialize, Serialize};

/// Cell corner of a normalized layout. Offsets are fractions (0..1) of the
/// cell's width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutCorner {
    pub row: u32,
    pub col: u32,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
}

impl LayoutCorner {
    pub fn new(row: u32, col: u32) -> Self {
        LayoutCorner {
            row,
            col,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// Where an annotation sits on its sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Placement {
    /// Pixel rectangle relative to the top-left corner of the grid.
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Layout { from: LayoutCorner, to: LayoutCorner },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AnnotationKind {
    /// Chart described by a formula such as `=Column.Chart(A1:A4, B1:B4, "Sales")`.
    Chart { formula: String },
    /// Picture given as a data URI.
    Image { source: String },
    TextBox { text: String },
}

/// A floating object drawn over the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: AnnotationKind,
    pub placement: Placement,
}

impl Annotation {
    pub fn chart(formula: impl Into<String>, placement: Placement) -> Self {
        Annotation {
            name: None,
            kind: AnnotationKind::Chart {
                formula: formula.into(),
            },
            placement,
        }
    }

    pub fn image(source: impl Into<String>, placement: Placement) -> Self {
        Annotation {
            name: None,
            kind: AnnotationKind::Image {
                source: source.into(),
            },
            placement,
        }
    }

    pub fn text_box(text: impl Into<String>, placement: Placement) -> Self {
        Annotation {
            name: None,
            kind: AnnotationKind::TextBox { text: text.into() },
            placement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_json() {
        let json = r#"{
            "kind": {"type": "chart", "formula": "=Line.Chart(A1:A3)"},
            "placement": {"type": "layout", "from": {"row": 1, "col": 1, "offsetX": 0.5}, "to": {"row": 10, "col": 6}}
        }"#;
        let annotation: Annotation = serde_json::from_str(json).unwrap();
        match annotation.placement {
            Placement::Layout { from, to } => {
                assert_eq!(from.offset_x, 0.5);
                assert_eq!(to, LayoutCorner::new(10, 6));
            }
            other => panic!("unexpected placement {other:?}"),
        }
    }
}
