//! Theme palette: named color slots and tint resolution.

use roxmltree::Document;
use xlport_core::Color;

use crate::error::Result;

/// Slot names in the order cell styles index them.
const SLOTS: [&str; 12] = [
    "lt1", "dk1", "lt2", "dk2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
    "hlink", "folHlink",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    colors: [Color; 12],
}

impl Default for Theme {
    /// The Office palette.
    fn default() -> Self {
        Theme {
            colors: [
                Color::rgb(0xFF, 0xFF, 0xFF),
                Color::rgb(0x00, 0x00, 0x00),
                Color::rgb(0xEE, 0xEC, 0xE1),
                Color::rgb(0x1F, 0x49, 0x7D),
                Color::rgb(0x4F, 0x81, 0xBD),
                Color::rgb(0xC0, 0x50, 0x4D),
                Color::rgb(0x9B, 0xBB, 0x59),
                Color::rgb(0x80, 0x64, 0xA2),
                Color::rgb(0x4B, 0xAC, 0xC6),
                Color::rgb(0xF7, 0x96, 0x46),
                Color::rgb(0x00, 0x00, 0xFF),
                Color::rgb(0x80, 0x00, 0x80),
            ],
        }
    }
}

impl Theme {
    /// Read the color scheme of a theme part. Slots the part leaves out keep
    /// their Office defaults.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml)?;
        let mut theme = Theme::default();

        let Some(scheme) = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "clrScheme")
        else {
            return Ok(theme);
        };

        for (index, slot) in SLOTS.iter().enumerate() {
            let color = scheme
                .children()
                .find(|n| n.is_element() && n.tag_name().name() == *slot)
                .and_then(|entry| entry.children().find(|n| n.is_element()))
                .and_then(|clr| match clr.tag_name().name() {
                    "srgbClr" => clr.attribute("val"),
                    "sysClr" => clr.attribute("lastClr"),
                    _ => None,
                })
                .and_then(Color::from_hex);
            if let Some(color) = color {
                theme.colors[index] = color;
            }
        }
        Ok(theme)
    }

    /// Index of a slot by name. Accepts the scheme names (`dk1`, `accent3`)
    /// and their aliases (`text1`, `background1`, `hyperlink`).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let canonical = match name.to_ascii_lowercase().as_str() {
            "background1" | "bg1" | "light1" => "lt1",
            "text1" | "tx1" | "dark1" => "dk1",
            "background2" | "bg2" | "light2" => "lt2",
            "text2" | "tx2" | "dark2" => "dk2",
            "hyperlink" => "hlink",
            "followedhyperlink" | "folhlink" => "folHlink",
            other => return SLOTS.iter().position(|slot| slot.eq_ignore_ascii_case(other)),
        };
        SLOTS.iter().position(|slot| *slot == canonical)
    }

    /// Scheme name of a slot index, e.g. `accent1` for 4.
    pub fn slot_name(index: usize) -> Option<&'static str> {
        SLOTS.get(index).copied()
    }

    pub fn color(&self, index: usize) -> Option<Color> {
        self.colors.get(index).copied()
    }

    /// Concrete color of a slot after applying a tint in `-1.0..=1.0`.
    pub fn resolve(&self, index: usize, tint: f64) -> Option<Color> {
        self.color(index).map(|color| apply_tint(color, tint))
    }
}

/// Negative tints darken towards black, positive ones lighten towards white.
pub fn apply_tint(color: Color, tint: f64) -> Color {
    let tint = tint.clamp(-1.0, 1.0);
    let channel = |c: u8| {
        let c = c as f64;
        let shifted = if tint < 0.0 {
            c * (1.0 + tint)
        } else {
            c * (1.0 - tint) + 255.0 * tint
        };
        shifted.round().clamp(0.0, 255.0) as u8
    };
    Color::rgba(channel(color.r), channel(color.g), channel(color.b), color.a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_names_and_aliases() {
        let theme = Theme::default();
        assert_eq!(theme.index_of("lt1"), Some(0));
        assert_eq!(theme.index_of("text1"), Some(1));
        assert_eq!(theme.index_of("Accent1"), Some(4));
        assert_eq!(theme.index_of("folHlink"), Some(11));
        assert_eq!(theme.index_of("sparkle"), None);
    }

    #[test]
    fn test_tint() {
        let theme = Theme::default();
        assert_eq!(theme.resolve(1, 0.5), Some(Color::rgb(128, 128, 128)));
        assert_eq!(theme.resolve(0, -0.5), Some(Color::rgb(128, 128, 128)));
        assert_eq!(theme.resolve(4, 0.0), theme.color(4));
        assert_eq!(theme.resolve(12, 0.0), None);
    }

    #[test]
    fn test_reads_scheme_from_template() {
        let xml = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <a:themeElements><a:clrScheme name="Custom">
    <a:dk1><a:sysClr val="windowText" lastClr="111111"/></a:dk1>
    <a:accent1><a:srgbClr val="AA0000"/></a:accent1>
  </a:clrScheme></a:themeElements></a:theme>"#;
        let theme = Theme::from_xml(xml).unwrap();
        assert_eq!(theme.color(1), Some(Color::rgb(0x11, 0x11, 0x11)));
        assert_eq!(theme.color(4), Some(Color::rgb(0xAA, 0, 0)));
        assert_eq!(theme.color(0), Theme::default().color(0));
    }
}
