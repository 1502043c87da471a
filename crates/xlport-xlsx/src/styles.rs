//! Style cache: interned fonts, fills, borders, number formats, cell formats
//! (xf) and differential formats (dxf).
//!
//! Every `ensure_*` does a linear structural-equality scan of its table and
//! appends on a miss, so two equal records always share one index. The cache
//! is seeded from the template's style part, which makes index 0 of every
//! table the template default.

use roxmltree::{Document, Node};
use xlport_core::{
    BorderEdge, BorderStyle, Color, ColorRef, ConditionalFormat, HorizontalAlign, Style,
    VerticalAlign,
};

use crate::error::Result;
use crate::theme::Theme;
use crate::warnings::Warnings;
use crate::xml::{ns, Element};

pub const PART: &str = "xl/styles.xml";

/// First id available to custom number formats.
pub const FIRST_CUSTOM_NUM_FMT: u32 = 164;

/// Number formats every consumer knows by id without a `numFmt` record.
const BUILTIN_NUM_FMTS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

pub fn builtin_num_fmt_id(code: &str) -> Option<u32> {
    if code.trim().eq_ignore_ascii_case("general") {
        return Some(0);
    }
    BUILTIN_NUM_FMTS
        .iter()
        .find(|(_, builtin)| *builtin == code)
        .map(|(id, _)| *id)
}

pub fn builtin_num_fmt_code(id: u32) -> Option<&'static str> {
    BUILTIN_NUM_FMTS
        .iter()
        .find(|(builtin, _)| *builtin == id)
        .map(|(_, code)| *code)
}

/// A color as stored in the style part.
#[derive(Debug, Clone, PartialEq)]
pub enum XlsxColor {
    /// `AARRGGBB`
    Rgb(String),
    Theme { index: u32, tint: Option<f64> },
    Indexed(u32),
    Auto,
}

impl XlsxColor {
    pub fn rgb(color: Color) -> Self {
        XlsxColor::Rgb(color.to_argb())
    }

    pub(crate) fn to_element(&self, name: &str) -> Element {
        let element = Element::new(name);
        match self {
            XlsxColor::Rgb(argb) => element.attr("rgb", argb),
            XlsxColor::Theme { index, tint } => element.attr("theme", index).opt_attr("tint", *tint),
            XlsxColor::Indexed(index) => element.attr("indexed", index),
            XlsxColor::Auto => element.attr("auto", "1"),
        }
    }

    fn from_node(node: Node) -> Option<Self> {
        if let Some(rgb) = node.attribute("rgb") {
            return Some(XlsxColor::Rgb(rgb.to_ascii_uppercase()));
        }
        if let Some(theme) = node.attribute("theme").and_then(|t| t.parse().ok()) {
            let tint = node.attribute("tint").and_then(|t| t.parse().ok());
            return Some(XlsxColor::Theme { index: theme, tint });
        }
        if let Some(indexed) = node.attribute("indexed").and_then(|i| i.parse().ok()) {
            return Some(XlsxColor::Indexed(indexed));
        }
        (node.attribute("auto") == Some("1")).then_some(XlsxColor::Auto)
    }

    /// Back to a model color. Legacy indexed colors outside the basic
    /// eight have no model counterpart.
    pub fn to_color_ref(&self) -> Option<ColorRef> {
        match self {
            XlsxColor::Rgb(argb) => Color::from_argb(argb).map(ColorRef::Rgb),
            XlsxColor::Theme { index, tint } => Theme::slot_name(*index as usize)
                .map(|slot| ColorRef::theme(slot, tint.unwrap_or(0.0))),
            XlsxColor::Indexed(index) => basic_indexed_color(*index).map(ColorRef::Rgb),
            XlsxColor::Auto => None,
        }
    }
}

fn basic_indexed_color(index: u32) -> Option<Color> {
    let basic = [
        Color::BLACK,
        Color::WHITE,
        Color::RED,
        Color::GREEN,
        Color::BLUE,
        Color::rgb(255, 255, 0),
        Color::rgb(255, 0, 255),
        Color::rgb(0, 255, 255),
    ];
    match index {
        0..=7 => basic.get(index as usize).copied(),
        8..=15 => basic.get(index as usize - 8).copied(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub name: String,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub color: Option<XlsxColor>,
    pub family: Option<u32>,
    pub scheme: Option<String>,
}

impl Default for Font {
    fn default() -> Self {
        Font {
            name: "Calibri".to_string(),
            size: 11.0,
            bold: false,
            italic: false,
            underline: false,
            strike: false,
            color: Some(XlsxColor::Theme {
                index: 1,
                tint: None,
            }),
            family: Some(2),
            scheme: Some("minor".to_string()),
        }
    }
}

impl Font {
    fn to_element(&self) -> Element {
        let mut font = Element::new("font");
        if self.bold {
            font.push(Element::new("b"));
        }
        if self.italic {
            font.push(Element::new("i"));
        }
        if self.strike {
            font.push(Element::new("strike"));
        }
        if self.underline {
            font.push(Element::new("u"));
        }
        font.push(Element::val("sz", self.size));
        if let Some(color) = &self.color {
            font.push(color.to_element("color"));
        }
        font.push(Element::val("name", &self.name));
        if let Some(family) = self.family {
            font.push(Element::val("family", family));
        }
        if let Some(scheme) = &self.scheme {
            font.push(Element::val("scheme", scheme));
        }
        font
    }

    fn from_node(node: Node) -> Self {
        let mut font = Font {
            name: String::new(),
            color: None,
            family: None,
            scheme: None,
            ..Font::default()
        };
        for child in node.children().filter(Node::is_element) {
            let val = child.attribute("val");
            let on = val.map_or(true, |v| v != "0" && v != "false");
            match child.tag_name().name() {
                "b" => font.bold = on,
                "i" => font.italic = on,
                "strike" => font.strike = on,
                "u" => font.underline = val != Some("none"),
                "sz" => font.size = val.and_then(|v| v.parse().ok()).unwrap_or(font.size),
                "color" => font.color = XlsxColor::from_node(child),
                "name" => font.name = val.unwrap_or_default().to_string(),
                "family" => font.family = val.and_then(|v| v.parse().ok()),
                "scheme" => font.scheme = val.map(str::to_string),
                _ => {}
            }
        }
        font
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub pattern: String,
    pub fg_color: Option<XlsxColor>,
    pub bg_color: Option<XlsxColor>,
}

impl Fill {
    pub fn pattern(pattern: &str) -> Self {
        Fill {
            pattern: pattern.to_string(),
            fg_color: None,
            bg_color: None,
        }
    }

    pub fn solid(color: XlsxColor) -> Self {
        Fill {
            pattern: "solid".to_string(),
            fg_color: Some(color),
            bg_color: Some(XlsxColor::Indexed(64)),
        }
    }

    fn to_element(&self) -> Element {
        let mut pattern = Element::new("patternFill").attr("patternType", &self.pattern);
        if let Some(fg) = &self.fg_color {
            pattern.push(fg.to_element("fgColor"));
        }
        if let Some(bg) = &self.bg_color {
            pattern.push(bg.to_element("bgColor"));
        }
        Element::new("fill").child(pattern)
    }

    fn from_node(node: Node) -> Self {
        let Some(pattern) = child(node, "patternFill") else {
            return Fill::pattern("none");
        };
        Fill {
            pattern: pattern
                .attribute("patternType")
                .unwrap_or("none")
                .to_string(),
            fg_color: child(pattern, "fgColor").and_then(XlsxColor::from_node),
            bg_color: child(pattern, "bgColor").and_then(XlsxColor::from_node),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BorderSide {
    pub style: String,
    pub color: Option<XlsxColor>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Border {
    pub left: Option<BorderSide>,
    pub right: Option<BorderSide>,
    pub top: Option<BorderSide>,
    pub bottom: Option<BorderSide>,
}

impl Border {
    fn sides(&self) -> [(&'static str, &Option<BorderSide>); 4] {
        [
            ("left", &self.left),
            ("right", &self.right),
            ("top", &self.top),
            ("bottom", &self.bottom),
        ]
    }

    fn to_element(&self) -> Element {
        let mut border = Element::new("border");
        for (name, side) in self.sides() {
            let element = match side {
                Some(side) => {
                    let element = Element::new(name).attr("style", &side.style);
                    match &side.color {
                        Some(color) => element.child(color.to_element("color")),
                        None => element,
                    }
                }
                None => Element::new(name),
            };
            border.push(element);
        }
        border.push(Element::new("diagonal"));
        border
    }

    fn from_node(node: Node) -> Self {
        let side = |name: &str| {
            let element = child(node, name)?;
            let style = element.attribute("style")?;
            Some(BorderSide {
                style: style.to_string(),
                color: child(element, "color").and_then(XlsxColor::from_node),
            })
        };
        Border {
            left: side("left"),
            right: side("right"),
            top: side("top"),
            bottom: side("bottom"),
        }
    }
}

/// A composite cell format referencing the other tables by index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CellXf {
    pub num_fmt_id: u32,
    pub font_id: usize,
    pub fill_id: usize,
    pub border_id: usize,
    pub horizontal: Option<HorizontalAlign>,
    pub vertical: Option<VerticalAlign>,
    pub wrap: bool,
}

impl CellXf {
    fn has_alignment(&self) -> bool {
        self.horizontal.is_some() || self.vertical.is_some() || self.wrap
    }

    fn to_element(&self) -> Element {
        let xf = Element::new("xf")
            .attr("numFmtId", self.num_fmt_id)
            .attr("fontId", self.font_id)
            .attr("fillId", self.fill_id)
            .attr("borderId", self.border_id)
            .attr("xfId", 0)
            .flag("applyNumberFormat", self.num_fmt_id != 0)
            .flag("applyFont", self.font_id != 0)
            .flag("applyFill", self.fill_id != 0)
            .flag("applyBorder", self.border_id != 0)
            .flag("applyAlignment", self.has_alignment());
        if !self.has_alignment() {
            return xf;
        }
        xf.child(
            Element::new("alignment")
                .opt_attr("horizontal", self.horizontal.map(horizontal_name))
                .opt_attr("vertical", self.vertical.map(vertical_name))
                .flag("wrapText", self.wrap),
        )
    }

    fn from_node(node: Node) -> Self {
        let index = |name: &str| {
            node.attribute(name)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        };
        let alignment = child(node, "alignment");
        CellXf {
            num_fmt_id: index("numFmtId") as u32,
            font_id: index("fontId"),
            fill_id: index("fillId"),
            border_id: index("borderId"),
            horizontal: alignment
                .and_then(|a| a.attribute("horizontal"))
                .and_then(parse_horizontal),
            vertical: alignment
                .and_then(|a| a.attribute("vertical"))
                .and_then(parse_vertical),
            wrap: alignment
                .and_then(|a| a.attribute("wrapText"))
                .is_some_and(|v| v == "1" || v == "true"),
        }
    }
}

/// Differential format used by conditional formatting rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dxf {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub color: Option<XlsxColor>,
    pub fill: Option<XlsxColor>,
}

impl From<&ConditionalFormat> for Dxf {
    fn from(format: &ConditionalFormat) -> Self {
        Dxf {
            bold: format.bold,
            italic: format.italic,
            underline: format.underline,
            color: format.text_color.map(XlsxColor::rgb),
            fill: format.background_color.map(XlsxColor::rgb),
        }
    }
}

impl Dxf {
    fn to_element(&self) -> Element {
        let mut dxf = Element::new("dxf");
        let mut font = Element::new("font");
        if let Some(bold) = self.bold {
            font.push(Element::val("b", u8::from(bold)));
        }
        if let Some(italic) = self.italic {
            font.push(Element::val("i", u8::from(italic)));
        }
        if let Some(underline) = self.underline {
            font.push(Element::val("u", if underline { "single" } else { "none" }));
        }
        if let Some(color) = &self.color {
            font.push(color.to_element("color"));
        }
        if font.has_children() {
            dxf.push(font);
        }
        if let Some(fill) = &self.fill {
            dxf.push(Element::new("fill").child(
                Element::new("patternFill")
                    .attr("patternType", "solid")
                    .child(fill.to_element("bgColor")),
            ));
        }
        dxf
    }

    fn from_node(node: Node) -> Self {
        let font = child(node, "font");
        let flag = |name: &str| {
            font.and_then(|f| child(f, name)).map(|e| {
                e.attribute("val")
                    .map_or(true, |v| v != "0" && v != "false" && v != "none")
            })
        };
        Dxf {
            bold: flag("b"),
            italic: flag("i"),
            underline: flag("u"),
            color: font
                .and_then(|f| child(f, "color"))
                .and_then(XlsxColor::from_node),
            fill: child(node, "fill")
                .and_then(|f| child(f, "patternFill"))
                .and_then(|p| child(p, "bgColor"))
                .and_then(XlsxColor::from_node),
        }
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn section_records<'a, 'input>(root: Node<'a, 'input>, section: &str, record: &str) -> Vec<Node<'a, 'input>> {
    child(root, section)
        .map(|s| {
            s.children()
                .filter(|n| n.is_element() && n.tag_name().name() == record)
                .collect()
        })
        .unwrap_or_default()
}

fn horizontal_name(align: HorizontalAlign) -> &'static str {
    match align {
        HorizontalAlign::Left => "left",
        HorizontalAlign::Center => "center",
        HorizontalAlign::Right => "right",
        HorizontalAlign::Justify => "justify",
    }
}

fn parse_horizontal(name: &str) -> Option<HorizontalAlign> {
    match name {
        "left" => Some(HorizontalAlign::Left),
        "center" | "centerContinuous" => Some(HorizontalAlign::Center),
        "right" => Some(HorizontalAlign::Right),
        "justify" | "distributed" => Some(HorizontalAlign::Justify),
        _ => None,
    }
}

fn vertical_name(align: VerticalAlign) -> &'static str {
    match align {
        VerticalAlign::Top => "top",
        VerticalAlign::Middle => "center",
        VerticalAlign::Bottom => "bottom",
    }
}

fn parse_vertical(name: &str) -> Option<VerticalAlign> {
    match name {
        "top" => Some(VerticalAlign::Top),
        "center" => Some(VerticalAlign::Middle),
        "bottom" => Some(VerticalAlign::Bottom),
        _ => None,
    }
}

fn border_style_name(style: BorderStyle) -> &'static str {
    match style {
        BorderStyle::Thin => "thin",
        BorderStyle::Medium => "medium",
        BorderStyle::Thick => "thick",
        BorderStyle::Dashed => "dashed",
        BorderStyle::Dotted => "dotted",
        BorderStyle::Double => "double",
        BorderStyle::Hair => "hair",
    }
}

fn parse_border_style(name: &str) -> Option<BorderStyle> {
    match name {
        "thin" => Some(BorderStyle::Thin),
        "medium" => Some(BorderStyle::Medium),
        "thick" => Some(BorderStyle::Thick),
        "dashed" | "mediumDashed" | "dashDot" | "mediumDashDot" => Some(BorderStyle::Dashed),
        "dotted" | "dashDotDot" | "mediumDashDotDot" => Some(BorderStyle::Dotted),
        "double" => Some(BorderStyle::Double),
        "hair" => Some(BorderStyle::Hair),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct StyleCache {
    theme: Theme,
    fonts: Vec<Font>,
    fills: Vec<Fill>,
    borders: Vec<Border>,
    num_fmts: Vec<(u32, String)>,
    xfs: Vec<CellXf>,
    dxfs: Vec<Dxf>,
    next_num_fmt_id: u32,
}

impl Default for StyleCache {
    fn default() -> Self {
        StyleCache {
            theme: Theme::default(),
            fonts: vec![Font::default()],
            fills: vec![Fill::pattern("none"), Fill::pattern("gray125")],
            borders: vec![Border::default()],
            num_fmts: Vec::new(),
            xfs: vec![CellXf::default()],
            dxfs: Vec::new(),
            next_num_fmt_id: FIRST_CUSTOM_NUM_FMT,
        }
    }
}

impl StyleCache {
    pub fn new(theme: Theme) -> Self {
        StyleCache {
            theme,
            ..Default::default()
        }
    }

    /// Seed the cache from a style part. Tables the part leaves empty keep
    /// the built-in defaults so index 0 always exists.
    pub fn from_xml(xml: &str, theme: Theme) -> Result<Self> {
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        let records = |section: &str, record: &str| section_records(root, section, record);

        let mut cache = StyleCache::new(theme);
        for node in records("numFmts", "numFmt") {
            let id = node.attribute("numFmtId").and_then(|v| v.parse::<u32>().ok());
            if let (Some(id), Some(code)) = (id, node.attribute("formatCode")) {
                cache.num_fmts.push((id, code.to_string()));
                cache.next_num_fmt_id = cache.next_num_fmt_id.max(id + 1);
            }
        }

        let fonts: Vec<Font> = records("fonts", "font").into_iter().map(Font::from_node).collect();
        if !fonts.is_empty() {
            cache.fonts = fonts;
        }
        let fills: Vec<Fill> = records("fills", "fill").into_iter().map(Fill::from_node).collect();
        if !fills.is_empty() {
            cache.fills = fills;
        }
        let borders: Vec<Border> = records("borders", "border")
            .into_iter()
            .map(Border::from_node)
            .collect();
        if !borders.is_empty() {
            cache.borders = borders;
        }
        let xfs: Vec<CellXf> = records("cellXfs", "xf")
            .into_iter()
            .map(CellXf::from_node)
            .collect();
        if !xfs.is_empty() {
            cache.xfs = xfs;
        }
        cache.dxfs = records("dxfs", "dxf").into_iter().map(Dxf::from_node).collect();
        Ok(cache)
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn ensure_font(&mut self, font: Font) -> usize {
        ensure(&mut self.fonts, font)
    }

    pub fn ensure_fill(&mut self, fill: Fill) -> usize {
        ensure(&mut self.fills, fill)
    }

    pub fn ensure_border(&mut self, border: Border) -> usize {
        ensure(&mut self.borders, border)
    }

    pub fn ensure_xf(&mut self, xf: CellXf) -> usize {
        ensure(&mut self.xfs, xf)
    }

    pub fn ensure_dxf(&mut self, dxf: Dxf) -> usize {
        ensure(&mut self.dxfs, dxf)
    }

    /// Id for a number format code, reusing built-in ids where they exist.
    pub fn ensure_number_format(&mut self, code: &str) -> u32 {
        if let Some(id) = builtin_num_fmt_id(code) {
            return id;
        }
        if let Some((id, _)) = self.num_fmts.iter().find(|(_, existing)| existing == code) {
            return *id;
        }
        let id = self.next_num_fmt_id;
        self.next_num_fmt_id += 1;
        self.num_fmts.push((id, code.to_string()));
        id
    }

    pub fn number_format_code(&self, id: u32) -> Option<&str> {
        self.num_fmts
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, code)| code.as_str())
            .or_else(|| builtin_num_fmt_code(id))
    }

    /// Cell format index of an effective (already cascaded) style.
    pub fn ensure_style(&mut self, style: &Style, warnings: &mut Warnings) -> usize {
        let font = self.font_for(style, warnings);
        let font_id = self.ensure_font(font);

        let fill_id = match style.fill.as_ref().and_then(|c| self.resolve_color(c, warnings)) {
            Some(color) => self.ensure_fill(Fill::solid(color)),
            None => 0,
        };

        let border = Border {
            left: self.border_side(style.border_left.as_ref(), warnings),
            right: self.border_side(style.border_right.as_ref(), warnings),
            top: self.border_side(style.border_top.as_ref(), warnings),
            bottom: self.border_side(style.border_bottom.as_ref(), warnings),
        };
        let border_id = if border == Border::default() {
            0
        } else {
            self.ensure_border(border)
        };

        let num_fmt_id = style
            .number_format
            .as_deref()
            .map_or(0, |code| self.ensure_number_format(code));

        self.ensure_xf(CellXf {
            num_fmt_id,
            font_id,
            fill_id,
            border_id,
            horizontal: style.horizontal_align,
            vertical: style.vertical_align,
            wrap: style.wrap_text.unwrap_or(false),
        })
    }

    /// Font 0 with the style's font overrides applied.
    fn font_for(&self, style: &Style, warnings: &mut Warnings) -> Font {
        let mut font = self.fonts.first().cloned().unwrap_or_default();
        if let Some(family) = &style.font_family {
            if *family != font.name {
                font.name = family.clone();
                font.family = None;
                font.scheme = None;
            }
        }
        if let Some(size) = style.font_size {
            font.size = size;
        }
        if let Some(bold) = style.bold {
            font.bold = bold;
        }
        if let Some(italic) = style.italic {
            font.italic = italic;
        }
        if let Some(underline) = style.underline {
            font.underline = underline;
        }
        if let Some(strike) = style.strikethrough {
            font.strike = strike;
        }
        if let Some(color) = style.text_color.as_ref().and_then(|c| self.resolve_color(c, warnings)) {
            font.color = Some(color);
        }
        font
    }

    fn border_side(&self, edge: Option<&BorderEdge>, warnings: &mut Warnings) -> Option<BorderSide> {
        let edge = edge?;
        Some(BorderSide {
            style: border_style_name(edge.style).to_string(),
            color: edge.color.as_ref().and_then(|c| self.resolve_color(c, warnings)),
        })
    }

    /// Style-part color for a model color; unknown theme slots warn and yield `None`.
    pub fn resolve_color(&self, color: &ColorRef, warnings: &mut Warnings) -> Option<XlsxColor> {
        match color {
            ColorRef::Rgb(rgb) => Some(XlsxColor::rgb(*rgb)),
            ColorRef::Theme { theme, tint } => match self.theme.index_of(theme) {
                Some(index) => Some(XlsxColor::Theme {
                    index: index as u32,
                    tint: (*tint != 0.0).then_some(*tint),
                }),
                None => {
                    warnings.push(format_args!("unknown theme color {theme:?}; color dropped"));
                    None
                }
            },
        }
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    pub fn fill_count(&self) -> usize {
        self.fills.len()
    }

    pub fn border_count(&self) -> usize {
        self.borders.len()
    }

    pub fn xf_count(&self) -> usize {
        self.xfs.len()
    }

    pub fn dxf_count(&self) -> usize {
        self.dxfs.len()
    }

    pub fn xf(&self, index: usize) -> Option<&CellXf> {
        self.xfs.get(index)
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut sheet = Element::new("styleSheet").attr("xmlns", ns::MAIN);
        if !self.num_fmts.is_empty() {
            sheet.push(
                Element::new("numFmts")
                    .attr("count", self.num_fmts.len())
                    .children(self.num_fmts.iter().map(|(id, code)| {
                        Element::new("numFmt")
                            .attr("numFmtId", id)
                            .attr("formatCode", code)
                    })),
            );
        }
        sheet.push(
            Element::new("fonts")
                .attr("count", self.fonts.len())
                .children(self.fonts.iter().map(Font::to_element)),
        );
        sheet.push(
            Element::new("fills")
                .attr("count", self.fills.len())
                .children(self.fills.iter().map(Fill::to_element)),
        );
        sheet.push(
            Element::new("borders")
                .attr("count", self.borders.len())
                .children(self.borders.iter().map(Border::to_element)),
        );
        sheet.push(
            Element::new("cellStyleXfs").attr("count", 1).child(
                Element::new("xf")
                    .attr("numFmtId", 0)
                    .attr("fontId", 0)
                    .attr("fillId", 0)
                    .attr("borderId", 0),
            ),
        );
        sheet.push(
            Element::new("cellXfs")
                .attr("count", self.xfs.len())
                .children(self.xfs.iter().map(CellXf::to_element)),
        );
        sheet.push(
            Element::new("cellStyles").attr("count", 1).child(
                Element::new("cellStyle")
                    .attr("name", "Normal")
                    .attr("xfId", 0)
                    .attr("builtinId", 0),
            ),
        );
        sheet.push(
            Element::new("dxfs")
                .attr("count", self.dxfs.len())
                .children(self.dxfs.iter().map(Dxf::to_element)),
        );
        sheet.push(
            Element::new("tableStyles")
                .attr("count", 0)
                .attr("defaultTableStyle", "TableStyleMedium2")
                .attr("defaultPivotStyle", "PivotStyleLight16"),
        );
        sheet.to_document()
    }

    /// Model style layers for every cell format, index for index. Only what
    /// differs from the defaults at index 0 is carried over.
    pub fn to_model_styles(&self) -> Vec<Style> {
        let base_font = self.fonts.first().cloned().unwrap_or_default();
        self.xfs
            .iter()
            .map(|xf| {
                let mut style = Style::new();
                if let Some(font) = self.fonts.get(xf.font_id) {
                    if font.name != base_font.name {
                        style.font_family = Some(font.name.clone());
                    }
                    if font.size != base_font.size {
                        style.font_size = Some(font.size);
                    }
                    style.bold = font.bold.then_some(true);
                    style.italic = font.italic.then_some(true);
                    style.underline = font.underline.then_some(true);
                    style.strikethrough = font.strike.then_some(true);
                    if font.color != base_font.color {
                        style.text_color = font.color.as_ref().and_then(XlsxColor::to_color_ref);
                    }
                }
                if let Some(fill) = self.fills.get(xf.fill_id).filter(|f| f.pattern == "solid") {
                    style.fill = fill.fg_color.as_ref().and_then(XlsxColor::to_color_ref);
                }
                if let Some(border) = self.borders.get(xf.border_id) {
                    let edge = |side: &Option<BorderSide>| {
                        let side = side.as_ref()?;
                        Some(BorderEdge {
                            style: parse_border_style(&side.style)?,
                            color: side.color.as_ref().and_then(XlsxColor::to_color_ref),
                        })
                    };
                    style.border_left = edge(&border.left);
                    style.border_right = edge(&border.right);
                    style.border_top = edge(&border.top);
                    style.border_bottom = edge(&border.bottom);
                }
                style.horizontal_align = xf.horizontal;
                style.vertical_align = xf.vertical;
                style.wrap_text = xf.wrap.then_some(true);
                if xf.num_fmt_id != 0 {
                    style.number_format = self.number_format_code(xf.num_fmt_id).map(str::to_string);
                }
                style
            })
            .collect()
    }
}

fn ensure<T: PartialEq>(table: &mut Vec<T>, record: T) -> usize {
    if let Some(index) = table.iter().position(|existing| *existing == record) {
        return index;
    }
    table.push(record);
    table.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn template_cache() -> StyleCache {
        StyleCache::from_xml(Template::default().styles_xml(), Theme::default()).unwrap()
    }

    #[test]
    fn test_template_seeds_defaults() {
        let cache = template_cache();
        assert_eq!(cache.font_count(), 1);
        assert_eq!(cache.fill_count(), 2);
        assert_eq!(cache.border_count(), 1);
        assert_eq!(cache.xf_count(), 1);
        assert_eq!(cache.fonts[0], Font::default());
    }

    #[test]
    fn test_empty_style_is_xf_zero() {
        let mut cache = template_cache();
        let mut warnings = Warnings::new();
        assert_eq!(cache.ensure_style(&Style::new(), &mut warnings), 0);
        assert_eq!(cache.ensure_style(&Style::new().with_bold(false), &mut warnings), 0);
        assert_eq!(cache.xf_count(), 1);
    }

    #[test]
    fn test_equal_styles_share_one_record() {
        let mut cache = template_cache();
        let mut warnings = Warnings::new();
        let bold_red = Style::new().with_bold(true).with_fill(Color::RED);
        let a = cache.ensure_style(&bold_red, &mut warnings);
        let b = cache.ensure_style(&bold_red.clone(), &mut warnings);
        let c = cache.ensure_style(&Style::new().with_bold(true), &mut warnings);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache.font_count(), 2);
        assert_eq!(cache.fill_count(), 3);
    }

    #[test]
    fn test_number_formats() {
        let mut cache = template_cache();
        assert_eq!(cache.ensure_number_format("General"), 0);
        assert_eq!(cache.ensure_number_format("general"), 0);
        assert_eq!(cache.ensure_number_format("0.00%"), 10);
        assert_eq!(cache.ensure_number_format("@"), 49);
        assert_eq!(cache.ensure_number_format("yyyy-mm-dd"), 164);
        assert_eq!(cache.ensure_number_format("#,##0.000"), 165);
        assert_eq!(cache.ensure_number_format("yyyy-mm-dd"), 164);
        assert_eq!(cache.number_format_code(165), Some("#,##0.000"));
        assert_eq!(cache.number_format_code(14), Some("mm-dd-yy"));
    }

    #[test]
    fn test_custom_ids_start_above_seeded_ones() {
        let xml = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="170" formatCode="0.0"/></numFmts></styleSheet>"#;
        let mut cache = StyleCache::from_xml(xml, Theme::default()).unwrap();
        assert_eq!(cache.ensure_number_format("0.0"), 170);
        assert_eq!(cache.ensure_number_format("0.000"), 171);
        assert_eq!(cache.xf_count(), 1);
    }

    #[test]
    fn test_theme_colors_and_unknown_slots() {
        let mut cache = template_cache();
        let mut warnings = Warnings::new();
        let themed = Style::new().with_text_color(ColorRef::theme("accent1", -0.25));
        let index = cache.ensure_style(&themed, &mut warnings);
        let font = &cache.fonts[cache.xf(index).unwrap().font_id];
        assert_eq!(
            font.color,
            Some(XlsxColor::Theme {
                index: 4,
                tint: Some(-0.25)
            })
        );
        assert!(warnings.is_empty());

        let unknown = Style::new().with_fill(ColorRef::theme("sparkle", 0.0));
        assert_eq!(cache.ensure_style(&unknown, &mut warnings), 0);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_xml_round_trip_to_model_styles() {
        let mut cache = template_cache();
        let mut warnings = Warnings::new();
        let style = Style::new()
            .with_font_family("Arial")
            .with_font_size(14.0)
            .with_italic(true)
            .with_fill(Color::rgb(0x12, 0x34, 0x56))
            .with_border(BorderEdge::new(BorderStyle::Thin))
            .with_horizontal_align(HorizontalAlign::Center)
            .with_wrap_text(true)
            .with_number_format("0.0%");
        let index = cache.ensure_style(&style, &mut warnings);
        let dxf = cache.ensure_dxf(Dxf {
            bold: Some(true),
            fill: Some(XlsxColor::rgb(Color::GREEN)),
            ..Default::default()
        });

        let xml = cache.to_xml().unwrap();
        assert!(xml.contains(r#"<numFmt numFmtId="164" formatCode="0.0%"/>"#));
        assert!(xml.contains(r#"<alignment horizontal="center" wrapText="1"/>"#));

        let parsed = StyleCache::from_xml(&xml, Theme::default()).unwrap();
        assert_eq!(parsed.dxf_count(), 1);
        assert_eq!(parsed.dxfs[dxf], cache.dxfs[dxf]);
        let styles = parsed.to_model_styles();
        assert_eq!(styles[0], Style::new());
        assert_eq!(styles[index], style);
    }

    fn arb_xf() -> impl Strategy<Value = CellXf> {
        (0u32..3, 0usize..3, 0usize..3, 0usize..2, any::<bool>(), any::<bool>()).prop_map(
            |(num_fmt_id, font_id, fill_id, border_id, centered, wrap)| CellXf {
                num_fmt_id,
                font_id,
                fill_id,
                border_id,
                horizontal: centered.then_some(HorizontalAlign::Center),
                vertical: None,
                wrap,
            },
        )
    }

    proptest! {
        #[test]
        fn prop_xf_index_equality_matches_record_equality(a in arb_xf(), b in arb_xf()) {
            let mut cache = StyleCache::default();
            let ia = cache.ensure_xf(a);
            let ib = cache.ensure_xf(b);
            prop_assert_eq!(ia == ib, a == b);
            prop_assert_eq!(cache.ensure_xf(a), ia);
        }

        #[test]
        fn prop_font_index_equality_matches_record_equality(
            bold in any::<bool>(),
            italic in any::<bool>(),
            size in prop_oneof![Just(11.0), Just(12.0)],
        ) {
            let mut cache = StyleCache::default();
            let font = Font { bold, italic, size, ..Font::default() };
            let first = cache.ensure_font(font.clone());
            prop_assert_eq!(cache.ensure_font(font.clone()), first);
            prop_assert_eq!(first == 0, font == Font::default());
        }
    }
}
