use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }

    /// Convert to CSS hex color string
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }

    /// Parse from CSS hex color string (`#rgb`, `#rrggbb` or `#rrggbbaa`)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let r = channel(&hex[0..1])?;
                let g = channel(&hex[1..2])?;
                let b = channel(&hex[2..3])?;
                Some(Color::rgb(r * 17, g * 17, b * 17))
            }
            6 => Some(Color::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Some(Color::rgba(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }

    /// `AARRGGBB`, the form workbook parts store colors in.
    pub fn to_argb(&self) -> String {
        format!("{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
    }

    /// Parse `AARRGGBB` (or `RRGGBB`) from a workbook part.
    pub fn from_argb(argb: &str) -> Option<Self> {
        let argb = argb.trim();
        match argb.len() {
            8 if argb.is_ascii() => {
                let a = u8::from_str_radix(&argb[0..2], 16).ok()?;
                let rgb = Color::from_hex(&argb[2..])?;
                Some(Color { a, ..rgb })
            }
            6 => Color::from_hex(argb),
            _ => None,
        }
    }

    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Color::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color {hex:?}")))
    }
}

/// A color as the host describes it: a literal color or a theme slot with tint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorRef {
    Rgb(Color),
    Theme {
        theme: String,
        #[serde(default)]
        tint: f64,
    },
}

impl ColorRef {
    pub fn theme(name: impl Into<String>, tint: f64) -> Self {
        ColorRef::Theme {
            theme: name.into(),
            tint,
        }
    }
}

impl From<Color> for ColorRef {
    fn from(color: Color) -> Self {
        ColorRef::Rgb(color)
    }
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
    Justify,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BorderStyle {
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
}

/// One edge of a cell border.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorderEdge {
    pub style: BorderStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorRef>,
}

impl BorderEdge {
    pub fn new(style: BorderStyle) -> Self {
        BorderEdge { style, color: None }
    }
}

/// A partial style layer.
///
/// Every field is optional: a layer only says what it overrides. The effective
/// style of a cell is the cascade of the sheet, row, column and cell layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Style {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<ColorRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<ColorRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_top: Option<BorderEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_right: Option<BorderEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_bottom: Option<BorderEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_left: Option<BorderEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_align: Option<HorizontalAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<VerticalAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_text: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
}

macro_rules! overlay_fields {
    ($target:expr, $layer:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$layer.$field {
                $target.$field = Some(value.clone());
            }
        )+
    };
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay another layer onto this one (set fields of `layer` win)
    pub fn overlay(&mut self, layer: &Style) {
        overlay_fields!(
            self,
            layer,
            font_family,
            font_size,
            bold,
            italic,
            underline,
            strikethrough,
            text_color,
            fill,
            border_top,
            border_right,
            border_bottom,
            border_left,
            horizontal_align,
            vertical_align,
            wrap_text,
            number_format,
        );
    }

    /// Fold layers left to right into one effective style.
    ///
    /// ```
    /// use xlport_core::Style;
    ///
    /// let sheet = Style::new().with_bold(true).with_font_size(10.0);
    /// let cell = Style::new().with_font_size(14.0);
    /// let effective = Style::cascade([Some(&sheet), None, Some(&cell)]);
    /// assert_eq!(effective.bold, Some(true));
    /// assert_eq!(effective.font_size, Some(14.0));
    /// ```
    pub fn cascade<'a, I>(layers: I) -> Style
    where
        I: IntoIterator<Item = Option<&'a Style>>,
    {
        layers
            .into_iter()
            .flatten()
            .fold(Style::default(), |mut acc, layer| {
                acc.overlay(layer);
                acc
            })
    }

    pub fn is_empty(&self) -> bool {
        *self == Style::default()
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = Some(italic);
        self
    }

    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn with_text_color(mut self, color: impl Into<ColorRef>) -> Self {
        self.text_color = Some(color.into());
        self
    }

    pub fn with_fill(mut self, color: impl Into<ColorRef>) -> Self {
        self.fill = Some(color.into());
        self
    }

    pub fn with_horizontal_align(mut self, align: HorizontalAlign) -> Self {
        self.horizontal_align = Some(align);
        self
    }

    pub fn with_vertical_align(mut self, align: VerticalAlign) -> Self {
        self.vertical_align = Some(align);
        self
    }

    pub fn with_wrap_text(mut self, wrap: bool) -> Self {
        self.wrap_text = Some(wrap);
        self
    }

    pub fn with_number_format(mut self, format: impl Into<String>) -> Self {
        self.number_format = Some(format.into());
        self
    }

    /// Set the same edge on all four sides
    pub fn with_border(mut self, edge: BorderEdge) -> Self {
        self.border_top = Some(edge.clone());
        self.border_right = Some(edge.clone());
        self.border_bottom = Some(edge.clone());
        self.border_left = Some(edge);
        self
    }
}

/// Reference to a style: an index into the model's shared style array, or an
/// inline layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleRef {
    Index(usize),
    Inline(Style),
}

impl StyleRef {
    /// Resolve against the shared style array. Out-of-range indices resolve to
    /// no style at all.
    pub fn resolve<'a>(&'a self, shared: &'a [Style]) -> Option<&'a Style> {
        match self {
            StyleRef::Index(index) => shared.get(*index),
            StyleRef::Inline(style) => Some(style),
        }
    }
}

impl From<usize> for StyleRef {
    fn from(index: usize) -> Self {
        StyleRef::Index(index)
    }
}

impl From<Style> for StyleRef {
    fn from(style: Style) -> Self {
        StyleRef::Inline(style)
    }
}
