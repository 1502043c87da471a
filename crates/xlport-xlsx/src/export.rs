//! Export orchestration: one [`ExportSession`] per call walks the model and
//! fills a copy of the template package.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xlport_core::{AnnotationKind, SerializedModel, SerializedSheet, Style, Table};
use xlport_formula::{Decorations, FormulaLocale};

use crate::chart::parse_chart;
use crate::content_types::{self, types, ContentTypes};
use crate::drawing::{parse_data_uri, Drawing};
use crate::error::Result;
use crate::formula::FormulaTranslator;
use crate::geometry::TwoCellAnchor;
use crate::package::{BinaryEncoding, Blob, Package};
use crate::relationships::{rel_types, rels_path_for, Relationships};
use crate::shared_strings::{self, SharedStrings};
use crate::styles::StyleCache;
use crate::table::{normalize_table_names, prepare_table};
use crate::template::{Template, STYLES_PART, THEME_PART};
use crate::theme::Theme;
use crate::warnings::Warnings;
use crate::workbook::{self, defined_names, ensure_visible_sheet, workbook_xml};
use crate::worksheet::{write_worksheet, SheetContext, SheetLinks};

const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const ROOT_RELS: &str = "_rels/.rels";
const CORE_PROPERTIES: &str = "docProps/core.xml";
const EXTENDED_PROPERTIES: &str = "docProps/app.xml";

/// Template parts regenerated on every export.
const GENERATED_PREFIXES: [&str; 6] = [
    "xl/worksheets/",
    "xl/tables/",
    "xl/drawings/",
    "xl/charts/",
    "xl/media/",
    "xl/calcChain.xml",
];

/// Engine options a host may send along with a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    /// Function-name prefixes; the standard set when absent.
    pub decorations: Option<Decorations>,
    /// Punctuation the host writes formulas in.
    pub locale: FormulaLocale,
}

impl ExportOptions {
    fn translator(&self) -> FormulaTranslator {
        let decorations = self.decorations.clone().unwrap_or_else(Decorations::standard);
        FormulaTranslator::new(self.locale, decorations)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub blob: Blob,
    /// Degradations met along the way (skipped images, verbatim formulas...).
    pub warnings: Vec<String>,
}

/// Turns models into spreadsheet packages.
///
/// ```
/// use xlport_core::{Cell, CellCoord, SerializedModel, SerializedSheet};
/// use xlport_xlsx::export::Exporter;
///
/// let mut sheet = SerializedSheet::new("s1", "Sheet1");
/// sheet.set_cell(CellCoord::new(0, 0), Cell::number(42.0));
/// let output = Exporter::default().export(SerializedModel::new(vec![sheet])).unwrap();
/// assert!(output.blob.bytes.starts_with(b"PK"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    options: ExportOptions,
    template: Template,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Exporter {
            options,
            template: Template::default(),
        }
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export an owned model. Table headers and footers are coerced to text
    /// on this copy.
    pub fn export(&self, model: SerializedModel) -> Result<ExportOutput> {
        model.validate()?;
        let session = ExportSession::new(&self.template, self.options.translator())?;
        session.run(model)
    }
}

/// Convenience for [`Exporter::export`] with default options and template.
pub fn export_xlsx(model: SerializedModel) -> Result<ExportOutput> {
    Exporter::default().export(model)
}

/// Per-export state: the package under construction, interning tables,
/// manifests and part counters.
struct ExportSession {
    package: Package,
    strings: SharedStrings,
    styles: StyleCache,
    content_types: ContentTypes,
    workbook_rels: Relationships,
    translator: FormulaTranslator,
    warnings: Warnings,
    table_count: u32,
    drawing_count: u32,
    chart_count: u32,
    image_count: u32,
    image_types: BTreeMap<&'static str, &'static str>,
}

impl ExportSession {
    fn new(template: &Template, translator: FormulaTranslator) -> Result<Self> {
        let theme = Theme::from_xml(template.theme_xml())?;
        let styles = StyleCache::from_xml(template.styles_xml(), theme)?;
        let mut package = template.to_package();
        for prefix in GENERATED_PREFIXES {
            package.remove_prefixed(prefix);
        }
        Ok(ExportSession {
            package,
            strings: SharedStrings::new(),
            styles,
            content_types: ContentTypes::new(),
            workbook_rels: Relationships::new(),
            translator,
            warnings: Warnings::new(),
            table_count: 0,
            drawing_count: 0,
            chart_count: 0,
            image_count: 0,
            image_types: BTreeMap::new(),
        })
    }

    fn run(mut self, mut model: SerializedModel) -> Result<ExportOutput> {
        ensure_visible_sheet(&mut model.sheets, &mut self.warnings);
        normalize_table_names(&mut model.tables, &mut model.sheets, &mut self.warnings);
        for table in &model.tables {
            if !model.sheets.iter().any(|sheet| sheet.id == table.sheet) {
                self.warnings.push(format_args!(
                    "table {:?} skipped: no sheet with id {:?}",
                    table.name, table.sheet
                ));
            }
        }

        let active = workbook::active_tab(&model);
        let mut sheet_rel_ids = Vec::with_capacity(model.sheets.len());
        {
            let SerializedModel {
                sheets,
                tables,
                styles,
                ..
            } = &mut model;
            for (index, sheet) in sheets.iter_mut().enumerate() {
                let rel_id = self.write_sheet(index, sheet, tables, styles, index == active)?;
                sheet_rel_ids.push(rel_id);
            }
        }

        self.write_workbook_parts(&model, &sheet_rel_ids)?;
        tracing::debug!(
            sheets = model.sheets.len(),
            tables = self.table_count,
            charts = self.chart_count,
            images = self.image_count,
            warnings = self.warnings.len(),
            "export finished"
        );
        Ok(ExportOutput {
            blob: self.package.into_blob()?,
            warnings: self.warnings.into_vec(),
        })
    }

    fn write_sheet(
        &mut self,
        index: usize,
        sheet: &mut SerializedSheet,
        tables: &[Table],
        shared_styles: &[Style],
        selected: bool,
    ) -> Result<String> {
        let file = format!("sheet{}.xml", index + 1);
        let part = format!("xl/worksheets/{file}");
        let mut relationships = Relationships::new();
        let mut links = SheetLinks {
            selected,
            ..Default::default()
        };

        let sheet_id = sheet.id.clone();
        for table in tables.iter().filter(|t| t.sheet == sheet_id) {
            self.table_count += 1;
            let id = self.table_count;
            let prepared = prepare_table(table, id, sheet, &self.translator, &mut self.warnings);
            let table_part = format!("xl/tables/table{id}.xml");
            self.package.set(&table_part, prepared.to_xml()?);
            self.content_types.add_override(&table_part, types::TABLE);
            links.tables.push(
                relationships.add(rel_types::TABLE, format!("../tables/table{id}.xml")),
            );
        }

        if let Some(drawing) = self.build_drawing(sheet)? {
            links.drawing = Some(relationships.add(rel_types::DRAWING, drawing));
        }
        if let Some(source) = sheet.background_image.as_deref() {
            if let Some(target) = self.add_image(source, "background") {
                links.picture = Some(relationships.add(rel_types::IMAGE, target));
            }
        }

        let xml = {
            let mut cx = SheetContext {
                strings: &mut self.strings,
                styles: &mut self.styles,
                relationships: &mut relationships,
                translator: &self.translator,
                warnings: &mut self.warnings,
            };
            write_worksheet(sheet, shared_styles, &links, &mut cx)?
        };
        self.package.set(&part, xml);
        if !relationships.is_empty() {
            self.package.set(rels_path_for(&part), relationships.to_xml()?);
        }
        self.content_types.add_override(&part, types::WORKSHEET);
        Ok(self
            .workbook_rels
            .add(rel_types::WORKSHEET, format!("worksheets/{file}")))
    }

    /// Write the sheet's drawing part (and the charts and images it points
    /// to). Returns the drawing target relative to the worksheet.
    fn build_drawing(&mut self, sheet: &SerializedSheet) -> Result<Option<String>> {
        let mut drawing = Drawing::new();
        for annotation in &sheet.annotations {
            let anchor = TwoCellAnchor::for_placement(sheet, &annotation.placement);
            let name = annotation.name.as_deref();
            match &annotation.kind {
                AnnotationKind::Chart { formula } => {
                    let Some(chart) = parse_chart(formula, &sheet.name, &mut self.warnings) else {
                        continue;
                    };
                    self.chart_count += 1;
                    let id = self.chart_count;
                    let chart_part = format!("xl/charts/chart{id}.xml");
                    self.package.set(&chart_part, chart.to_xml()?);
                    self.package
                        .set(rels_path_for(&chart_part), Relationships::new().to_xml()?);
                    self.content_types.add_override(&chart_part, types::CHART);
                    drawing.add_chart(anchor, name, &format!("../charts/chart{id}.xml"));
                }
                AnnotationKind::Image { source } => {
                    if let Some(target) = self.add_image(source, name.unwrap_or("image")) {
                        drawing.add_picture(anchor, name, &target);
                    }
                }
                AnnotationKind::TextBox { text } => drawing.add_text_box(anchor, name, text),
            }
        }
        if drawing.is_empty() {
            return Ok(None);
        }

        self.drawing_count += 1;
        let id = self.drawing_count;
        let part = format!("xl/drawings/drawing{id}.xml");
        self.package.set(&part, drawing.to_xml()?);
        if !drawing.relationships().is_empty() {
            self.package
                .set(rels_path_for(&part), drawing.relationships().to_xml()?);
        }
        self.content_types.add_override(&part, types::DRAWING);
        Ok(Some(format!("../drawings/drawing{id}.xml")))
    }

    /// Store a data-URI image under `xl/media/`. Returns its target relative
    /// to a part one directory below `xl/`.
    fn add_image(&mut self, source: &str, label: &str) -> Option<String> {
        let Some(uri) = parse_data_uri(source) else {
            self.warnings
                .push(format_args!("{label}: only base64 png, jpeg, gif and bmp data URIs are embedded"));
            return None;
        };
        let file = format!("image{}.{}", self.image_count + 1, uri.extension);
        let path = format!("xl/media/{file}");
        if let Err(err) = self.package.set_binary(&path, uri.payload, BinaryEncoding::Base64) {
            self.warnings.push(format_args!("{label}: image data skipped: {err}"));
            return None;
        }
        self.image_count += 1;
        self.image_types.insert(uri.extension, uri.media_type);
        Some(format!("../media/{file}"))
    }

    fn write_workbook_parts(&mut self, model: &SerializedModel, sheet_rel_ids: &[String]) -> Result<()> {
        self.package.set(shared_strings::PART, self.strings.to_xml()?);
        self.content_types
            .add_override(shared_strings::PART, types::SHARED_STRINGS);
        self.workbook_rels
            .add(rel_types::SHARED_STRINGS, "sharedStrings.xml");

        self.package.set(STYLES_PART, self.styles.to_xml()?);
        self.content_types.add_override(STYLES_PART, types::STYLES);
        self.workbook_rels.add(rel_types::STYLES, "styles.xml");

        self.content_types.add_override(THEME_PART, types::THEME);
        self.workbook_rels.add(rel_types::THEME, "theme/theme1.xml");

        let names = defined_names(model, &self.translator, &mut self.warnings);
        self.package
            .set(workbook::PART, workbook_xml(model, sheet_rel_ids, &names)?);
        self.content_types.add_override(workbook::PART, types::WORKBOOK);
        self.package.set(WORKBOOK_RELS, self.workbook_rels.to_xml()?);

        let mut root_rels = Relationships::new();
        root_rels.add(rel_types::OFFICE_DOCUMENT, workbook::PART);
        for (part, content_type, rel_type) in [
            (CORE_PROPERTIES, types::CORE_PROPERTIES, rel_types::CORE_PROPERTIES),
            (
                EXTENDED_PROPERTIES,
                types::EXTENDED_PROPERTIES,
                rel_types::EXTENDED_PROPERTIES,
            ),
        ] {
            if self.package.contains(part) {
                self.content_types.add_override(part, content_type);
                root_rels.add(rel_type, part);
            }
        }
        self.package.set(ROOT_RELS, root_rels.to_xml()?);

        for (extension, media_type) in &self.image_types {
            self.content_types.add_default(extension, media_type);
        }
        self.package
            .set(content_types::PART, self.content_types.to_xml()?);
        Ok(())
    }
}
