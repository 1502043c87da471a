//! Workbook part: sheet list, visibility, active tab and defined names.

use xlport_core::{SerializedModel, SerializedSheet, SheetVisibility};

use crate::error::Result;
use crate::formula::FormulaTranslator;
use crate::warnings::Warnings;
use crate::xml::{ns, Element};

pub const PART: &str = "xl/workbook.xml";

/// One `<definedName>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    pub name: String,
    pub value: String,
    pub local_sheet_id: Option<usize>,
    pub hidden: bool,
}

impl DefinedName {
    fn to_element(&self) -> Element {
        Element::new("definedName")
            .attr("name", &self.name)
            .opt_attr("localSheetId", self.local_sheet_id)
            .flag("hidden", self.hidden)
            .text(&self.value)
    }
}

/// Keep at least one sheet visible: when every sheet is hidden the first
/// one is shown again.
pub fn ensure_visible_sheet(sheets: &mut [SerializedSheet], warnings: &mut Warnings) {
    if sheets.iter().any(SerializedSheet::is_visible) {
        return;
    }
    if let Some(first) = sheets.first_mut() {
        warnings.push(format_args!(
            "all sheets are hidden; sheet {:?} made visible",
            first.name
        ));
        first.visibility = SheetVisibility::Visible;
    }
}

/// Index of the active sheet, falling back to the first visible sheet when
/// the active one is missing or hidden.
pub fn active_tab(model: &SerializedModel) -> usize {
    let active = model
        .active_sheet
        .as_deref()
        .and_then(|id| model.sheet_index(id))
        .filter(|&index| model.sheets[index].is_visible());
    active
        .or_else(|| model.sheets.iter().position(SerializedSheet::is_visible))
        .unwrap_or(0)
}

/// Defined names from named expressions and macro functions.
pub fn defined_names(
    model: &SerializedModel,
    translator: &FormulaTranslator,
    warnings: &mut Warnings,
) -> Vec<DefinedName> {
    let mut names = Vec::with_capacity(model.named.len() + model.macros.len());
    for named in &model.named {
        let local_sheet_id = match &named.scope {
            Some(scope) => {
                let index = model.sheet_index(scope);
                if index.is_none() {
                    warnings.push(format_args!(
                        "name {} scoped to unknown sheet {scope:?}; using workbook scope",
                        named.name
                    ));
                }
                index
            }
            None => None,
        };
        names.push(DefinedName {
            name: named.name.clone(),
            value: translator.translate(&named.expression, None, warnings),
            local_sheet_id,
            hidden: named.hidden,
        });
    }
    for function in &model.macros {
        names.push(DefinedName {
            name: function.name.clone(),
            value: translator.lambda_definition(function, warnings),
            local_sheet_id: None,
            hidden: false,
        });
    }
    names
}

/// Build `xl/workbook.xml`. `sheet_rel_ids[i]` is the workbook relationship
/// of sheet `i`.
pub fn workbook_xml(
    model: &SerializedModel,
    sheet_rel_ids: &[String],
    defined_names: &[DefinedName],
) -> Result<String> {
    let sheets = model
        .sheets
        .iter()
        .zip(sheet_rel_ids)
        .enumerate()
        .map(|(index, (sheet, rel_id))| {
            let state = match sheet.visibility {
                SheetVisibility::Visible => None,
                SheetVisibility::Hidden => Some("hidden"),
                SheetVisibility::VeryHidden => Some("veryHidden"),
            };
            Element::new("sheet")
                .attr("name", &sheet.name)
                .attr("sheetId", index + 1)
                .opt_attr("state", state)
                .attr("r:id", rel_id)
        });

    let mut workbook = Element::new("workbook")
        .attr("xmlns", ns::MAIN)
        .attr("xmlns:r", ns::REL)
        .child(Element::new("workbookPr").attr("defaultThemeVersion", 164011))
        .child(
            Element::new("bookViews")
                .child(Element::new("workbookView").attr("activeTab", active_tab(model))),
        )
        .child(Element::new("sheets").children(sheets));
    if !defined_names.is_empty() {
        workbook = workbook.child(
            Element::new("definedNames").children(defined_names.iter().map(DefinedName::to_element)),
        );
    }
    workbook
        .child(
            Element::new("calcPr")
                .attr("calcId", 191029)
                .attr("fullCalcOnLoad", 1),
        )
        .to_document()
}
