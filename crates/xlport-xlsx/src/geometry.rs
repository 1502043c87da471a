//! Pixel geometry: column widths in character units, row heights in points,
//! and two-cell anchors for drawing objects.

use xlport_core::{LayoutCorner, Placement, SerializedSheet};

/// Maximum digit width of the default font (Calibri 11) in pixels.
pub const MAX_DIGIT_WIDTH: f64 = 7.0;
/// Cell padding in pixels added to every column.
pub const COLUMN_PADDING: f64 = 5.0;
pub const EMU_PER_PIXEL: i64 = 9525;
pub const POINTS_PER_PIXEL: f64 = 0.75;
/// Upper bound on columns/rows scanned while placing an anchor.
pub const ANCHOR_SCAN_LIMIT: u32 = 1000;

/// Column width in character units for a pixel width.
///
/// ```
/// use xlport_xlsx::geometry::pixels_to_column_width;
///
/// assert_eq!(pixels_to_column_width(100.0), 14.28125);
/// assert_eq!(pixels_to_column_width(64.0), 9.140625);
/// ```
pub fn pixels_to_column_width(px: f64) -> f64 {
    let chars = ((px - COLUMN_PADDING) / MAX_DIGIT_WIDTH * 100.0 + 0.5).trunc() / 100.0;
    ((chars * MAX_DIGIT_WIDTH + COLUMN_PADDING) / MAX_DIGIT_WIDTH * 256.0).trunc() / 256.0
}

/// Pixel width of a column given in character units.
pub fn column_width_to_pixels(width: f64) -> f64 {
    let padding = (128.0 / MAX_DIGIT_WIDTH).trunc();
    (((256.0 * width + padding) / 256.0) * MAX_DIGIT_WIDTH).trunc()
}

pub fn pixels_to_points(px: f64) -> f64 {
    px * POINTS_PER_PIXEL
}

pub fn points_to_pixels(points: f64) -> f64 {
    points / POINTS_PER_PIXEL
}

pub fn pixels_to_emu(px: f64) -> i64 {
    (px * EMU_PER_PIXEL as f64).round() as i64
}

/// One corner of a two-cell anchor. Offsets are EMU inside the cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorPoint {
    pub col: u32,
    pub col_offset: i64,
    pub row: u32,
    pub row_offset: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TwoCellAnchor {
    pub from: AnchorPoint,
    pub to: AnchorPoint,
}

impl TwoCellAnchor {
    /// Anchor a placement against the sheet's row and column sizes.
    pub fn for_placement(sheet: &SerializedSheet, placement: &Placement) -> Self {
        match placement {
            Placement::Rect {
                x,
                y,
                width,
                height,
            } => {
                let x = x.max(0.0);
                let y = y.max(0.0);
                TwoCellAnchor {
                    from: point_at(sheet, x, y),
                    to: point_at(sheet, x + width.max(0.0), y + height.max(0.0)),
                }
            }
            Placement::Layout { from, to } => TwoCellAnchor {
                from: layout_point(sheet, from),
                to: layout_point(sheet, to),
            },
        }
    }
}

fn point_at(sheet: &SerializedSheet, x: f64, y: f64) -> AnchorPoint {
    let (col, col_px) = locate(x, |col| sheet.col_width(col));
    let (row, row_px) = locate(y, |row| sheet.row_height(row));
    AnchorPoint {
        col,
        col_offset: pixels_to_emu(col_px),
        row,
        row_offset: pixels_to_emu(row_px),
    }
}

/// Walk cells from the origin until `position` falls inside one; returns the
/// cell index and the pixel offset within it.
fn locate(position: f64, size_of: impl Fn(u32) -> f64) -> (u32, f64) {
    let mut start = 0.0;
    let mut index = 0;
    while index < ANCHOR_SCAN_LIMIT {
        let size = size_of(index).max(0.0);
        if position < start + size {
            break;
        }
        start += size;
        index += 1;
    }
    (index, position - start)
}

fn layout_point(sheet: &SerializedSheet, corner: &LayoutCorner) -> AnchorPoint {
    let fraction = |f: f64| f.clamp(0.0, 1.0);
    AnchorPoint {
        col: corner.col,
        col_offset: pixels_to_emu(fraction(corner.offset_x) * sheet.col_width(corner.col)),
        row: corner.row,
        row_offset: pixels_to_emu(fraction(corner.offset_y) * sheet.row_height(corner.row)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_column_width_conversions() {
        assert_eq!(pixels_to_column_width(100.0), 14.28125);
        assert_eq!(column_width_to_pixels(14.28125), 100.0);
        assert_eq!(column_width_to_pixels(9.140625), 64.0);
    }

    #[test]
    fn test_units() {
        assert_eq!(pixels_to_points(24.0), 18.0);
        assert_eq!(points_to_pixels(15.0), 20.0);
        assert_eq!(pixels_to_emu(10.0), 95250);
    }

    #[test]
    fn test_rect_anchor_uses_sheet_sizes() {
        let mut sheet = SerializedSheet::new("s1", "Data");
        sheet.set_col_width(0, 50.0);
        sheet.set_row_height(1, 40.0);

        let anchor = TwoCellAnchor::for_placement(
            &sheet,
            &Placement::Rect {
                x: 60.0,
                y: 30.0,
                width: 100.0,
                height: 50.0,
            },
        );
        assert_eq!(
            anchor.from,
            AnchorPoint {
                col: 1,
                col_offset: pixels_to_emu(10.0),
                row: 1,
                row_offset: pixels_to_emu(6.0),
            }
        );
        assert_eq!(
            anchor.to,
            AnchorPoint {
                col: 2,
                col_offset: pixels_to_emu(10.0),
                row: 2,
                row_offset: pixels_to_emu(16.0),
            }
        );
    }

    #[test]
    fn test_layout_anchor_scales_fractions() {
        let sheet = SerializedSheet::new("s1", "Data");
        let anchor = TwoCellAnchor::for_placement(
            &sheet,
            &Placement::Layout {
                from: LayoutCorner {
                    row: 2,
                    col: 1,
                    offset_x: 0.5,
                    offset_y: 0.25,
                },
                to: LayoutCorner::new(10, 5),
            },
        );
        assert_eq!(anchor.from.col_offset, pixels_to_emu(50.0));
        assert_eq!(anchor.from.row_offset, pixels_to_emu(6.0));
        assert_eq!(anchor.to, AnchorPoint { col: 5, col_offset: 0, row: 10, row_offset: 0 });
    }

    #[test]
    fn test_anchor_walk_is_bounded() {
        let mut sheet = SerializedSheet::new("s1", "Data");
        sheet.default_column_width = 0.0;
        let anchor = TwoCellAnchor::for_placement(
            &sheet,
            &Placement::Rect {
                x: 10.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
        );
        assert_eq!(anchor.from.col, ANCHOR_SCAN_LIMIT);
    }

    proptest! {
        #[test]
        fn prop_width_round_trip_is_stable(px in 6u32..2000) {
            let width = pixels_to_column_width(px as f64);
            let back = column_width_to_pixels(width);
            prop_assert!((back - px as f64).abs() <= 1.0);
            let again = pixels_to_column_width(back);
            prop_assert_eq!(column_width_to_pixels(again), back);
            prop_assert_eq!(pixels_to_column_width(column_width_to_pixels(again)), again);
        }
    }
}
