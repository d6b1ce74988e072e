//! Marker-to-answer placement
//!
//! Answers pair with markers by position: the i-th answer is drawn next to the
//! i-th marker in document order. Surplus markers stay blank and surplus
//! answers are dropped.

use serde::Serialize;

use crate::geometry::Point;
use crate::locator::MarkerOccurrence;

/// Offsets used to derive a drawing point from a marker box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRule {
    /// Horizontal distance from the marker's right edge to the answer
    pub offset_x: f64,
    /// Distance kept from the right edge of the page for the line end
    pub margin: f64,
}

impl Default for PlacementRule {
    fn default() -> Self {
        Self {
            offset_x: 20.0,
            margin: 20.0,
        }
    }
}

impl PlacementRule {
    /// Drawing point for a marker on a page of the given width
    pub fn place(&self, marker: &MarkerOccurrence, page_width: f64) -> PlacementPoint {
        PlacementPoint {
            page: marker.page,
            point: Point::new(marker.rect.x1 + self.offset_x, marker.rect.y0),
            line_end: Point::new(page_width - self.margin, marker.rect.y0),
        }
    }
}

/// Where one answer is drawn, in page space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlacementPoint {
    pub page: usize,
    /// Baseline origin of the drawn text
    pub point: Point,
    /// Right end of the answer line; informational only
    pub line_end: Point,
}

/// An answer paired with the place it will be drawn
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedAnswer {
    pub marker: MarkerOccurrence,
    pub placement: PlacementPoint,
    pub text: String,
}

/// Result of pairing answers with markers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pairing {
    pub pairs: Vec<PlacedAnswer>,
    /// Markers with no answer, in document order
    pub unfilled: Vec<MarkerOccurrence>,
    /// Number of answers that had no marker
    pub dropped: usize,
}

/// Pair answers with markers positionally
///
/// `page_width` gives the width of a page by index and is only used for the
/// line end.
pub fn pair_answers<S: AsRef<str>>(
    markers: &[MarkerOccurrence],
    answers: &[S],
    rule: &PlacementRule,
    page_width: impl Fn(usize) -> f64,
) -> Pairing {
    let pairs = markers
        .iter()
        .zip(answers)
        .map(|(marker, answer)| PlacedAnswer {
            marker: *marker,
            placement: rule.place(marker, page_width(marker.page)),
            text: answer.as_ref().to_string(),
        })
        .collect::<Vec<_>>();

    Pairing {
        unfilled: markers[pairs.len()..].to_vec(),
        dropped: answers.len() - pairs.len(),
        pairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use pretty_assertions::assert_eq;

    fn marker(page: usize, x0: f64, y0: f64) -> MarkerOccurrence {
        MarkerOccurrence {
            page,
            rect: Rect::new(x0, y0, x0 + 40.0, y0 + 12.0),
        }
    }

    #[test]
    fn test_placement_offsets_from_marker() {
        let rule = PlacementRule::default();
        let p = rule.place(&marker(0, 72.0, 82.4), 612.0);
        assert_eq!(p.point, Point::new(132.0, 82.4));
        assert_eq!(p.line_end, Point::new(592.0, 82.4));
    }

    #[test]
    fn test_fewer_answers_leave_markers_blank() {
        let markers = vec![marker(0, 10.0, 10.0), marker(0, 10.0, 50.0), marker(1, 10.0, 10.0)];
        let pairing = pair_answers(&markers, &["a"], &PlacementRule::default(), |_| 612.0);
        assert_eq!(pairing.pairs.len(), 1);
        assert_eq!(pairing.pairs[0].text, "a");
        assert_eq!(pairing.unfilled, markers[1..].to_vec());
        assert_eq!(pairing.dropped, 0);
    }

    #[test]
    fn test_surplus_answers_dropped() {
        let markers = vec![marker(0, 10.0, 10.0)];
        let pairing = pair_answers(&markers, &["a", "b", "c"], &PlacementRule::default(), |_| 612.0);
        assert_eq!(pairing.pairs.len(), 1);
        assert_eq!(pairing.dropped, 2);
        assert!(pairing.unfilled.is_empty());
    }

    #[test]
    fn test_line_end_uses_marker_page_width() {
        let markers = vec![marker(0, 10.0, 10.0), marker(1, 10.0, 10.0)];
        let widths = [612.0, 842.0];
        let pairing = pair_answers(&markers, &["a", "b"], &PlacementRule::default(), |i| widths[i]);
        assert_eq!(pairing.pairs[1].placement.line_end.x, 822.0);
    }
}
