use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};

use crate::models::Contour;

/// Outer borders of the top-level regions in a binary edge map.
///
/// Hole borders and nested regions are dropped, so each silhouette yields a
/// single contour.
pub fn find_external_contours(edges: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| Contour::new(c.points))
        .collect()
}

/// Pick the contour with the largest area that is at least `min_area`.
///
/// Areas are compared with a strict `>`, so on an exact tie the contour seen
/// first is kept. Returns the contour together with its area.
pub fn select_largest(contours: Vec<Contour>, min_area: f64) -> Option<(Contour, f64)> {
    let mut selected: Option<(Contour, f64)> = None;
    for contour in contours {
        let area = contour.area();
        if area < min_area {
            continue;
        }
        let larger = match &selected {
            Some((_, best)) => area > *best,
            None => area > 0.0,
        };
        if larger {
            selected = Some((contour, area));
        }
    }
    selected
}
