//! Area and label computation for annotated polygons.

use geo::{Area, Centroid, LineString, Polygon};

use crate::{annotation::Annotation, markers::Marker, scale::Scale};

/// Compute and store `area` and `label` for every shape in `annotation`.
///
/// Areas are the polygon's planar area multiplied by the pixel scale and
/// divided by the magnification. When markers were detected, each shape is
/// labeled with the marker nearest to its centroid, no matter how far away.
pub fn apply(annotation: &mut Annotation, scale: Scale, markers: &[Marker]) {
    for shape in &mut annotation.shapes {
        let polygon = to_polygon(&shape.points);
        let area = polygon.unsigned_area() * scale.pixel_size() / scale.magnification();
        let marker = polygon
            .centroid()
            .and_then(|c| nearest_marker(markers, (c.x(), c.y())));

        let area_label = format!("{:.2} {}", area, scale.unit());
        let label = match marker {
            Some(marker) => format!("{} - {}", marker.number, area_label),
            None => area_label,
        };
        shape.area = Some(area);
        shape.label = Some(label);
    }
}

fn to_polygon(points: &[[f64; 2]]) -> Polygon<f64> {
    let exterior: Vec<(f64, f64)> = points.iter().map(|p| (p[0], p[1])).collect();
    Polygon::new(LineString::from(exterior), vec![])
}

/// The marker whose center is closest to `centroid` by Euclidean distance.
///
/// Comparison is strict, so ties keep the first marker encountered in
/// detection order.
pub fn nearest_marker<'a>(markers: &'a [Marker], centroid: (f64, f64)) -> Option<&'a Marker> {
    let mut closest = None;
    let mut min_distance = f64::INFINITY;
    for marker in markers {
        let dx = marker.center.0 - centroid.0;
        let dy = marker.center.1 - centroid.1;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance < min_distance {
            min_distance = distance;
            closest = Some(marker);
        }
    }
    closest
}
