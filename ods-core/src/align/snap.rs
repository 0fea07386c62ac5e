//! Vertex and edge snapping between two polygon rings.
//!
//! Rings are handled as open vertex lists: the closing coordinate is removed
//! on entry and restored on exit. Every individual move or insertion is
//! checked against the ring it modifies and rejected if the ring would cross
//! itself.

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, Intersects, Line, LineString, Polygon};

/// Rings produced by a successful [`align_rings`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AlignedRings {
    pub(crate) target: LineString<f64>,
    pub(crate) reference: LineString<f64>,
}

/// Snap `target` onto `reference`.
///
/// Returns `None` when nothing moved or when either ring would be left with
/// fewer than three distinct vertices.
pub(crate) fn align_rings(
    target: &LineString<f64>,
    reference: &LineString<f64>,
    tolerance: f64,
) -> Option<AlignedRings> {
    let original_target = collapse(target.0.clone());
    let original_reference = collapse(reference.0.clone());
    if original_target.len() < 3 || original_reference.len() < 3 {
        return None;
    }

    let mut pair = RingPair {
        target: original_target.clone(),
        reference: original_reference.clone(),
        tolerance,
    };
    pair.snap_vertices();
    pair.snap_to_edges();
    pair.insert_reference_vertices();

    let aligned_target = collapse(pair.target);
    let aligned_reference = collapse(pair.reference);
    if aligned_target.len() < 3 || aligned_reference.len() < 3 {
        return None;
    }
    if aligned_target == original_target && aligned_reference == original_reference {
        return None;
    }
    Some(AlignedRings {
        target: close(aligned_target),
        reference: close(aligned_reference),
    })
}

/// Whether two polygons intersect or come within `tolerance` of each other.
pub(crate) fn polygons_within(a: &Polygon<f64>, b: &Polygon<f64>, tolerance: f64) -> bool {
    if a.intersects(b) {
        return true;
    }
    let first = collapse(a.exterior().0.clone());
    let second = collapse(b.exterior().0.clone());
    min_vertex_distance(&first, &second) <= tolerance
        || min_vertex_distance(&second, &first) <= tolerance
}

struct RingPair {
    target: Vec<Coord<f64>>,
    reference: Vec<Coord<f64>>,
    tolerance: f64,
}

impl RingPair {
    fn snap_vertices(&mut self) {
        for position in 0..self.target.len() {
            let Some(&vertex) = self.target.get(position) else {
                continue;
            };
            let Some(anchor) = nearest_vertex(vertex, &self.reference, self.tolerance) else {
                continue;
            };
            if anchor == vertex {
                continue;
            }
            let mut candidate = self.target.clone();
            if let Some(slot) = candidate.get_mut(position) {
                *slot = anchor;
            }
            if is_simple(&candidate) {
                self.target = candidate;
            }
        }
    }

    fn snap_to_edges(&mut self) {
        for position in 0..self.target.len() {
            let Some(&vertex) = self.target.get(position) else {
                continue;
            };
            if self.reference.contains(&vertex) {
                continue;
            }
            let Some((edge, projected)) = nearest_edge(vertex, &self.reference, self.tolerance)
            else {
                continue;
            };
            let mut target = self.target.clone();
            if let Some(slot) = target.get_mut(position) {
                *slot = projected;
            }
            let mut reference = self.reference.clone();
            reference.insert(edge + 1, projected);
            if is_simple(&target) && is_simple(&reference) {
                self.target = target;
                self.reference = reference;
            }
        }
    }

    fn insert_reference_vertices(&mut self) {
        for position in 0..self.reference.len() {
            let Some(&vertex) = self.reference.get(position) else {
                continue;
            };
            if self.target.contains(&vertex) {
                continue;
            }
            let Some((edge, _)) = nearest_edge(vertex, &self.target, self.tolerance) else {
                continue;
            };
            let mut target = self.target.clone();
            target.insert(edge + 1, vertex);
            if is_simple(&target) {
                self.target = target;
            }
        }
    }
}

/// Consecutive vertex pairs of an open ring, including the closing edge.
fn edges(ring: &[Coord<f64>]) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
    ring.iter()
        .copied()
        .zip(ring.iter().copied().cycle().skip(1))
}

fn collapse(ring: Vec<Coord<f64>>) -> Vec<Coord<f64>> {
    let mut vertices: Vec<Coord<f64>> = Vec::with_capacity(ring.len());
    for coord in ring {
        if vertices.last() != Some(&coord) {
            vertices.push(coord);
        }
    }
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    vertices
}

fn close(mut ring: Vec<Coord<f64>>) -> LineString<f64> {
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    LineString::new(ring)
}

fn is_simple(ring: &[Coord<f64>]) -> bool {
    let vertices = collapse(ring.to_vec());
    let count = vertices.len();
    if count < 3 {
        return false;
    }
    let lines: Vec<Line<f64>> = edges(&vertices).map(|(a, b)| Line::new(a, b)).collect();
    for (i, first) in lines.iter().enumerate() {
        for (j, second) in lines.iter().enumerate().skip(i + 1) {
            let adjacent = j == i + 1 || (i == 0 && j == count - 1);
            match line_intersection(*first, *second) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return false,
            }
        }
    }
    true
}

#[expect(
    clippy::float_arithmetic,
    reason = "projection onto a segment is plain vector arithmetic"
)]
fn project(point: Coord<f64>, start: Coord<f64>, end: Coord<f64>) -> (f64, Coord<f64>) {
    let direction = end - start;
    let length_squared = direction.x * direction.x + direction.y * direction.y;
    if length_squared <= 0.0 {
        return (0.0, start);
    }
    let offset = point - start;
    let t = (offset.x * direction.x + offset.y * direction.y) / length_squared;
    (t, start + direction * t)
}

#[expect(clippy::float_arithmetic, reason = "Euclidean distance in projected units")]
fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn segment_distance(point: Coord<f64>, start: Coord<f64>, end: Coord<f64>) -> f64 {
    let (t, projected) = project(point, start, end);
    if t <= 0.0 {
        distance(point, start)
    } else if t >= 1.0 {
        distance(point, end)
    } else {
        distance(point, projected)
    }
}

fn min_vertex_distance(points: &[Coord<f64>], ring: &[Coord<f64>]) -> f64 {
    points
        .iter()
        .flat_map(|point| {
            edges(ring).map(move |(start, end)| segment_distance(*point, start, end))
        })
        .fold(f64::INFINITY, f64::min)
}

fn nearest_vertex(point: Coord<f64>, ring: &[Coord<f64>], tolerance: f64) -> Option<Coord<f64>> {
    ring.iter()
        .map(|vertex| (distance(point, *vertex), *vertex))
        .filter(|(gap, _)| *gap <= tolerance)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, vertex)| vertex)
}

/// Nearest edge whose interior lies within `tolerance` of `point`.
///
/// Returns the index of the edge's start vertex and the projection of
/// `point` onto it.
fn nearest_edge(
    point: Coord<f64>,
    ring: &[Coord<f64>],
    tolerance: f64,
) -> Option<(usize, Coord<f64>)> {
    edges(ring)
        .enumerate()
        .filter_map(|(position, (start, end))| {
            let (t, projected) = project(point, start, end);
            if t <= 0.0 || t >= 1.0 || projected == start || projected == end {
                return None;
            }
            let gap = distance(point, projected);
            (gap <= tolerance).then_some((gap, position, projected))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, position, projected)| (position, projected))
}
