//! Picks the drop target under the pointer on each drag-over tick.
//!
//! Order of preference:
//! 1. regions containing the pointer (innermost wins),
//! 2. regions intersecting the dragged rect (largest overlap ratio wins),
//! 3. if the winner is a container with nested regions, its nested region
//!    closest to the dragged rect's center,
//! 4. the previous target, so fast pointer movement does not flicker to
//!    "no target".

use serde::{Deserialize, Serialize};

use crate::{DragDescriptor, DragKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x <= self.right() && point.y >= self.top && point.y <= self.bottom()
    }

    fn intersection_area(&self, other: &Rect) -> f32 {
        let width = self.right().min(other.right()) - self.left.max(other.left);
        let height = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if width <= 0.0 || height <= 0.0 {
            0.0
        } else {
            width * height
        }
    }

    /// Overlap as a fraction of the union of both rects.
    pub fn intersection_ratio(&self, other: &Rect) -> f32 {
        let overlap = self.intersection_area(other);
        if overlap == 0.0 {
            return 0.0;
        }
        overlap / (self.area() + other.area() - overlap)
    }
}

/// A registered drop region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Droppable {
    pub target: DragDescriptor,
    pub rect: Rect,
    /// Id of the droppable this one is nested in, if any.
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl Droppable {
    pub fn new(target: DragDescriptor, rect: Rect) -> Self {
        Self {
            target,
            rect,
            container: None,
            disabled: false,
        }
    }

    pub fn inside(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionSource {
    Pointer,
    Intersection,
    NestedClosest,
    Sticky,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub target: DragDescriptor,
    pub source: CollisionSource,
}

/// Stateful per drag session; call [`CollisionDetector::reset`] on drag-start.
#[derive(Debug, Default)]
pub struct CollisionDetector {
    last_target: Option<DragDescriptor>,
}

impl CollisionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the sticky target of a previous drag.
    pub fn reset(&mut self) {
        self.last_target = None;
    }

    pub fn last_target(&self) -> Option<&DragDescriptor> {
        self.last_target.as_ref()
    }

    pub fn detect(
        &mut self,
        pointer: Option<Point>,
        active_rect: Rect,
        droppables: &[Droppable],
    ) -> Option<Collision> {
        let enabled = droppables
            .iter()
            .filter(|droppable| !droppable.disabled)
            .collect::<Vec<_>>();

        let found = pointer
            .and_then(|point| innermost_containing(&enabled, point))
            .map(|hit| (hit, CollisionSource::Pointer))
            .or_else(|| best_intersection(&enabled, &active_rect).map(|hit| (hit, CollisionSource::Intersection)));

        let resolved = found.map(|(hit, source)| {
            match closest_nested(&enabled, hit, active_rect.center()) {
                Some(child) => Collision {
                    target: child.target.clone(),
                    source: CollisionSource::NestedClosest,
                },
                None => Collision {
                    target: hit.target.clone(),
                    source,
                },
            }
        });

        match resolved {
            Some(collision) => {
                self.last_target = Some(collision.target.clone());
                Some(collision)
            }
            None => self.last_target.clone().map(|target| Collision {
                target,
                source: CollisionSource::Sticky,
            }),
        }
    }
}

fn innermost_containing<'a>(droppables: &[&'a Droppable], point: Point) -> Option<&'a Droppable> {
    let hits = droppables
        .iter()
        .copied()
        .filter(|droppable| droppable.rect.contains(point))
        .collect::<Vec<_>>();
    hits.iter()
        .copied()
        .find(|hit| {
            !hits
                .iter()
                .any(|other| other.container.as_deref() == Some(hit.target.id.as_str()))
        })
        .or_else(|| hits.first().copied())
}

fn best_intersection<'a>(droppables: &[&'a Droppable], active_rect: &Rect) -> Option<&'a Droppable> {
    droppables
        .iter()
        .copied()
        .map(|droppable| (droppable, droppable.rect.intersection_ratio(active_rect)))
        .filter(|(_, ratio)| *ratio > 0.0)
        .fold(None, |best: Option<(&'a Droppable, f32)>, (droppable, ratio)| match best {
            Some((_, best_ratio)) if best_ratio >= ratio => best,
            _ => Some((droppable, ratio)),
        })
        .map(|(droppable, _)| droppable)
}

fn closest_nested<'a>(
    droppables: &[&'a Droppable],
    container: &Droppable,
    from: Point,
) -> Option<&'a Droppable> {
    // Tabs and the pinned zone never nest tree items.
    if matches!(container.target.kind, DragKind::Tab | DragKind::Pinned) {
        return None;
    }
    droppables
        .iter()
        .copied()
        .filter(|droppable| droppable.container.as_deref() == Some(container.target.id.as_str()))
        .map(|droppable| (droppable, droppable.rect.center().distance(from)))
        .fold(None, |best: Option<(&'a Droppable, f32)>, (droppable, distance)| match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((droppable, distance)),
        })
        .map(|(droppable, _)| droppable)
}
