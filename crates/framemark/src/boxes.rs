//! Draft and committed bounding boxes for the frame on screen.

/// A pixel position in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box between two display-space corners.
///
/// While the pointer is still down the corners may be in any order; a closed
/// box always has `start <= end` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub start: Point,
    pub end: Point,
    pub class_id: usize,
}

impl BoundingBox {
    pub fn new(start: Point, end: Point, class_id: usize) -> Self {
        Self {
            start,
            end,
            class_id,
        }
    }

    pub fn normalized(self) -> Self {
        Self {
            start: Point::new(self.start.x.min(self.end.x), self.start.y.min(self.end.y)),
            end: Point::new(self.start.x.max(self.end.x), self.start.y.max(self.end.y)),
            class_id: self.class_id,
        }
    }

    pub fn is_normalized(&self) -> bool {
        self.start.x <= self.end.x && self.start.y <= self.end.y
    }

    pub fn width(&self) -> i32 {
        (self.end.x - self.start.x).abs()
    }

    pub fn height(&self) -> i32 {
        (self.end.y - self.start.y).abs()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxStore {
    drafts: Vec<BoundingBox>,
    committed: Vec<BoundingBox>,
    drawing: bool,
    active_class: usize,
}

impl BoxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drafts(&self) -> &[BoundingBox] {
        &self.drafts
    }

    pub fn committed(&self) -> &[BoundingBox] {
        &self.committed
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn active_class(&self) -> usize {
        self.active_class
    }

    /// Opens a draft at `(x, y)` unless one is already open.
    pub fn begin_box(&mut self, x: i32, y: i32, class_id: usize) {
        if self.drawing {
            return;
        }
        let point = Point::new(x, y);
        self.drafts.push(BoundingBox::new(point, point, class_id));
        self.drawing = true;
    }

    pub fn update_open_box(&mut self, x: i32, y: i32) {
        if let Some(open) = self.open_box_mut() {
            open.end = Point::new(x, y);
        }
    }

    /// Finishes the open draft at `(x, y)` and normalises its corners. The box
    /// stays a draft until [`BoxStore::commit_drafts`].
    pub fn close_box(&mut self, x: i32, y: i32) {
        if let Some(open) = self.open_box_mut() {
            open.end = Point::new(x, y);
            *open = open.normalized();
        }
        self.drawing = false;
    }

    pub fn commit_drafts(&mut self) {
        if self.drawing {
            if let Some(open) = self.drafts.last_mut() {
                *open = open.normalized();
            }
            self.drawing = false;
        }
        self.committed.append(&mut self.drafts);
    }

    /// Undo: drafts go first, then committed boxes, newest first.
    pub fn delete_last(&mut self) -> Option<BoundingBox> {
        if let Some(draft) = self.drafts.pop() {
            self.drawing = false;
            return Some(draft);
        }
        self.committed.pop()
    }

    pub fn clear_all(&mut self) {
        self.drafts.clear();
        self.committed.clear();
        self.drawing = false;
    }

    /// Accepts `id` only when it indexes one of `class_count` classes.
    pub fn set_active_class(&mut self, id: usize, class_count: usize) -> bool {
        if id < class_count {
            self.active_class = id;
            true
        } else {
            false
        }
    }

    fn open_box_mut(&mut self) -> Option<&mut BoundingBox> {
        if self.drawing {
            self.drafts.last_mut()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawn(store: &mut BoxStore, from: (i32, i32), to: (i32, i32)) {
        let class = store.active_class();
        store.begin_box(from.0, from.1, class);
        store.update_open_box((from.0 + to.0) / 2, (from.1 + to.1) / 2);
        store.close_box(to.0, to.1);
    }

    #[test]
    fn closing_normalizes_corner_order() {
        let mut store = BoxStore::new();
        drawn(&mut store, (300, 400), (100, 100));
        let boxed = store.drafts()[0];
        assert_eq!(boxed.start, Point::new(100, 100));
        assert_eq!(boxed.end, Point::new(300, 400));
        assert!(!store.is_drawing());
    }

    #[test]
    fn only_one_open_draft_at_a_time() {
        let mut store = BoxStore::new();
        store.begin_box(10, 10, 0);
        store.begin_box(50, 50, 0);
        assert_eq!(store.drafts().len(), 1);
        assert_eq!(store.drafts()[0].start, Point::new(10, 10));
    }

    #[test]
    fn update_and_close_without_open_box_are_ignored() {
        let mut store = BoxStore::new();
        store.update_open_box(5, 5);
        store.close_box(6, 6);
        assert!(store.drafts().is_empty());
        drawn(&mut store, (0, 0), (10, 10));
        store.update_open_box(99, 99);
        assert_eq!(store.drafts()[0].end, Point::new(10, 10));
    }

    #[test]
    fn commit_keeps_draw_order() {
        let mut store = BoxStore::new();
        drawn(&mut store, (0, 0), (10, 10));
        drawn(&mut store, (20, 20), (30, 30));
        store.commit_drafts();
        assert!(store.drafts().is_empty());
        assert_eq!(store.committed().len(), 2);
        assert_eq!(store.committed()[0].start, Point::new(0, 0));
        assert_eq!(store.committed()[1].start, Point::new(20, 20));
    }

    #[test]
    fn commit_with_no_drafts_is_idempotent() {
        let mut store = BoxStore::new();
        drawn(&mut store, (0, 0), (10, 10));
        store.commit_drafts();
        let before = store.committed().to_vec();
        store.commit_drafts();
        store.commit_drafts();
        assert_eq!(store.committed(), before.as_slice());
    }

    #[test]
    fn commit_while_drawing_closes_the_open_box() {
        let mut store = BoxStore::new();
        store.begin_box(40, 40, 0);
        store.update_open_box(10, 10);
        store.commit_drafts();
        assert!(!store.is_drawing());
        assert!(store.committed()[0].is_normalized());
    }

    #[test]
    fn undo_removes_draft_before_committed() {
        let mut store = BoxStore::new();
        drawn(&mut store, (0, 0), (10, 10));
        store.commit_drafts();
        drawn(&mut store, (20, 20), (30, 30));

        let first = store.delete_last().unwrap();
        assert_eq!(first.start, Point::new(20, 20));
        assert_eq!(store.committed().len(), 1);

        let second = store.delete_last().unwrap();
        assert_eq!(second.start, Point::new(0, 0));
        assert!(store.committed().is_empty());
        assert_eq!(store.delete_last(), None);
    }

    #[test]
    fn undo_of_open_draft_stops_drawing() {
        let mut store = BoxStore::new();
        store.begin_box(1, 1, 0);
        store.delete_last();
        assert!(!store.is_drawing());
        store.begin_box(2, 2, 0);
        assert_eq!(store.drafts().len(), 1);
    }

    #[test]
    fn clear_all_empties_both_collections() {
        let mut store = BoxStore::new();
        drawn(&mut store, (0, 0), (10, 10));
        store.commit_drafts();
        store.begin_box(5, 5, 0);
        store.clear_all();
        assert!(store.drafts().is_empty());
        assert!(store.committed().is_empty());
        assert!(!store.is_drawing());
    }

    #[test]
    fn out_of_range_class_is_ignored() {
        let mut store = BoxStore::new();
        assert!(store.set_active_class(1, 2));
        assert!(!store.set_active_class(2, 2));
        assert_eq!(store.active_class(), 1);
    }
}
