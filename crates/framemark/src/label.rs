//! Normalised one-line-per-box label format:
//! `"<class_id> <center_x> <center_y> <width> <height>"` with every
//! coordinate a fraction of the image size printed to six decimals.

use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

use crate::boxes::{BoundingBox, Point};

#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("expected 5 space-separated fields, found {found}")]
    FieldCount { found: usize },

    #[error("invalid class id '{value}': {source}")]
    ClassId {
        value: String,
        source: ParseIntError,
    },

    #[error("invalid {field} '{value}': {source}")]
    Number {
        field: &'static str,
        value: String,
        source: ParseFloatError,
    },

    #[error("image dimensions {width}x{height} must be positive")]
    EmptyImage { width: u32, height: u32 },
}

/// A parsed label line, still in normalised units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLine {
    pub class_id: usize,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl LabelLine {
    pub fn from_box(bbox: &BoundingBox, image_width: u32, image_height: u32) -> Self {
        let b = bbox.normalized();
        let w = image_width as f64;
        let h = image_height as f64;
        Self {
            class_id: b.class_id,
            center_x: (b.start.x + b.end.x) as f64 / 2.0 / w,
            center_y: (b.start.y + b.end.y) as f64 / 2.0 / h,
            width: (b.end.x - b.start.x) as f64 / w,
            height: (b.end.y - b.start.y) as f64 / h,
        }
    }

    pub fn parse(line: &str) -> Result<Self, LabelError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [class_id, cx, cy, w, h] = fields.as_slice() else {
            return Err(LabelError::FieldCount {
                found: fields.len(),
            });
        };
        let class_id = class_id.parse().map_err(|source| LabelError::ClassId {
            value: (*class_id).to_string(),
            source,
        })?;
        Ok(Self {
            class_id,
            center_x: parse_field("center_x", cx)?,
            center_y: parse_field("center_y", cy)?,
            width: parse_field("width", w)?,
            height: parse_field("height", h)?,
        })
    }

    /// Projects back to pixel corners on an image of the given size.
    pub fn to_box(&self, image_width: u32, image_height: u32) -> BoundingBox {
        let w = image_width as f64;
        let h = image_height as f64;
        let x1 = (self.center_x - self.width / 2.0) * w;
        let y1 = (self.center_y - self.height / 2.0) * h;
        let x2 = (self.center_x + self.width / 2.0) * w;
        let y2 = (self.center_y + self.height / 2.0) * h;
        BoundingBox::new(
            Point::new(x1.round() as i32, y1.round() as i32),
            Point::new(x2.round() as i32, y2.round() as i32),
            self.class_id,
        )
    }

    pub fn render(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.center_x, self.center_y, self.width, self.height
        )
    }
}

fn parse_field(field: &'static str, value: &str) -> Result<f64, LabelError> {
    value.parse().map_err(|source| LabelError::Number {
        field,
        value: value.to_string(),
        source,
    })
}

pub fn encode(bbox: &BoundingBox, image_width: u32, image_height: u32) -> String {
    LabelLine::from_box(bbox, image_width, image_height).render()
}

pub fn decode(line: &str, image_width: u32, image_height: u32) -> Result<BoundingBox, LabelError> {
    if image_width == 0 || image_height == 0 {
        return Err(LabelError::EmptyImage {
            width: image_width,
            height: image_height,
        });
    }
    LabelLine::parse(line).map(|parsed| parsed.to_box(image_width, image_height))
}

/// Label file body: one newline-terminated line per box, in the given order.
pub fn encode_all(boxes: &[BoundingBox], image_width: u32, image_height: u32) -> String {
    let mut out = String::new();
    for bbox in boxes {
        out.push_str(&encode(bbox, image_width, image_height));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_reference_box() {
        let bbox = BoundingBox::new(Point::new(100, 100), Point::new(300, 400), 0);
        assert_eq!(
            encode(&bbox, 1280, 720),
            "0 0.156250 0.347222 0.156250 0.416667"
        );
    }

    #[test]
    fn encoding_ignores_corner_order() {
        let forward = BoundingBox::new(Point::new(10, 20), Point::new(50, 80), 3);
        let reversed = BoundingBox::new(Point::new(50, 80), Point::new(10, 20), 3);
        assert_eq!(encode(&forward, 640, 360), encode(&reversed, 640, 360));
    }

    #[test]
    fn round_trip_within_precision() {
        let dims = [(1280u32, 720u32), (640, 480), (1920, 1080), (333, 77)];
        let boxes = [
            BoundingBox::new(Point::new(0, 0), Point::new(1, 1), 0),
            BoundingBox::new(Point::new(17, 29), Point::new(211, 63), 4),
            BoundingBox::new(Point::new(5, 5), Point::new(5, 40), 9),
        ];
        for (w, h) in dims {
            for bbox in &boxes {
                let line = encode(bbox, w, h);
                let parsed = LabelLine::parse(&line).unwrap();
                let exact = LabelLine::from_box(bbox, w, h);
                assert_eq!(parsed.class_id, bbox.class_id);
                for (got, want) in [
                    (parsed.center_x, exact.center_x),
                    (parsed.center_y, exact.center_y),
                    (parsed.width, exact.width),
                    (parsed.height, exact.height),
                ] {
                    assert!((got - want).abs() <= 0.5e-6 + f64::EPSILON, "{line}");
                }
                if bbox.end.x < w as i32 && bbox.end.y < h as i32 {
                    assert_eq!(decode(&line, w, h).unwrap(), bbox.normalized());
                }
            }
        }
    }

    #[test]
    fn encode_all_terminates_every_line() {
        let boxes = [
            BoundingBox::new(Point::new(0, 0), Point::new(10, 10), 0),
            BoundingBox::new(Point::new(10, 10), Point::new(20, 20), 1),
        ];
        let body = encode_all(&boxes, 100, 100);
        assert_eq!(body, "0 0.050000 0.050000 0.100000 0.100000\n1 0.150000 0.150000 0.100000 0.100000\n");
        assert_eq!(encode_all(&[], 100, 100), "");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(
            LabelLine::parse("0 0.5 0.5 0.1"),
            Err(LabelError::FieldCount { found: 4 })
        );
        assert!(matches!(
            LabelLine::parse("x 0.5 0.5 0.1 0.1"),
            Err(LabelError::ClassId { .. })
        ));
        assert!(matches!(
            LabelLine::parse("0 0.5 nan? 0.1 0.1"),
            Err(LabelError::Number { field: "center_y", .. })
        ));
        assert!(matches!(
            decode("0 0.5 0.5 0.1 0.1", 0, 10),
            Err(LabelError::EmptyImage { .. })
        ));
    }
}
