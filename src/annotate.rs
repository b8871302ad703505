//! Drawing detections onto frames

use crate::detect::Detection;
use crate::error::PipelineError;
use opencv::{
    core::{Mat, Point, Rect, Scalar},
    imgproc,
    prelude::*,
};

const STROKE_WIDTH: i32 = 2;
const LABEL_FONT_SCALE: f64 = 0.5;

/// Draws one detector's boxes in one style. Each detector gets its own
/// annotator so overlapping detections from different detectors stay
/// visually distinct.
pub struct Annotator {
    color: Scalar,
    draw_labels: bool,
}

impl Annotator {
    /// Red boxes, no labels. The cascade has nothing useful to print.
    pub fn cascade_style() -> Self {
        Self {
            color: Scalar::new(0.0, 0.0, 255.0, 0.0),
            draw_labels: false,
        }
    }

    /// Green boxes with class name and score.
    pub fn learned_style() -> Self {
        Self {
            color: Scalar::new(0.0, 255.0, 0.0, 0.0),
            draw_labels: true,
        }
    }

    /// Draw all detections onto the frame in place. Boxes straddling the
    /// frame edge are clipped; boxes fully outside are skipped silently.
    pub fn draw(&self, frame: &mut Mat, detections: &[Detection]) -> Result<(), PipelineError> {
        let width = frame.cols();
        let height = frame.rows();

        for detection in detections {
            let Some(rect) = clip_rect(detection.rect, width, height) else {
                continue;
            };

            imgproc::rectangle(frame, rect, self.color, STROKE_WIDTH, imgproc::LINE_8, 0)?;

            if self.draw_labels {
                if let Some(label) = &detection.label {
                    let text = match detection.confidence {
                        Some(score) => format!("{label} {score:.2}"),
                        None => label.clone(),
                    };
                    // Keep the label on-screen for boxes touching the top edge.
                    let origin = Point::new(rect.x, (rect.y - 4).max(12));
                    imgproc::put_text(
                        frame,
                        &text,
                        origin,
                        imgproc::FONT_HERSHEY_SIMPLEX,
                        LABEL_FONT_SCALE,
                        self.color,
                        1,
                        imgproc::LINE_8,
                        false,
                    )?;
                }
            }
        }

        Ok(())
    }
}

/// Intersect a rectangle with the frame bounds. `None` when nothing is left.
fn clip_rect(rect: Rect, width: i32, height: i32) -> Option<Rect> {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + rect.width).min(width);
    let y1 = (rect.y + rect.height).min(height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::CV_8UC3;

    #[test]
    fn test_clip_rect_inside_unchanged() {
        let rect = Rect::new(10, 10, 50, 40);
        assert_eq!(clip_rect(rect, 640, 480), Some(rect));
    }

    #[test]
    fn test_clip_rect_negative_origin() {
        let rect = Rect::new(-20, -10, 50, 40);
        assert_eq!(clip_rect(rect, 640, 480), Some(Rect::new(0, 0, 30, 30)));
    }

    #[test]
    fn test_clip_rect_overhanging_edge() {
        let rect = Rect::new(600, 450, 100, 100);
        assert_eq!(clip_rect(rect, 640, 480), Some(Rect::new(600, 450, 40, 30)));
    }

    #[test]
    fn test_clip_rect_fully_outside() {
        assert_eq!(clip_rect(Rect::new(700, 500, 50, 50), 640, 480), None);
        assert_eq!(clip_rect(Rect::new(-100, -100, 50, 50), 640, 480), None);
    }

    #[test]
    fn test_draw_clips_out_of_bounds_boxes() {
        let mut frame =
            Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(0.0)).unwrap();
        let detections = vec![
            Detection {
                rect: Rect::new(-10, -10, 40, 40),
                label: Some("car".to_string()),
                confidence: Some(0.9),
            },
            Detection {
                rect: Rect::new(1000, 1000, 40, 40),
                label: None,
                confidence: None,
            },
        ];

        let annotator = Annotator::learned_style();
        assert!(annotator.draw(&mut frame, &detections).is_ok());
    }
}
