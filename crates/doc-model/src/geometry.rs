use serde::{Deserialize, Serialize};

/// Point in screen space, relative to the top-left corner of a page surface.
///
/// Y grows downward. Units are device pixels at the display scale the page
/// was rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn inflate(self, by: f32) -> Self {
        Self {
            x: self.x - by,
            y: self.y - by,
            width: self.width + by * 2.0,
            height: self.height + by * 2.0,
        }
    }
}

/// Size and scale of one rendered page.
///
/// Produced once per page by the render pipeline. The overlay for a page and
/// the exporter both read the same value, so the pixel surface, the
/// annotation layer and the screen-to-PDF mapping can never disagree on scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Pixels per PDF unit.
    pub scale: f32,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl PageGeometry {
    pub fn new(scale: f32, pixel_width: u32, pixel_height: u32) -> Self {
        Self { scale, pixel_width, pixel_height }
    }

    /// Whether `point` lies on the page surface (edges included).
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= 0.0
            && point.y >= 0.0
            && point.x <= self.pixel_width as f32
            && point.y <= self.pixel_height as f32
    }

    /// Converts a screen-space length back to PDF units.
    pub fn to_pdf_units(&self, pixels: f32) -> f32 {
        pixels / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_edges() {
        let rect = ScreenRect { x: 10.0, y: 10.0, width: 20.0, height: 5.0 };

        assert!(rect.contains(ScreenPoint::new(10.0, 10.0)));
        assert!(rect.contains(ScreenPoint::new(30.0, 15.0)));
        assert!(!rect.contains(ScreenPoint::new(30.1, 15.0)));
        assert!(!rect.contains(ScreenPoint::new(9.9, 12.0)));
    }

    #[test]
    fn inflate_grows_every_side() {
        let rect = ScreenRect { x: 10.0, y: 10.0, width: 20.0, height: 5.0 }.inflate(2.0);

        assert_eq!(rect, ScreenRect { x: 8.0, y: 8.0, width: 24.0, height: 9.0 });
    }

    #[test]
    fn geometry_divides_by_scale() {
        let geometry = PageGeometry::new(1.5, 918, 1188);

        assert_eq!(geometry.to_pdf_units(150.0), 100.0);
        assert!(geometry.contains(ScreenPoint::new(918.0, 1188.0)));
        assert!(!geometry.contains(ScreenPoint::new(-1.0, 0.0)));
    }
}
