/// Page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    pub fn new(width: f32, height: f32, margin: f32) -> Self {
        Self {
            width,
            height,
            margin,
        }
    }

    pub fn usable_width(&self) -> f32 {
        (self.width - 2.0 * self.margin).max(0.0)
    }

    pub fn usable_height(&self) -> f32 {
        (self.height - 2.0 * self.margin).max(0.0)
    }

    /// Lowest y a placement may reach (top-down coordinates)
    pub fn bottom(&self) -> f32 {
        self.height - self.margin
    }
}

/// One in-flight page with its vertical cursor
#[derive(Debug, Clone)]
pub struct Page {
    pub geometry: PageGeometry,
    pub cursor_y: f32,
}

impl Page {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            cursor_y: geometry.margin,
        }
    }

    /// Nothing has been placed yet
    pub fn is_fresh(&self) -> bool {
        self.cursor_y <= self.geometry.margin
    }

    pub fn remaining(&self) -> f32 {
        (self.geometry.bottom() - self.cursor_y).max(0.0)
    }

    /// Whether `height` fits below the cursor
    pub fn fits(&self, height: f32) -> bool {
        // Tolerate float noise from repeated additions
        self.cursor_y + height <= self.geometry.bottom() + 0.01
    }

    /// Move the cursor down, never past the bottom margin
    pub fn advance(&mut self, height: f32) {
        self.cursor_y = (self.cursor_y + height).min(self.geometry.bottom());
    }

    pub fn reset(&mut self) {
        self.cursor_y = self.geometry.margin;
    }
}
