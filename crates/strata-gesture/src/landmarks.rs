//! Hand landmark model
//!
//! The external tracker delivers 21 normalized keypoints per hand per frame.
//! Coordinates are in [0, 1] with the origin at the top-left of the camera
//! frame; z is relative depth (negative toward the camera).

/// Landmarks per hand
pub const NUM_LANDMARKS: usize = 21;

// Landmark indices (tracker convention)
pub const WRIST: usize = 0;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// Fingertip indices, thumb first
pub const FINGERTIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// PIP joints matching `FINGERTIPS` (thumb uses its IP joint)
pub const FINGER_PIPS: [usize; 5] = [THUMB_IP, INDEX_PIP, MIDDLE_PIP, RING_PIP, PINKY_PIP];

/// MCP knuckles for the four non-thumb fingers
pub const FINGER_MCPS: [usize; 4] = [INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

/// A normalized 3-D point
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the xy plane (the camera image plane)
    pub fn distance_2d(&self, other: &Point3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance(&self, other: &Point3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Which physical hand the tracker believes this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// One hand in one camera frame
#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    pub landmarks: [Point3; NUM_LANDMARKS],
    pub handedness: Handedness,
    /// Tracker's per-frame detection confidence
    pub confidence: f32,
    /// Capture time in milliseconds (tracker clock)
    pub timestamp_ms: f64,
}

impl HandObservation {
    /// True if any landmark sits within `margin` of the frame edge
    pub fn near_frame_edge(&self, margin: f32) -> bool {
        self.landmarks.iter().any(|p| {
            p.x < margin || p.x > 1.0 - margin || p.y < margin || p.y > 1.0 - margin
        })
    }
}

/// Both hands (either may be absent) for one camera frame
#[derive(Debug, Clone, Default)]
pub struct HandFrame {
    pub left: Option<HandObservation>,
    pub right: Option<HandObservation>,
    pub timestamp_ms: f64,
}

impl HandFrame {
    pub fn hand(&self, handedness: Handedness) -> Option<&HandObservation> {
        match handedness {
            Handedness::Left => self.left.as_ref(),
            Handedness::Right => self.right.as_ref(),
        }
    }

    pub fn both_present(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }
}
