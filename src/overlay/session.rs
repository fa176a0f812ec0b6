//! Region selection state machine: pure, no DOM.
//!
//! `Idle → Selecting → Captured`, with cancel and size rejection both
//! falling straight back to `Idle`.

use crate::capture::{Point, Region, RegionRejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Selecting,
    Captured,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerUp {
    /// No drag in progress; nothing changed.
    Ignored,
    Captured(Region),
    Rejected(RegionRejection),
}

#[derive(Debug, Clone)]
pub struct CaptureSession {
    phase: Phase,
    anchor: Option<Point>,
    current: Option<Point>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            anchor: None,
            current: None,
        }
    }
}

impl CaptureSession {
    /// A session already in `Selecting`, waiting for the first pointer-down.
    pub fn begin() -> Self {
        Self {
            phase: Phase::Selecting,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// `None` until the first pointer-down.
    pub fn region(&self) -> Option<Region> {
        Some(Region::from_corners(self.anchor?, self.current?))
    }

    pub fn pointer_down(&mut self, at: Point) -> Option<Region> {
        if self.phase != Phase::Selecting {
            return None;
        }
        self.anchor = Some(at);
        self.current = Some(at);
        self.region()
    }

    pub fn pointer_move(&mut self, at: Point) -> Option<Region> {
        if self.phase != Phase::Selecting || self.anchor.is_none() {
            return None;
        }
        self.current = Some(at);
        self.region()
    }

    pub fn pointer_up(&mut self, at: Point, min: f64, max: f64) -> PointerUp {
        if self.phase != Phase::Selecting || self.anchor.is_none() {
            return PointerUp::Ignored;
        }
        self.current = Some(at);
        let Some(region) = self.region() else {
            return PointerUp::Ignored;
        };

        match region.check_size(min, max) {
            Ok(()) => {
                self.phase = Phase::Captured;
                PointerUp::Captured(region)
            }
            Err(reason) => {
                self.reset();
                PointerUp::Rejected(reason)
            }
        }
    }

    pub fn cancel(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
