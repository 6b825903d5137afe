//! Regions of interest: literal crops and pointer-driven selection.

use crate::error::{RegistrationError, RegistrationResult};
use image::{DynamicImage, GenericImageView, SubImage};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning two corner points, in any order
    pub fn from_corners((x0, y0): (u32, u32), (x1, y1): (u32, u32)) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: x0.abs_diff(x1),
            height: y0.abs_diff(y1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersect with a `width` x `height` image.
    ///
    /// A region that keeps no pixel is an `InvalidRegion` error.
    pub fn clamp_to(&self, width: u32, height: u32) -> RegistrationResult<Roi> {
        let x0 = self.x.min(width);
        let y0 = self.y.min(height);
        let x1 = self.x.saturating_add(self.width).min(width);
        let y1 = self.y.saturating_add(self.height).min(height);

        let clamped = Roi::new(x0, y0, x1 - x0, y1 - y0);
        if clamped.is_empty() {
            return Err(RegistrationError::InvalidRegion { roi: *self, width, height });
        }
        Ok(clamped)
    }

    /// Non-owning view of the clamped region
    pub fn view<'a>(&self, image: &'a DynamicImage) -> RegistrationResult<SubImage<&'a DynamicImage>> {
        let r = self.clamp_to(image.width(), image.height())?;
        Ok(image.view(r.x, r.y, r.width, r.height))
    }

    /// Owned copy of the clamped region with the source's channel layout
    pub fn crop(&self, image: &DynamicImage) -> RegistrationResult<DynamicImage> {
        let r = self.clamp_to(image.width(), image.height())?;
        Ok(image.crop_imm(r.x, r.y, r.width, r.height))
    }
}

/// Pointer input fed to a [`RoiSelector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press { x: i64, y: i64 },
    Move { x: i64, y: i64 },
    Release { x: i64, y: i64 },
    /// Accept the current rectangle
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Dragging { anchor: (u32, u32), current: (u32, u32) },
    Selected(Roi),
}

/// Rubber-band rectangle selection over an image of fixed size.
///
/// `Idle -> Dragging` on press, `Dragging -> Selected` on release, and a
/// new press restarts the drag. Coordinates are clamped to the image.
#[derive(Debug, Clone)]
pub struct RoiSelector {
    width: u32,
    height: u32,
    state: SelectionState,
}

impl RoiSelector {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, state: SelectionState::Idle }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    fn clamp_point(&self, x: i64, y: i64) -> (u32, u32) {
        let cx = x.clamp(0, self.width as i64) as u32;
        let cy = y.clamp(0, self.height as i64) as u32;
        (cx, cy)
    }

    /// Rectangle currently outlined, if any
    pub fn current(&self) -> Option<Roi> {
        match self.state {
            SelectionState::Idle => None,
            SelectionState::Dragging { anchor, current } => Some(Roi::from_corners(anchor, current)),
            SelectionState::Selected(roi) => Some(roi),
        }
    }

    /// Feed one event. `Confirm` finishes the selection and returns the
    /// rectangle, or `NoRegionSelected` when it is empty.
    pub fn handle(&mut self, event: PointerEvent) -> RegistrationResult<Option<Roi>> {
        match event {
            PointerEvent::Press { x, y } => {
                let p = self.clamp_point(x, y);
                self.state = SelectionState::Dragging { anchor: p, current: p };
                Ok(None)
            }
            PointerEvent::Move { x, y } => {
                if let SelectionState::Dragging { anchor, .. } = self.state {
                    let current = self.clamp_point(x, y);
                    self.state = SelectionState::Dragging { anchor, current };
                }
                Ok(None)
            }
            PointerEvent::Release { x, y } => {
                if let SelectionState::Dragging { anchor, .. } = self.state {
                    let roi = Roi::from_corners(anchor, self.clamp_point(x, y));
                    self.state = SelectionState::Selected(roi);
                }
                Ok(None)
            }
            PointerEvent::Confirm => match self.current() {
                Some(roi) if !roi.is_empty() => {
                    self.state = SelectionState::Selected(roi);
                    Ok(Some(roi))
                }
                _ => Err(RegistrationError::NoRegionSelected),
            },
        }
    }

    /// Run a whole event sequence and return the confirmed rectangle
    pub fn select<I>(width: u32, height: u32, events: I) -> RegistrationResult<Roi>
    where
        I: IntoIterator<Item = PointerEvent>,
    {
        let mut selector = Self::new(width, height);
        for event in events {
            if let Some(roi) = selector.handle(event)? {
                return Ok(roi);
            }
        }
        Err(RegistrationError::NoRegionSelected)
    }
}
