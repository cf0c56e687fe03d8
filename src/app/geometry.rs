//! Pure geometry planning for image transforms
//!
//! `plan` maps (source size, target box, fit options) to an immutable
//! `TransformPlan`: an optional quarter-turn rotation, per-axis scale
//! factors, and an optional crop window in scaled-image coordinates.
//! Planning has no side effects and no error paths; degenerate inputs
//! produce an identity plan. Plans are recomputed per request and never
//! cached across requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Width and height in abstract pixel units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const ZERO: Dimensions = Dimensions {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either axis is missing or non-positive
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// True when the width strictly exceeds the height
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Width over height
    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    /// The same box with its axes exchanged
    pub fn swapped(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Round to whole pixels, clamping to at least 1x1
    pub fn round_to_pixels(&self) -> (u32, u32) {
        let w = self.width.round().max(1.0) as u32;
        let h = self.height.round().max(1.0) as u32;
        (w, h)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in scaled-image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Which part of a scaled image survives cropping to the target box
///
/// The first word names the vertical edge, the second the horizontal one.
/// The crop window's offset is 0 at the left/top edge, centered at mid,
/// and flush to the opposite edge at right/bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CropAnchor {
    #[default]
    CenterCenter,
    CenterLeft,
    CenterRight,
    TopCenter,
    TopLeft,
    TopRight,
    BottomCenter,
    BottomLeft,
    BottomRight,
}

/// One-dimensional placement of the crop window inside the scaled span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Start,
    Center,
    End,
}

impl Align {
    fn offset(&self, excess: f64) -> f64 {
        match self {
            Align::Start => 0.0,
            Align::Center => excess / 2.0,
            Align::End => excess,
        }
    }
}

impl CropAnchor {
    fn horizontal(&self) -> Align {
        match self {
            CropAnchor::CenterLeft | CropAnchor::TopLeft | CropAnchor::BottomLeft => Align::Start,
            CropAnchor::CenterCenter | CropAnchor::TopCenter | CropAnchor::BottomCenter => {
                Align::Center
            }
            CropAnchor::CenterRight | CropAnchor::TopRight | CropAnchor::BottomRight => Align::End,
        }
    }

    fn vertical(&self) -> Align {
        match self {
            CropAnchor::TopLeft | CropAnchor::TopCenter | CropAnchor::TopRight => Align::Start,
            CropAnchor::CenterLeft | CropAnchor::CenterCenter | CropAnchor::CenterRight => {
                Align::Center
            }
            CropAnchor::BottomLeft | CropAnchor::BottomCenter | CropAnchor::BottomRight => {
                Align::End
            }
        }
    }
}

impl FromStr for CropAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" | "center-center" => Ok(CropAnchor::CenterCenter),
            "center-left" => Ok(CropAnchor::CenterLeft),
            "center-right" => Ok(CropAnchor::CenterRight),
            "top-center" | "top" => Ok(CropAnchor::TopCenter),
            "top-left" => Ok(CropAnchor::TopLeft),
            "top-right" => Ok(CropAnchor::TopRight),
            "bottom-center" | "bottom" => Ok(CropAnchor::BottomCenter),
            "bottom-left" => Ok(CropAnchor::BottomLeft),
            "bottom-right" => Ok(CropAnchor::BottomRight),
            other => Err(format!("unknown crop anchor: {}", other)),
        }
    }
}

/// Automatic rotation policy for landscape sources in portrait boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LandscapeMode {
    #[default]
    None,
    /// Quarter turn counterclockwise
    Left,
    /// Quarter turn clockwise
    Right,
}

impl FromStr for LandscapeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(LandscapeMode::None),
            "left" => Ok(LandscapeMode::Left),
            "right" => Ok(LandscapeMode::Right),
            other => Err(format!("unknown landscape mode: {}", other)),
        }
    }
}

/// Quarter-turn rotation applied before scaling and cropping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    /// 90 degrees counterclockwise
    Left,
    /// 90 degrees clockwise
    Right,
}

/// How a source image should fit a target box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Scale to cover the box and crop, instead of fitting inside it
    pub fit_from_outside: bool,
    /// Scale uniformly, preserving the source aspect ratio
    pub keep_aspect_ratio: bool,
    /// Allow scale factors above 1.0 for sources smaller than the box
    pub allow_enlarge: bool,
    /// Placement of the crop window when covering
    pub crop_anchor: CropAnchor,
    /// Automatic rotation of landscape sources
    pub landscape_mode: LandscapeMode,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            fit_from_outside: false,
            keep_aspect_ratio: true,
            allow_enlarge: true,
            crop_anchor: CropAnchor::CenterCenter,
            landscape_mode: LandscapeMode::None,
        }
    }
}

/// Derived, immutable transform description for one (source, box, options) tuple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPlan {
    /// Rotation applied first, before scale and crop
    pub rotation: Rotation,
    /// Horizontal scale factor applied to the (rotated) source
    pub scale_x: f64,
    /// Vertical scale factor applied to the (rotated) source
    pub scale_y: f64,
    /// Crop window inside the scaled image, when covering
    pub crop: Option<Rect>,
    /// Final size after rotation, scaling and cropping
    pub output: Dimensions,
}

impl TransformPlan {
    /// The no-op plan for a source of the given size
    pub fn identity(source: Dimensions) -> Self {
        Self {
            rotation: Rotation::None,
            scale_x: 1.0,
            scale_y: 1.0,
            crop: None,
            output: source,
        }
    }

    /// True when applying this plan changes nothing
    pub fn is_identity(&self) -> bool {
        self.rotation == Rotation::None
            && self.scale_x == 1.0
            && self.scale_y == 1.0
            && self.crop.is_none()
    }
}

/// Compute the transform plan for a source image and target box
///
/// Deterministic for identical inputs. A target box with one zero axis is
/// fit to the other axis; a box with no usable axis, or a degenerate
/// source, yields an identity plan.
pub fn plan(source: Dimensions, target: Dimensions, options: &FitOptions) -> TransformPlan {
    if source.is_degenerate() {
        return TransformPlan::identity(source);
    }

    let width_missing = target.width <= 0.0;
    let height_missing = target.height <= 0.0;
    if width_missing && height_missing {
        return TransformPlan::identity(source);
    }

    // Landscape auto-rotation happens before any scale or crop math; the
    // planner works on the rotated dimensions from here on.
    let (rotation, src) = resolve_rotation(source, target, options, width_missing, height_missing);

    // A single missing axis follows the other one.
    let target = {
        let mut t = target;
        if width_missing {
            t.width = if options.keep_aspect_ratio {
                t.height * src.aspect()
            } else {
                src.width
            };
        } else if height_missing {
            t.height = if options.keep_aspect_ratio {
                t.width / src.aspect()
            } else {
                src.height
            };
        }
        t
    };

    if !options.keep_aspect_ratio {
        // Non-uniform fill: each axis scales independently; anchors are
        // irrelevant because nothing is cropped.
        let mut scale_x = target.width / src.width;
        let mut scale_y = target.height / src.height;
        if !options.allow_enlarge {
            scale_x = scale_x.min(1.0);
            scale_y = scale_y.min(1.0);
        }
        return TransformPlan {
            rotation,
            scale_x,
            scale_y,
            crop: None,
            output: Dimensions::new(src.width * scale_x, src.height * scale_y),
        };
    }

    let ratio_x = target.width / src.width;
    let ratio_y = target.height / src.height;
    let mut scale = if options.fit_from_outside {
        ratio_x.max(ratio_y)
    } else {
        ratio_x.min(ratio_y)
    };
    if !options.allow_enlarge {
        scale = scale.min(1.0);
    }
    let scaled = Dimensions::new(src.width * scale, src.height * scale);

    if !options.fit_from_outside {
        return TransformPlan {
            rotation,
            scale_x: scale,
            scale_y: scale,
            crop: None,
            output: scaled,
        };
    }

    // Cover: crop a window of the target size out of the scaled image,
    // clamped when the enlarge cap left the scaled image smaller than
    // the box.
    let crop_width = target.width.min(scaled.width);
    let crop_height = target.height.min(scaled.height);
    let crop = Rect {
        x: options.crop_anchor.horizontal().offset(scaled.width - crop_width),
        y: options.crop_anchor.vertical().offset(scaled.height - crop_height),
        width: crop_width,
        height: crop_height,
    };

    TransformPlan {
        rotation,
        scale_x: scale,
        scale_y: scale,
        crop: Some(crop),
        output: Dimensions::new(crop_width, crop_height),
    }
}

fn resolve_rotation(
    source: Dimensions,
    target: Dimensions,
    options: &FitOptions,
    width_missing: bool,
    height_missing: bool,
) -> (Rotation, Dimensions) {
    if options.landscape_mode == LandscapeMode::None {
        return (Rotation::None, source);
    }
    // Rotation is only meaningful when both box axes are known and the box
    // is portrait-dominant while the source is landscape.
    if width_missing || height_missing {
        return (Rotation::None, source);
    }
    if source.is_landscape() && !target.is_landscape() {
        let rotation = match options.landscape_mode {
            LandscapeMode::Left => Rotation::Left,
            LandscapeMode::Right => Rotation::Right,
            LandscapeMode::None => unreachable!(),
        };
        (rotation, source.swapped())
    } else {
        (Rotation::None, source)
    }
}
