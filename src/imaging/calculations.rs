//! Pure resize-geometry math.
//!
//! Everything here is free of I/O. [`resize_geometry`] decides whether a size
//! policy entry yields a derivative for a given source and, if so, which source
//! rectangle to sample and how big the output is.

use crate::types::SizeSpec;

/// Source rectangle to sample plus the final derivative dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeGeometry {
    pub copy_x: u32,
    pub copy_y: u32,
    pub copy_width: u32,
    pub copy_height: u32,
    /// Output (derivative) width.
    pub width: u32,
    /// Output (derivative) height.
    pub height: u32,
}

/// Compute the resize geometry for `source` dimensions and a target `spec`.
///
/// Returns `None` when no derivative should exist: degenerate input, or an
/// output that would be at least as large as the source in both dimensions.
///
/// # Examples
/// ```
/// # use rethumb::imaging::resize_geometry;
/// # use rethumb::types::SizeSpec;
/// let g = resize_geometry((4000, 3000), &SizeSpec::crop(300, 275)).unwrap();
/// assert_eq!((g.width, g.height), (300, 275));
///
/// // Source already fits inside the box: nothing to generate.
/// assert!(resize_geometry((500, 400), &SizeSpec::fit(960, 960)).is_none());
/// ```
pub fn resize_geometry(source: (u32, u32), spec: &SizeSpec) -> Option<ResizeGeometry> {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return None;
    }
    if spec.width == 0 && spec.height == 0 {
        return None;
    }

    let geometry = if spec.crop {
        cover_geometry(source, spec.width, spec.height)
    } else {
        contain_geometry(source, spec.width, spec.height)
    };

    // A zero-sized output cannot be encoded; treat it like a pointless resize.
    if geometry.width == 0 || geometry.height == 0 {
        return None;
    }
    if geometry.width >= src_w && geometry.height >= src_h {
        return None;
    }
    Some(geometry)
}

/// Crop mode: fill the (source-clamped) target box exactly, sampling a
/// centered source rectangle with the target's aspect ratio.
fn cover_geometry(source: (u32, u32), target_w: u32, target_h: u32) -> ResizeGeometry {
    let (src_w, src_h) = source;
    let aspect = src_w as f64 / src_h as f64;

    let mut target_w = target_w.min(src_w);
    let mut target_h = target_h.min(src_h);
    if target_w == 0 {
        target_w = (target_h as f64 * aspect) as u32;
    }
    if target_h == 0 {
        target_h = (target_w as f64 / aspect) as u32;
    }

    let scale = f64::max(
        target_w as f64 / src_w as f64,
        target_h as f64 / src_h as f64,
    );
    let copy_width = ((target_w as f64 / scale).round() as u32).min(src_w);
    let copy_height = ((target_h as f64 / scale).round() as u32).min(src_h);

    ResizeGeometry {
        copy_x: (src_w - copy_width) / 2,
        copy_y: (src_h - copy_height) / 2,
        copy_width,
        copy_height,
        width: target_w,
        height: target_h,
    }
}

/// Fit mode: shrink the whole source to fit inside the target box, keeping
/// the aspect ratio. A zero target dimension leaves that axis unconstrained.
fn contain_geometry(source: (u32, u32), target_w: u32, target_h: u32) -> ResizeGeometry {
    let (src_w, src_h) = source;

    let (width, height) = if target_w == 0 && target_h == 0 {
        (src_w, src_h)
    } else {
        let mut width_ratio = 1.0_f64;
        let mut height_ratio = 1.0_f64;
        let width_constrained = target_w > 0 && src_w > target_w;
        let height_constrained = target_h > 0 && src_h > target_h;

        if width_constrained {
            width_ratio = target_w as f64 / src_w as f64;
        }
        if height_constrained {
            height_ratio = target_h as f64 / src_h as f64;
        }

        // Prefer the larger ratio; fall back to the smaller one when the
        // larger would push either axis past its target. An unset (zero)
        // target always counts as overflowed here.
        let mut ratio = width_ratio.max(height_ratio);
        if (src_w as f64 * ratio) as u32 > target_w || (src_h as f64 * ratio) as u32 > target_h {
            ratio = width_ratio.min(height_ratio);
        }

        let mut width = ((src_w as f64 * ratio) as u32).max(1);
        let mut height = ((src_h as f64 * ratio) as u32).max(1);

        // Floating point can land one pixel short of a constrained target.
        if width_constrained && width + 1 == target_w {
            width = target_w;
        }
        if height_constrained && height + 1 == target_h {
            height = target_h;
        }
        (width, height)
    };

    ResizeGeometry {
        copy_x: 0,
        copy_y: 0,
        copy_width: src_w,
        copy_height: src_h,
        width,
        height,
    }
}
