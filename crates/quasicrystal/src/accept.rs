//! Acceptance evaluator: project a lattice vector and test both windows.
//!
//! Contract
//! - Accept `v` iff `‖W·v + phason‖² <= perp_window²` and `‖P·v‖² <= clip_radius²`.
//! - The perpendicular sum is tested after every axis so most candidates are
//!   rejected after one or two dot products; the accepted set is identical to
//!   the one from a single final comparison.
//! - A non-positive radius is an empty window (zero acceptance), not an error.
//!
//! Pure function over read-only inputs; safe to call from any number of samplers.

use crate::params::GenerationParams;
use crate::structures::StructureDefinition;
use nalgebra::Vector3;

/// A lattice point that survived both window tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcceptedPoint {
    pub position: Vector3<f64>,
    /// `‖W·v + phason‖`.
    pub perp_distance: f64,
    pub color: Option<[f32; 3]>,
}

/// Precomputed window thresholds for one session.
#[derive(Clone, Copy, Debug)]
pub struct AcceptanceWindow {
    pub perp_window: f64,
    pub perp_window_sq: f64,
    pub clip_radius_sq: f64,
    pub phason_offset: f64,
    pub colorize: bool,
    empty: bool,
}

impl AcceptanceWindow {
    pub fn new(perp_window: f64, clip_radius: f64, phason_offset: f64, colorize: bool) -> Self {
        Self {
            perp_window,
            perp_window_sq: perp_window * perp_window,
            clip_radius_sq: clip_radius * clip_radius,
            phason_offset,
            colorize,
            empty: !(perp_window > 0.0 && clip_radius > 0.0),
        }
    }

    pub fn from_params(params: &GenerationParams) -> Self {
        Self::new(
            params.perp_window,
            params.clip_radius,
            params.phason_offset,
            params.colorize,
        )
    }

    /// True when no lattice vector can pass (a radius is zero or negative).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.empty
    }
}

/// Evaluate one candidate; `None` means rejected.
#[inline]
pub fn evaluate(
    v: &[i32],
    structure: &StructureDefinition,
    window: &AcceptanceWindow,
) -> Option<AcceptedPoint> {
    if window.empty {
        return None;
    }
    let mut perp_sq = 0.0;
    for axis in 0..3 {
        let w = structure.perp_axis(axis, v) + window.phason_offset;
        perp_sq += w * w;
        if perp_sq > window.perp_window_sq {
            return None;
        }
    }
    let position = structure.project_physical(v);
    if position.norm_squared() > window.clip_radius_sq {
        return None;
    }
    let perp_distance = perp_sq.sqrt();
    let color = window
        .colorize
        .then(|| color_ramp(perp_distance / window.perp_window));
    Some(AcceptedPoint {
        position,
        perp_distance,
        color,
    })
}

const RAMP_START: [f32; 3] = [0.0, 1.0, 1.0];
const RAMP_MID: [f32; 3] = [0.5, 0.0, 1.0];
const RAMP_END: [f32; 3] = [1.0, 0.0, 0.2];

/// Two-segment linear ramp: cyan at 0, violet at 0.5, red at 1. `t` is clamped to [0, 1].
pub fn color_ramp(t: f64) -> [f32; 3] {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) as f32 };
    if t < 0.5 {
        lerp(RAMP_START, RAMP_MID, t * 2.0)
    } else {
        lerp(RAMP_MID, RAMP_END, (t - 0.5) * 2.0)
    }
}

#[inline]
fn lerp(a: [f32; 3], b: [f32; 3], s: f32) -> [f32; 3] {
    [
        a[0] * (1.0 - s) + b[0] * s,
        a[1] * (1.0 - s) + b[1] * s,
        a[2] * (1.0 - s) + b[2] * s,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::StructureKind;
    use proptest::prelude::*;

    fn direct_accepts(v: &[i32], def: &StructureDefinition, win: &AcceptanceWindow) -> bool {
        let shift = Vector3::repeat(win.phason_offset);
        let v_f = nalgebra::DVector::from_iterator(v.len(), v.iter().map(|&x| x as f64));
        let w = &def.perp * v_f;
        let w = Vector3::new(w[0], w[1], w[2]) + shift;
        let p = def.project_physical(v);
        w.norm_squared() <= win.perp_window_sq && p.norm_squared() <= win.clip_radius_sq
    }

    #[test]
    fn origin_is_accepted_without_phason() {
        let def = StructureKind::Icosahedral.definition();
        let win = AcceptanceWindow::new(1.5, 8.0, 0.0, true);
        let pt = evaluate(&[0; 6], def, &win).unwrap();
        assert_eq!(pt.position, Vector3::zeros());
        assert_eq!(pt.perp_distance, 0.0);
        assert_eq!(pt.color, Some(RAMP_START));
    }

    #[test]
    fn phason_shift_moves_origin_out_of_window() {
        let def = StructureKind::Icosahedral.definition();
        // |(1,1,1)| = sqrt(3) > 1.5
        let win = AcceptanceWindow::new(1.5, 8.0, 1.0, false);
        assert!(evaluate(&[0; 6], def, &win).is_none());
    }

    #[test]
    fn non_positive_windows_accept_nothing() {
        let def = StructureKind::Octagonal.definition();
        for win in [
            AcceptanceWindow::new(0.0, 8.0, 0.0, false),
            AcceptanceWindow::new(1.5, 0.0, 0.0, false),
            AcceptanceWindow::new(-1.5, 8.0, 0.0, false),
        ] {
            assert!(win.is_empty());
            assert!(evaluate(&[0; 4], def, &win).is_none());
        }
    }

    #[test]
    fn color_only_when_enabled() {
        let def = StructureKind::Octagonal.definition();
        let win = AcceptanceWindow::new(1.5, 8.0, 0.0, false);
        assert_eq!(evaluate(&[0; 4], def, &win).unwrap().color, None);
    }

    #[test]
    fn color_ramp_control_points() {
        assert_eq!(color_ramp(0.0), RAMP_START);
        assert_eq!(color_ramp(0.5), RAMP_MID);
        assert_eq!(color_ramp(1.0), RAMP_END);
        assert_eq!(color_ramp(7.0), RAMP_END);
        let q = color_ramp(0.25);
        assert!((q[0] - 0.25).abs() < 1e-6 && (q[1] - 0.5).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn incremental_test_matches_direct_recomputation(
            v in prop::collection::vec(-12i32..=12, 6),
            perp in 0.1f64..4.0,
            clip in 0.5f64..20.0,
            phason in -2.0f64..2.0,
        ) {
            let def = StructureKind::Icosahedral.definition();
            let win = AcceptanceWindow::new(perp, clip, phason, true);
            let got = evaluate(&v, def, &win);
            prop_assert_eq!(got.is_some(), direct_accepts(&v, def, &win));
            if let Some(pt) = got {
                prop_assert!(pt.position.norm() <= clip + 1e-9);
                prop_assert!(pt.perp_distance <= perp + 1e-9);
                let c = pt.color.unwrap();
                prop_assert!(c.iter().all(|x| (0.0..=1.0).contains(x)));
            }
        }

        #[test]
        fn octagonal_incremental_test_matches_direct(
            v in prop::collection::vec(-6i32..=6, 4),
            perp in 0.1f64..3.0,
            clip in 0.5f64..10.0,
        ) {
            let def = StructureKind::Octagonal.definition();
            let win = AcceptanceWindow::new(perp, clip, 0.0, false);
            prop_assert_eq!(evaluate(&v, def, &win).is_some(), direct_accepts(&v, def, &win));
        }
    }
}
