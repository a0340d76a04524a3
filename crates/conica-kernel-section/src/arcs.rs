//! Sets of arcs on the angle circle, stored as unwrapped `(start, end)`
//! pairs with `start < end <= start + 2π`.

use std::f64::consts::{PI, TAU};

/// Arcs shorter than this are dropped.
const MIN_ARC: f64 = 1e-12;

pub(crate) type Arc = (f64, f64);

pub(crate) fn is_full(arc: &Arc) -> bool {
    arc.1 - arc.0 >= TAU - MIN_ARC
}

/// The u bound of a parameter rectangle as an arc set.
pub(crate) fn bound_arcs(range: (f64, f64)) -> Vec<Arc> {
    if range.1 - range.0 >= TAU - MIN_ARC {
        vec![(range.0, range.0 + TAU)]
    } else if range.1 - range.0 > MIN_ARC {
        vec![range]
    } else {
        Vec::new()
    }
}

/// Angles `w` with `cos w ∈ [lo, hi]`.
pub(crate) fn cos_window(lo: f64, hi: f64) -> Vec<Arc> {
    if lo > hi || lo > 1.0 || hi < -1.0 || lo.is_nan() || hi.is_nan() {
        return Vec::new();
    }
    let near = hi.min(1.0).acos();
    let far = lo.max(-1.0).acos();
    let arcs = match (hi >= 1.0, lo <= -1.0) {
        (true, true) => vec![(-PI, PI)],
        (true, false) => vec![(-far, far)],
        (false, true) => vec![(near, TAU - near)],
        (false, false) => vec![(near, far), (-far, -near)],
    };
    arcs.into_iter().filter(|a| a.1 - a.0 > MIN_ARC).collect()
}

/// Every arc of `arcs` moved by `shift`.
pub(crate) fn shifted(arcs: Vec<Arc>, shift: f64) -> Vec<Arc> {
    arcs.into_iter().map(|(a, b)| (a + shift, b + shift)).collect()
}

/// Pairwise intersection of two arc sets.
pub(crate) fn intersect(a: &[Arc], b: &[Arc]) -> Vec<Arc> {
    let mut out = Vec::new();
    for ia in a {
        for ib in b {
            if is_full(ib) {
                out.push(*ia);
                continue;
            }
            if is_full(ia) {
                out.push(*ib);
                continue;
            }
            for k in -2..=2 {
                let shift = TAU * k as f64;
                let lo = ia.0.max(ib.0 + shift);
                let hi = ia.1.min(ib.1 + shift);
                if hi - lo > MIN_ARC {
                    out.push((lo, hi));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Arc, b: Arc) -> bool {
        (a.0 - b.0).abs() < 1e-12 && (a.1 - b.1).abs() < 1e-12
    }

    #[test]
    fn test_cos_window_cases() {
        assert!(cos_window(2.0, 3.0).is_empty());
        assert!(is_full(&cos_window(-2.0, 2.0)[0]));

        let top = cos_window(0.5, 2.0);
        assert_eq!(top.len(), 1);
        assert!(close(top[0], (-PI / 3.0, PI / 3.0)));

        let bottom = cos_window(-2.0, 0.5);
        assert!(close(bottom[0], (PI / 3.0, TAU - PI / 3.0)));

        let band = cos_window(0.0, 0.5);
        assert_eq!(band.len(), 2);
        assert!(close(band[0], (PI / 3.0, PI / 2.0)));
        assert!(close(band[1], (-PI / 2.0, -PI / 3.0)));
    }

    #[test]
    fn test_intersect_across_seam() {
        let window = vec![(-2.0, 1.0)];
        let bound = bound_arcs((0.0, 5.0));
        let mut pieces = intersect(&window, &bound);
        pieces.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert_eq!(pieces.len(), 2);
        assert!(close(pieces[0], (-2.0, 5.0 - TAU)));
        assert!(close(pieces[1], (0.0, 1.0)));
    }

    #[test]
    fn test_intersect_with_full_turn() {
        let full = bound_arcs((0.0, TAU));
        assert_eq!(intersect(&[(1.0, 2.0)], &full), vec![(1.0, 2.0)]);

        assert_eq!(intersect(&full, &[(5.0, 7.0)]), vec![(5.0, 7.0)]);
        assert!(intersect(&[(1.0, 2.0)], &[(2.5, 3.0)]).is_empty());
    }
}
