//! Spectral colour mapping for rendering.
//!
//! The wavelength → RGB approximation is the usual piecewise-linear visible
//! spectrum with intensity roll-off at the violet and red extremes. Purely a
//! display aid; nothing downstream computes with these values.

// ---------------------------------------------------------------------------
// Wavelength → RGB
// ---------------------------------------------------------------------------

/// Map a wavelength in nanometres to an RGB triple in [0, 1].
///
/// Wavelengths outside the visible 380–750 nm range map to black.
pub fn wavelength_to_rgb(nm: f64) -> (f64, f64, f64) {
    let (r, g, b) = if (380.0..440.0).contains(&nm) {
        (-(nm - 440.0) / (440.0 - 380.0), 0.0, 1.0)
    } else if (440.0..490.0).contains(&nm) {
        (0.0, (nm - 440.0) / (490.0 - 440.0), 1.0)
    } else if (490.0..510.0).contains(&nm) {
        (0.0, 1.0, -(nm - 510.0) / (510.0 - 490.0))
    } else if (510.0..580.0).contains(&nm) {
        ((nm - 510.0) / (580.0 - 510.0), 1.0, 0.0)
    } else if (580.0..645.0).contains(&nm) {
        (1.0, -(nm - 645.0) / (645.0 - 580.0), 0.0)
    } else if (645.0..=750.0).contains(&nm) {
        (1.0, 0.0, 0.0)
    } else {
        return (0.0, 0.0, 0.0);
    };

    // Roll the intensity off toward the ends of the visible range.
    let factor = if nm < 420.0 {
        0.3 + 0.7 * (nm - 380.0) / (420.0 - 380.0)
    } else if nm < 645.0 {
        1.0
    } else {
        0.3 + 0.7 * (750.0 - nm) / (750.0 - 645.0)
    };

    (r * factor, g * factor, b * factor)
}

/// Centre wavelength of each band, linearly spaced over `[start, end]`.
pub fn band_wavelengths(bands: usize, start: f64, end: f64) -> Vec<f64> {
    if bands <= 1 {
        return vec![start; bands];
    }
    let step = (end - start) / (bands - 1) as f64;
    (0..bands).map(|i| start + step * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEGMENT_BOUNDARIES: &[f64] = &[420.0, 440.0, 490.0, 510.0, 580.0, 645.0];

    fn close(a: (f64, f64, f64), b: (f64, f64, f64), tol: f64) -> bool {
        (a.0 - b.0).abs() < tol && (a.1 - b.1).abs() < tol && (a.2 - b.2).abs() < tol
    }

    #[test]
    fn continuous_at_interior_segment_boundaries() {
        for &nm in SEGMENT_BOUNDARIES {
            let below = wavelength_to_rgb(nm - 1e-7);
            let at = wavelength_to_rgb(nm);
            assert!(
                close(below, at, 1e-5),
                "discontinuity at {nm} nm: {below:?} vs {at:?}"
            );
        }
    }

    #[test]
    fn visible_range_edges_match_their_one_sided_limits() {
        assert!(close(
            wavelength_to_rgb(380.0),
            wavelength_to_rgb(380.0 + 1e-7),
            1e-5
        ));
        assert!(close(
            wavelength_to_rgb(750.0),
            wavelength_to_rgb(750.0 - 1e-7),
            1e-5
        ));
        // Roll-off endpoints.
        assert!(close(wavelength_to_rgb(380.0), (0.3, 0.0, 0.3), 1e-9));
        assert!(close(wavelength_to_rgb(750.0), (0.3, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn black_outside_visible_range() {
        for nm in [100.0, 379.9, 750.1, 1000.0] {
            assert_eq!(wavelength_to_rgb(nm), (0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn components_stay_in_unit_range() {
        let mut nm = 380.0;
        while nm <= 750.0 {
            let (r, g, b) = wavelength_to_rgb(nm);
            for v in [r, g, b] {
                assert!((0.0..=1.0).contains(&v), "{v} out of range at {nm} nm");
            }
            nm += 0.5;
        }
    }

    #[test]
    fn band_wavelengths_span_the_range() {
        let wl = band_wavelengths(28, 450.0, 650.0);
        assert_eq!(wl.len(), 28);
        assert!((wl[0] - 450.0).abs() < 1e-9);
        assert!((wl[27] - 650.0).abs() < 1e-9);
        assert!(wl.windows(2).all(|p| p[1] > p[0]));
    }
}
