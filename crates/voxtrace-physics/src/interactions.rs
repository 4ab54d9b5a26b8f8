//! Closed-form photon interaction models
//!
//! These are order-of-magnitude models used for range-cut conversion and by the
//! CPU reference engine. Production cross-section tables are produced by the
//! transport engine itself.

use crate::elements::{CLASSICAL_ELECTRON_RADIUS_MM, ELECTRON_MASS_MEV, FINE_STRUCTURE};

/// Thomson cross section (mm²)
pub const THOMSON_CROSS_SECTION_MM2: f64 =
    8.0 * std::f64::consts::PI / 3.0 * CLASSICAL_ELECTRON_RADIUS_MM * CLASSICAL_ELECTRON_RADIUS_MM;

/// Screening energy scale ħc / a0 (MeV), multiplied by Z^(1/3) per element
const SCREENING_ENERGY_MEV: f64 = 3.73e-3;

/// Klein–Nishina total cross section per electron (mm²)
pub fn klein_nishina_per_electron(energy_mev: f64) -> f64 {
    let k = energy_mev / ELECTRON_MASS_MEV;
    if k < 1.0e-2 {
        // Series expansion, the closed form cancels badly near k = 0
        return THOMSON_CROSS_SECTION_MM2 * (1.0 - 2.0 * k + 5.2 * k * k - 13.3 * k * k * k);
    }
    let two_pi_re2 =
        2.0 * std::f64::consts::PI * CLASSICAL_ELECTRON_RADIUS_MM * CLASSICAL_ELECTRON_RADIUS_MM;
    let one_2k = 1.0 + 2.0 * k;
    let log_term = one_2k.ln();
    two_pi_re2
        * ((1.0 + k) / (k * k) * (2.0 * (1.0 + k) / one_2k - log_term / k)
            + log_term / (2.0 * k)
            - (1.0 + 3.0 * k) / (one_2k * one_2k))
}

/// K-shell photoelectric cross section per atom in the Born approximation (mm²)
pub fn photoelectric_per_atom(atomic_number: u8, energy_mev: f64) -> f64 {
    let z = f64::from(atomic_number);
    let alpha4 = FINE_STRUCTURE.powi(4);
    4.0 * std::f64::consts::SQRT_2
        * alpha4
        * z.powi(5)
        * THOMSON_CROSS_SECTION_MM2
        * (ELECTRON_MASS_MEV / energy_mev).powf(3.5)
}

/// Coherent scattering per atom: Thomson scattering on Z electrons with a
/// screening cutoff (mm²)
pub fn rayleigh_per_atom(atomic_number: u8, energy_mev: f64) -> f64 {
    let z = f64::from(atomic_number);
    let cutoff = SCREENING_ENERGY_MEV * z.cbrt();
    let ratio = energy_mev / cutoff;
    THOMSON_CROSS_SECTION_MM2 * z * z / (1.0 + ratio * ratio)
}

/// Find `x` in `[lo, hi]` with `f(x) == target` for an increasing `f`, bisecting
/// in log space. Clamps to the bracket when the target lies outside it.
pub fn solve_increasing(f: impl Fn(f64) -> f64, lo: f64, hi: f64, target: f64) -> f64 {
    if f(lo) >= target {
        return lo;
    }
    if f(hi) <= target {
        return hi;
    }
    let (mut a, mut b) = (lo.ln(), hi.ln());
    for _ in 0..100 {
        let mid = 0.5 * (a + b);
        if f(mid.exp()) < target {
            a = mid;
        } else {
            b = mid;
        }
    }
    (0.5 * (a + b)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_klein_nishina_limits() {
        // Approaches Thomson at low energy
        let low = klein_nishina_per_electron(1.0e-4);
        assert!((low / THOMSON_CROSS_SECTION_MM2 - 1.0).abs() < 1.0e-3);

        // Series and closed form agree at the switch-over point
        let below = klein_nishina_per_electron(ELECTRON_MASS_MEV * 0.00999);
        let above = klein_nishina_per_electron(ELECTRON_MASS_MEV * 0.01001);
        assert!((below / above - 1.0).abs() < 1.0e-3);

        // Decreasing with energy
        assert!(klein_nishina_per_electron(1.0) < klein_nishina_per_electron(0.1));
    }

    #[test]
    fn test_photoelectric_scaling() {
        let lead = photoelectric_per_atom(82, 0.1);
        let oxygen = photoelectric_per_atom(8, 0.1);
        assert!(lead > oxygen * 1000.0);
        assert!(photoelectric_per_atom(8, 0.01) > photoelectric_per_atom(8, 0.1));
    }

    #[test]
    fn test_rayleigh_positive_and_falling() {
        assert!(rayleigh_per_atom(8, 0.01) > rayleigh_per_atom(8, 1.0));
        assert!(rayleigh_per_atom(1, 1.0) > 0.0);
    }

    #[test]
    fn test_solve_increasing() {
        let root = solve_increasing(|x| x * x, 1.0e-3, 100.0, 4.0);
        assert!((root - 2.0).abs() < 1.0e-6);
        assert_eq!(solve_increasing(|x| x, 1.0, 2.0, 0.5), 1.0);
        assert_eq!(solve_increasing(|x| x, 1.0, 2.0, 5.0), 2.0);
    }
}
