//! Standard normal quantile function.

use std::f64::consts::{PI, SQRT_2};

/// Inverse of the standard normal CDF, `Φ⁻¹(p)`.
///
/// Acklam's rational approximation (relative error ~1e-9) followed by one
/// Halley refinement step against `erfc`, which brings it to near machine
/// precision. Returns `±∞` at `p = 1` / `p = 0` and NaN outside `[0, 1]`.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    let x = acklam(p);

    // Halley step on Φ(x) - p = 0.
    let e = 0.5 * libm::erfc(-x / SQRT_2) - p;
    let u = e * (2.0 * PI).sqrt() * (x * x / 2.0).exp();
    x - u / (1.0 + x * u / 2.0)
}

fn acklam(p: f64) -> f64 {
    // Coefficients for central region
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239e0,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];

    // Coefficients for tail regions
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838e0,
        -2.549_732_539_343_734e0,
        4.374_664_141_464_968e0,
        2.938_163_982_698_783e0,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996e0,
        3.754_408_661_907_416e0,
    ];

    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        let num = ((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5];
        let den = (((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0;
        num / den
    } else if p > P_HIGH {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        let num = ((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5];
        let den = (((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0;
        -(num / den)
    } else {
        let q = p - 0.5;
        let r = q * q;
        let num = (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q;
        let den = ((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0;
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn known_quantiles() {
        assert_abs_diff_eq!(inverse_normal_cdf(0.5), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(inverse_normal_cdf(0.975), 1.959_963_984_540_054, epsilon = 1e-10);
        assert_abs_diff_eq!(inverse_normal_cdf(0.995), 2.575_829_303_548_901, epsilon = 1e-10);
        assert_abs_diff_eq!(inverse_normal_cdf(0.01), -2.326_347_874_040_841, epsilon = 1e-10);
    }

    #[test]
    fn symmetric_about_half() {
        for &p in &[0.001, 0.02, 0.2, 0.4] {
            assert_abs_diff_eq!(inverse_normal_cdf(p), -inverse_normal_cdf(1.0 - p), epsilon = 1e-9);
        }
    }

    #[test]
    fn strictly_increasing() {
        let mut prev = f64::NEG_INFINITY;
        for i in 1..1000 {
            let z = inverse_normal_cdf(i as f64 / 1000.0);
            assert!(z > prev);
            prev = z;
        }
    }

    #[test]
    fn edges() {
        assert_eq!(inverse_normal_cdf(0.0), f64::NEG_INFINITY);
        assert_eq!(inverse_normal_cdf(1.0), f64::INFINITY);
        assert!(inverse_normal_cdf(1.5).is_nan());
    }
}
