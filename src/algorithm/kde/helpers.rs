//! KDE validation and host-side reference

use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};
use crate::tensor::Tensor;
use num_traits::{Float, NumCast, One};

/// Gaussian normalization `(sqrt(2 pi) h)^-d`, evaluated in `T`
///
/// Uses `1 / (sqrt(2 pi) h)` for `d = 1`, divides that by `(2 pi h^2)^(d/2)`
/// for other odd `d`, and uses `1 / (2 pi h^2)^(d/2)` for even `d`, so only
/// integer powers are taken.
#[inline]
pub fn gaussian_normalization<T: Float>(h: T, dim: usize) -> T {
    let two_pi = <T as NumCast>::from(std::f64::consts::TAU).unwrap_or_else(T::nan);
    let rsqrt_two_pi = <T as One>::one() / two_pi.sqrt();
    let half = (dim / 2) as i32;
    if dim == 1 {
        rsqrt_two_pi / h
    } else if dim % 2 == 1 {
        (rsqrt_two_pi / h) / (two_pi * h * h).powi(half)
    } else {
        <T as One>::one() / (two_pi * h * h).powi(half)
    }
}

fn check_float<R: Runtime>(arg: &'static str, t: &Tensor<R>) -> Result<()> {
    if t.dtype().is_float() {
        Ok(())
    } else {
        Err(Error::InvalidType {
            arg,
            expected: "a floating-point tensor (f32 or f64)",
            got: t.dtype(),
        })
    }
}

fn check_2d<R: Runtime>(arg: &'static str, t: &Tensor<R>) -> Result<()> {
    if t.ndim() == 2 {
        Ok(())
    } else {
        Err(Error::invalid_shape(arg, "a 2-D array", t.shape()))
    }
}

/// Validate the arguments of a caller-facing `kde`
///
/// Returns `(n_poi, n_sample, dim)`.
///
/// # Errors
///
/// In order: `InvalidType`, `InvalidShape`, `InvalidBandwidth` (also for NaN),
/// `DimensionMismatch`, `DTypeMismatch`, `DeviceMismatch`.
pub fn validate_kde_inputs<R: Runtime>(
    poi: &Tensor<R>,
    sample: &Tensor<R>,
    h: f64,
) -> Result<(usize, usize, usize)> {
    check_float("poi", poi)?;
    check_float("sample", sample)?;
    check_2d("poi", poi)?;
    check_2d("sample", sample)?;

    // NaN fails this comparison as well.
    if !(h > 0.0) {
        return Err(Error::InvalidBandwidth { value: h });
    }

    let (n_poi, d1) = (poi.shape()[0], poi.shape()[1]);
    let (n_sample, d2) = (sample.shape()[0], sample.shape()[1]);
    if d1 != d2 {
        return Err(Error::DimensionMismatch {
            poi: d1,
            sample: d2,
        });
    }

    if poi.dtype() != sample.dtype() {
        return Err(Error::DTypeMismatch {
            lhs: poi.dtype(),
            rhs: sample.dtype(),
        });
    }
    if !poi.device().is_same(sample.device()) {
        return Err(Error::DeviceMismatch);
    }

    Ok((n_poi, n_sample, d1))
}

/// Validate the buffers of a native KDE call
///
/// `poi` is `(n_poi, d)`, `sample` is `(n_sample, d)` and `pdf` is `(n_poi,)`,
/// all row-major contiguous, of one float dtype and on one device. Returns
/// `(n_poi, n_sample, d)`.
pub fn validate_native_kde_args<R: Runtime>(
    poi: &Tensor<R>,
    sample: &Tensor<R>,
    pdf: &Tensor<R>,
) -> Result<(usize, usize, usize)> {
    check_2d("poi", poi)?;
    check_2d("sample", sample)?;
    if pdf.ndim() != 1 {
        return Err(Error::invalid_shape("pdf", "a 1-D array", pdf.shape()));
    }

    let (n_poi, dim) = (poi.shape()[0], poi.shape()[1]);
    if sample.shape()[1] != dim {
        return Err(Error::DimensionMismatch {
            poi: dim,
            sample: sample.shape()[1],
        });
    }
    if pdf.shape()[0] != n_poi {
        return Err(Error::shape_mismatch(&[n_poi], pdf.shape()));
    }

    let dtype = poi.dtype();
    if !dtype.is_float() {
        return Err(Error::UnsupportedDType { dtype, op: "kde" });
    }
    for t in [sample, pdf] {
        if t.dtype() != dtype {
            return Err(Error::DTypeMismatch {
                lhs: dtype,
                rhs: t.dtype(),
            });
        }
    }

    if !(poi.is_contiguous() && sample.is_contiguous() && pdf.is_contiguous()) {
        return Err(Error::NotContiguous {
            op: "kde",
            order: "row-major",
        });
    }
    if !(poi.device().is_same(sample.device()) && poi.device().is_same(pdf.device())) {
        return Err(Error::DeviceMismatch);
    }

    Ok((n_poi, sample.shape()[0], dim))
}

/// Closed-form density on host slices, accumulated in `f64`
///
/// `poi` and `sample` are row-major with `dim` columns.
///
/// # Example
///
/// ```
/// use devkern::algorithm::kde::reference_density;
///
/// let density = reference_density(&[0.0], &[0.0], 1, 1.0).unwrap();
/// assert!((density[0] - 1.0 / (2.0 * std::f64::consts::PI).sqrt()).abs() < 1e-15);
/// ```
pub fn reference_density(poi: &[f64], sample: &[f64], dim: usize, h: f64) -> Result<Vec<f64>> {
    if !(h > 0.0) {
        return Err(Error::InvalidBandwidth { value: h });
    }
    if dim == 0 || poi.len() % dim != 0 || sample.len() % dim != 0 {
        return Err(Error::invalid_argument(
            "dim",
            format!(
                "{dim} does not divide the input lengths {} and {}",
                poi.len(),
                sample.len()
            ),
        ));
    }
    if sample.is_empty() {
        return Err(Error::invalid_argument("sample", "at least one sample row is required"));
    }

    let n_sample = (sample.len() / dim) as f64;
    let norm = ((2.0 * std::f64::consts::PI).sqrt() * h).powi(-(dim as i32));
    let density = poi
        .chunks_exact(dim)
        .map(|p| {
            let total: f64 = sample
                .chunks_exact(dim)
                .map(|s| {
                    let dist_sq: f64 = p.iter().zip(s).map(|(a, b)| (a - b) * (a - b)).sum();
                    (-dist_sq / (2.0 * h * h)).exp()
                })
                .sum();
            total / n_sample * norm
        })
        .collect();
    Ok(density)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    fn zeros(shape: &[usize], dtype: DType) -> Tensor<CpuRuntime> {
        Tensor::zeros(shape, dtype, &CpuDevice::new()).unwrap()
    }

    #[test]
    fn test_gaussian_normalization_parity_cases() {
        let h = 0.35f64;
        for dim in 1..=7 {
            let expected = ((2.0 * std::f64::consts::PI).sqrt() * h).powi(-(dim as i32));
            let got = gaussian_normalization(h, dim);
            assert!((got - expected).abs() <= 1e-13 * expected, "dim {dim}: {got} vs {expected}");
        }
        let f = gaussian_normalization(0.5f32, 3);
        assert!((f as f64 - ((2.0 * std::f64::consts::PI).sqrt() * 0.5).powi(-3)).abs() < 1e-5);
    }

    #[test]
    fn test_validation_order() {
        let ints = zeros(&[3, 2], DType::I64);
        let flat = zeros(&[6], DType::F64);
        let poi = zeros(&[3, 2], DType::F64);
        let sample3 = zeros(&[4, 3], DType::F64);

        // Type is checked before shape.
        assert!(matches!(
            validate_kde_inputs(&ints, &flat, 1.0),
            Err(Error::InvalidType { arg: "poi", .. })
        ));
        // Shape before bandwidth.
        assert!(matches!(
            validate_kde_inputs(&poi, &flat, -1.0),
            Err(Error::InvalidShape { arg: "sample", .. })
        ));
        // Bandwidth before dimensionality.
        assert!(matches!(
            validate_kde_inputs(&poi, &sample3, 0.0),
            Err(Error::InvalidBandwidth { .. })
        ));
        assert!(matches!(
            validate_kde_inputs(&poi, &sample3, f64::NAN),
            Err(Error::InvalidBandwidth { .. })
        ));
        assert!(matches!(
            validate_kde_inputs(&poi, &sample3, 1.0),
            Err(Error::DimensionMismatch { poi: 2, sample: 3 })
        ));
        assert!(matches!(
            validate_kde_inputs(&poi, &zeros(&[4, 2], DType::F32), 1.0),
            Err(Error::DTypeMismatch { .. })
        ));
        assert_eq!(validate_kde_inputs(&poi, &zeros(&[5, 2], DType::F64), 0.1).unwrap(), (3, 5, 2));
    }

    #[test]
    fn test_native_args() {
        let poi = zeros(&[3, 2], DType::F32);
        let sample = zeros(&[5, 2], DType::F32);
        assert_eq!(
            validate_native_kde_args(&poi, &sample, &zeros(&[3], DType::F32)).unwrap(),
            (3, 5, 2)
        );
        assert!(matches!(
            validate_native_kde_args(&poi, &sample, &zeros(&[4], DType::F32)),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            validate_native_kde_args(&poi, &sample, &zeros(&[3], DType::F64)),
            Err(Error::DTypeMismatch { .. })
        ));
        let strided = zeros(&[2, 3], DType::F32).t().unwrap();
        assert!(matches!(
            validate_native_kde_args(&strided, &sample, &zeros(&[3], DType::F32)),
            Err(Error::NotContiguous { .. })
        ));
    }

    #[test]
    fn test_reference_density_single_point() {
        // One sample at the origin, evaluated one bandwidth away in 2-D.
        let h = 2.0;
        let d = reference_density(&[2.0, 0.0], &[0.0, 0.0], 2, h).unwrap();
        let expected = (-0.5f64).exp() / (2.0 * std::f64::consts::PI * h * h);
        assert!((d[0] - expected).abs() < 1e-15);
    }

    #[test]
    fn test_reference_density_rejects_bad_input() {
        assert!(reference_density(&[0.0], &[0.0], 1, 0.0).is_err());
        assert!(reference_density(&[0.0, 1.0, 2.0], &[0.0, 1.0], 2, 1.0).is_err());
        assert!(reference_density(&[0.0], &[], 1, 1.0).is_err());
    }
}
