//! Point samplers used when moving values between grids.
//!
//! Both samplers take fractional *center* indices: `x = 0.0` is the center of
//! the first column, `x = -0.5` its outer edge. Anything beyond the outer
//! edges samples as `NaN`.

fn outside(x: f64, y: f64, width: usize, height: usize) -> bool {
    !(x >= -0.5 && y >= -0.5 && x < width as f64 - 0.5 && y < height as f64 - 0.5)
}

/// Nearest neighbor interpolation.
///
/// Returns the value of the cell whose footprint contains the point.
pub fn nearest_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if outside(x, y, width, height) {
        return f32::NAN;
    }
    let col = ((x + 0.5).floor() as usize).min(width - 1);
    let row = ((y + 0.5).floor() as usize).min(height - 1);
    data[row * width + col]
}

/// Bilinear interpolation between the four surrounding cell centers.
///
/// Points in the outer half-cell are clamped to the border centers. If any of
/// the four corners is `NaN` the result is `NaN`.
pub fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if outside(x, y, width, height) {
        return f32::NAN;
    }
    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_interpolate() {
        #[rustfmt::skip]
        let data: Vec<f32> = vec![
            1.0, 2.0, 3.0,
            4.0, 5.0, 6.0,
            7.0, 8.0, 9.0,
        ];

        assert_eq!(nearest_interpolate(&data, 3, 3, 0.0, 0.0), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 1.0, 1.0), 5.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.4, 0.4), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.6, 0.6), 5.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, -0.5, 2.4), 7.0);
        assert!(nearest_interpolate(&data, 3, 3, 2.5, 0.0).is_nan());
        assert!(nearest_interpolate(&data, 3, 3, -0.6, 0.0).is_nan());
    }

    #[test]
    fn test_bilinear_interpolate() {
        #[rustfmt::skip]
        let data: Vec<f32> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];

        // Corners
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 0.0), 1.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 0.0), 2.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 1.0), 3.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 1.0), 4.0);
        // Center
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.5, 0.5), 2.5);
        // Outer half-cell clamps to the border
        assert_eq!(bilinear_interpolate(&data, 2, 2, -0.3, 0.0), 1.0);
    }

    #[test]
    fn test_bilinear_nan_corner_propagates() {
        let data: Vec<f32> = vec![1.0, f32::NAN, 3.0, 4.0];
        assert!(bilinear_interpolate(&data, 2, 2, 0.5, 0.5).is_nan());
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 1.0), 3.0);
    }
}
