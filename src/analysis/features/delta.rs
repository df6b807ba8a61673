// Delta module - Savitzky-Golay temporal derivatives
//
// A delta of order `d` is the `d`-th derivative of a least-squares polynomial
// of degree `d` fitted over `width` frames. For that degree the derivative is
// constant across the window, so the first and last `width / 2` frames take
// the value computed for the nearest full window.

/// Filter taps for a delta of `order` over `width` frames (1 or 2)
fn delta_coefficients(width: usize, order: usize) -> Vec<f32> {
    let half = (width / 2) as i64;
    let offsets: Vec<f64> = (-half..=half).map(|k| k as f64).collect();

    match order {
        1 => {
            let norm: f64 = offsets.iter().map(|k| k * k).sum();
            offsets.iter().map(|k| (k / norm) as f32).collect()
        }
        _ => {
            let mean_sq = offsets.iter().map(|k| k * k).sum::<f64>() / offsets.len() as f64;
            let centered: Vec<f64> = offsets.iter().map(|k| k * k - mean_sq).collect();
            let norm: f64 = centered.iter().map(|c| c * c).sum();
            centered.iter().map(|c| (2.0 * c / norm) as f32).collect()
        }
    }
}

/// Delta features along the frame axis of `[frame][band]` data
///
/// `order` must be 1 or 2 and `width` odd; inputs with fewer frames than
/// `width` yield all-zero deltas.
pub fn delta(data: &[Vec<f32>], width: usize, order: usize) -> Vec<Vec<f32>> {
    let frames = data.len();
    let bands = data.first().map_or(0, Vec::len);
    let mut out = vec![vec![0.0f32; bands]; frames];
    if frames < width || width == 0 {
        return out;
    }

    let coefficients = delta_coefficients(width, order);
    let half = width / 2;

    for center in half..frames - half {
        for band in 0..bands {
            out[center][band] = coefficients
                .iter()
                .enumerate()
                .map(|(j, c)| c * data[center + j - half][band])
                .sum();
        }
    }

    for frame in 0..half {
        out[frame] = out[half].clone();
    }
    for frame in frames - half..frames {
        out[frame] = out[frames - half - 1].clone();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f32]) -> Vec<Vec<f32>> {
        values.iter().map(|&v| vec![v]).collect()
    }

    #[test]
    fn test_width_five_coefficients() {
        let first = delta_coefficients(5, 1);
        let expected = [-0.2, -0.1, 0.0, 0.1, 0.2];
        for (c, e) in first.iter().zip(expected.iter()) {
            assert!((c - e).abs() < 1e-6);
        }

        let second = delta_coefficients(5, 2);
        let expected = [2.0 / 7.0, -1.0 / 7.0, -2.0 / 7.0, -1.0 / 7.0, 2.0 / 7.0];
        for (c, e) in second.iter().zip(expected.iter()) {
            assert!((c - e).abs() < 1e-6);
        }
    }

    #[test]
    fn test_first_delta_of_ramp_is_slope() {
        let ramp: Vec<f32> = (0..10).map(|i| 3.0 * i as f32).collect();
        let out = delta(&column(&ramp), 5, 1);
        assert!(out.iter().all(|frame| (frame[0] - 3.0).abs() < 1e-4));
    }

    #[test]
    fn test_second_delta_of_parabola_is_curvature() {
        let parabola: Vec<f32> = (0..12).map(|i| (i * i) as f32).collect();
        let out = delta(&column(&parabola), 5, 2);
        assert!(out.iter().all(|frame| (frame[0] - 2.0).abs() < 1e-3));
    }

    #[test]
    fn test_constant_input_has_zero_deltas() {
        let constant = vec![vec![0.7f32; 4]; 9];
        for order in [1, 2] {
            let out = delta(&constant, 5, order);
            assert_eq!(out.len(), 9);
            assert!(out.iter().flatten().all(|v| v.abs() < 1e-6));
        }
    }

    #[test]
    fn test_too_few_frames_yields_zeros() {
        let out = delta(&column(&[1.0, 5.0, 2.0]), 5, 1);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|frame| frame[0] == 0.0));
    }
}
