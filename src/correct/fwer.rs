//! Family-wise error rate corrections: Holm step-down and Bonferroni.

/// Holm step-down adjustment.
///
/// In ascending order, `q[rank] = max(q[rank-1], p[rank] * (n - rank + 1))`,
/// capped at 1 and mapped back to the input order.
pub fn correct_holm(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return vec![];
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut q_values = vec![0.0; n];
    let mut running_max: f64 = 0.0;
    for (i, &orig_idx) in indices.iter().enumerate() {
        let adjusted = p_values[orig_idx] * (n - i) as f64;
        running_max = running_max.max(adjusted).min(1.0);
        q_values[orig_idx] = running_max;
    }
    q_values
}

/// Bonferroni adjustment: `q = min(p * n, 1)`.
pub fn correct_bonferroni(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len() as f64;
    p_values.iter().map(|p| (p * n).min(1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_holm_known_values() {
        // p = [0.01, 0.04, 0.03], sorted [0.01, 0.03, 0.04]:
        // 0.01 * 3 = 0.03; 0.03 * 2 = 0.06; 0.04 * 1 = 0.04 -> max 0.06.
        let q = correct_holm(&[0.01, 0.04, 0.03]);
        assert_relative_eq!(q[0], 0.03, epsilon = 1e-10);
        assert_relative_eq!(q[1], 0.06, epsilon = 1e-10);
        assert_relative_eq!(q[2], 0.06, epsilon = 1e-10);
    }

    #[test]
    fn test_holm_no_stronger_than_bonferroni() {
        let p_values = vec![0.001, 0.02, 0.04, 0.3, 0.9];
        let holm = correct_holm(&p_values);
        let bonf = correct_bonferroni(&p_values);
        for (h, b) in holm.iter().zip(bonf.iter()) {
            assert!(h <= b);
        }
    }

    #[test]
    fn test_bonferroni_scales_and_caps() {
        let q = correct_bonferroni(&[0.01, 0.4, 0.001]);
        assert_relative_eq!(q[0], 0.03, epsilon = 1e-10);
        assert_relative_eq!(q[1], 1.0, epsilon = 1e-10);
        assert_relative_eq!(q[2], 0.003, epsilon = 1e-10);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(correct_holm(&[]).is_empty());
        assert!(correct_bonferroni(&[]).is_empty());
    }
}
