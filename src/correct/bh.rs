//! Benjamini-Hochberg false discovery rate correction.

/// Apply Benjamini-Hochberg FDR correction.
///
/// For each p-value the adjusted value (q-value) is
/// `q[i] = min(p[i] * n / rank[i], q[i+1])`, computed over the p-values in
/// ascending order and mapped back to the input order.
pub fn correct_bh(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return vec![];
    }

    // Sorted index by ascending p-value.
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut q_sorted = vec![0.0; n];
    let n_f64 = n as f64;

    // Start from the largest p-value and work backwards, enforcing
    // monotonicity.
    q_sorted[n - 1] = p_values[indices[n - 1]].min(1.0);
    for i in (0..n - 1).rev() {
        let rank = i + 1;
        let adjusted = p_values[indices[i]] * n_f64 / rank as f64;
        q_sorted[i] = adjusted.min(q_sorted[i + 1]).min(1.0);
    }

    // Restore original order.
    let mut q_values = vec![0.0; n];
    for (i, &orig_idx) in indices.iter().enumerate() {
        q_values[orig_idx] = q_sorted[i];
    }
    q_values
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bh_ordering() {
        // P-values in non-sorted order.
        let p_values = vec![0.04, 0.01, 0.03, 0.005];
        let q_values = correct_bh(&p_values);

        // Smallest p-value (0.005 at index 3): q = 0.005 * 4 / 1 = 0.02.
        assert_relative_eq!(q_values[3], 0.02, epsilon = 1e-10);
        // Second smallest (0.01 at index 1): min(0.01 * 4 / 2, next) = 0.02.
        assert_relative_eq!(q_values[1], 0.02, epsilon = 1e-10);
    }

    #[test]
    fn test_bh_known_values() {
        // 5 tests, p = [0.005, 0.01, 0.02, 0.04, 0.1]:
        // Rank 1: 0.005 * 5/1 = 0.025
        // Rank 2: 0.01 * 5/2 = 0.025
        // Rank 3: 0.02 * 5/3 = 0.0333
        // Rank 4: 0.04 * 5/4 = 0.05
        // Rank 5: 0.1 * 5/5 = 0.1
        let p_values = vec![0.005, 0.01, 0.02, 0.04, 0.1];
        let q_values = correct_bh(&p_values);

        assert_relative_eq!(q_values[0], 0.025, epsilon = 1e-10);
        assert_relative_eq!(q_values[1], 0.025, epsilon = 1e-10);
        assert_relative_eq!(q_values[2], 1.0 / 30.0, epsilon = 1e-10);
        assert_relative_eq!(q_values[3], 0.05, epsilon = 1e-10);
        assert_relative_eq!(q_values[4], 0.1, epsilon = 1e-10);
    }

    #[test]
    fn test_bh_monotone_in_sorted_order() {
        let p_values = vec![0.001, 0.01, 0.02, 0.05, 0.1, 0.5];
        let q_values = correct_bh(&p_values);

        let mut prev = 0.0;
        for q in &q_values {
            assert!(*q >= prev - 1e-12);
            prev = *q;
        }
    }

    #[test]
    fn test_bh_bounded() {
        let q_values = correct_bh(&[0.5, 0.6, 0.7, 0.8, 0.9]);
        for q in &q_values {
            assert!(*q <= 1.0);
        }
    }

    #[test]
    fn test_bh_never_deflates() {
        let p_values = vec![0.02, 0.5, 0.001, 0.3, 0.07];
        let q_values = correct_bh(&p_values);
        for (p, q) in p_values.iter().zip(q_values.iter()) {
            assert!(q >= p);
        }
    }

    #[test]
    fn test_bh_empty_and_single() {
        assert!(correct_bh(&[]).is_empty());
        let q = correct_bh(&[0.05]);
        assert_relative_eq!(q[0], 0.05, epsilon = 1e-10);
    }
}
