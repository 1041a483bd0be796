pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt()
}

/// Cosine similarity. Mismatched lengths and zero vectors score 0.0.
///
/// Accumulates in f64 so `cosine_similarity(v, v)` is exactly 1.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }

    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let score = dot / (na * nb).sqrt();
    if score.is_finite() {
        score as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_similarity_is_one() {
        for v in [
            vec![1.0, 0.0],
            vec![0.3, 0.3, 0.3],
            vec![1e-3, 7.0, -2.5, 0.125],
            crate::providers::hashed_embedding::hashed_embedding("anything"),
        ] {
            assert_eq!(cosine_similarity(&v, &v), 1.0, "{v:?}");
        }
    }

    #[test]
    fn zero_and_mismatched_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn diagonal_scores_half_sqrt_two() {
        let s = cosine_similarity(&[1.0, 0.0], &[1.0, 1.0]);
        assert!((s - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((l2_norm(&[3.0, 4.0]) - 5.0).abs() < 1e-12);
    }
}
