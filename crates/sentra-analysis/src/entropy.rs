//! Entropy-based encrypted-content detection

/// Calculate Shannon entropy of a byte slice, in bits per byte.
///
/// Higher entropy = more random = more likely ciphertext or compressed data.
///
/// # Performance
///
/// O(n) with fast frequency counting
#[inline]
#[must_use]
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    // Count byte frequencies
    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }

    // Calculate entropy
    let len = data.len() as f64;
    let mut entropy = 0.0;

    for &count in &freq {
        if count > 0 {
            let p = f64::from(count) / len;
            entropy -= p * p.log2();
        }
    }

    entropy
}

/// Calculate entropy for a string slice.
#[inline]
#[must_use]
pub fn string_entropy(s: &str) -> f64 {
    shannon_entropy(s.as_bytes())
}

/// Whether content reads as encrypted at the given threshold.
///
/// Classification on ciphertext is meaningless, so callers exclude such
/// content from text analysis and record it as encrypted instead. Short
/// buffers are never flagged: the estimate is too noisy below ~64 bytes.
#[inline]
#[must_use]
pub fn is_likely_encrypted(data: &[u8], threshold: f64) -> bool {
    if data.len() < 64 {
        return false;
    }
    shannon_entropy(data) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_calculation() {
        // Low entropy (repetitive)
        let low = "aaaaaaaaaaaaaaaaaaaaaaaa";
        assert!(string_entropy(low) < 1.0);

        // Medium entropy (English text)
        let medium = "the quick brown fox jumps";
        let med_entropy = string_entropy(medium);
        assert!(med_entropy > 2.0 && med_entropy < 4.5);

        // High entropy (random-looking)
        let high = "4Kx9mNpQ2wRtYuVbXzAs5DrFgHjKlMnO";
        assert!(string_entropy(high) > 4.5);
    }

    #[test]
    fn test_entropy_empty() {
        assert!((shannon_entropy(&[]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_entropy_uniform_bytes_approaches_eight() {
        let all_bytes: Vec<u8> = (0..=255).collect();
        let e = shannon_entropy(&all_bytes);
        assert!((e - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_likely_encrypted() {
        // Uniform byte spread over a full cycle reads as ciphertext
        let cipherish: Vec<u8> = (0..1024u32).map(|i| (i % 256) as u8).collect();
        assert!(is_likely_encrypted(&cipherish, 7.2));

        let text = b"plain english text that repeats plain english text that repeats";
        assert!(!is_likely_encrypted(text, 7.2));
    }

    #[test]
    fn test_short_buffers_never_flagged() {
        let short: Vec<u8> = (0..32u32).map(|i| (i * 37 % 256) as u8).collect();
        assert!(!is_likely_encrypted(&short, 1.0));
    }
}
