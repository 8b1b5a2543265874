//! Order-0 Shannon entropy over bytes.

/// Entropy in bits per byte, in `[0, 8]`. Empty input is 0.0.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }

    let len = data.len() as f64;
    let entropy = counts
        .iter()
        .filter(|&&c| c > 0)
        .fold(0.0f64, |acc, &c| {
            let p = c as f64 / len;
            acc - p * p.log2()
        });
    entropy.clamp(0.0, 8.0)
}
