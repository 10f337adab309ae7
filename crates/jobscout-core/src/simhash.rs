//! SimHash: a locality-sensitive 64-bit fingerprint over a document's
//! tokens, such that similar documents have fingerprints with small
//! Hamming distance. Used by the crawler to skip re-extraction of
//! postings whose content has not meaningfully changed.

/// Two fingerprints within this Hamming distance are considered the
/// same document. Tolerates dynamic boilerplate (timestamps, view
/// counts) without tolerating real edits.
pub const NEAR_DUPLICATE_DISTANCE: u32 = 3;

/// Compute the 64-bit SimHash fingerprint of a document.
///
/// Tokens are lowercased words split on non-alphanumeric bytes. Each
/// token hashes to a stable 64-bit feature; bit i of the feature
/// contributes +1 (set) or -1 (unset) to slot i of an accumulator, and
/// bit i of the fingerprint is 1 iff slot i ends positive.
pub fn simhash64(content: &[u8]) -> u64 {
    let text = String::from_utf8_lossy(content);
    let mut slots = [0i32; 64];

    for token in tokens(&text) {
        let feature = token_feature(token);
        for (i, slot) in slots.iter_mut().enumerate() {
            if feature >> i & 1 == 1 {
                *slot += 1;
            } else {
                *slot -= 1;
            }
        }
    }

    let mut fingerprint = 0u64;
    for (i, slot) in slots.iter().enumerate() {
        if *slot > 0 {
            fingerprint |= 1 << i;
        }
    }
    fingerprint
}

/// Number of differing bits between two fingerprints.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Whether two fingerprints identify the same document for skip
/// purposes.
pub fn is_near_duplicate(a: u64, b: u64) -> bool {
    hamming_distance(a, b) <= NEAR_DUPLICATE_DISTANCE
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

/// Stable 64-bit feature of one token: the first 8 bytes of its md5
/// digest over the lowercased form.
fn token_feature(token: &str) -> u64 {
    let digest = md5::compute(token.to_lowercase().as_bytes());
    u64::from_be_bytes(digest.0[..8].try_into().unwrap_or([0u8; 8]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let doc = b"Senior Rust Engineer - Distributed Systems";
        assert_eq!(simhash64(doc), simhash64(doc));
    }

    #[test]
    fn test_empty_document_is_zero() {
        assert_eq!(simhash64(b""), 0);
        assert_eq!(simhash64(b"  ,;  "), 0);
    }

    #[test]
    fn test_case_and_punctuation_invariant() {
        assert_eq!(
            simhash64(b"Hello, World!"),
            simhash64(b"hello world"),
        );
    }

    #[test]
    fn test_token_order_invariant() {
        // Bag-of-words accumulation: reordering tokens cannot change
        // the fingerprint.
        assert_eq!(
            simhash64(b"remote friendly rust team"),
            simhash64(b"team rust friendly remote"),
        );
    }

    #[test]
    fn test_single_token_fingerprint_is_its_feature() {
        // With one token every slot takes the sign of that token's
        // feature bit, so the fingerprint is the feature itself.
        assert_eq!(simhash64(b"engineer"), token_feature("engineer"));
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0b1011, 0b0010), 2);
        assert_eq!(hamming_distance(u64::MAX, 0), 64);
    }

    #[test]
    fn test_identical_documents_are_near_duplicates() {
        let a = simhash64(b"We are hiring a compiler engineer in Berlin");
        assert!(is_near_duplicate(a, a));
        assert_eq!(hamming_distance(a, a), 0);
    }

    #[test]
    fn test_threshold_boundary() {
        let a = 0u64;
        assert!(is_near_duplicate(a, 0b111));
        assert!(!is_near_duplicate(a, 0b1111));
    }
}
