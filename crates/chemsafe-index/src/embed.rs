//! Deterministic text embeddings.
//!
//! Retrieval must be reproducible across machines and runs with no model
//! downloads, so the default embedder is a token-hash scheme: FNV-1a over
//! each token picks a signed bucket in a fixed-dimension vector, then the
//! vector is L2-normalized. Similarity between two embeddings is a plain
//! dot product (cosine, since both sides are unit-length).
//!
//! The corpus is mostly Chinese, which has no whitespace word boundaries.
//! Tokenization therefore emits three streams: lowercased ASCII
//! alphanumeric runs, CJK unigrams, and CJK bigrams. Bigrams carry most of
//! the signal for Chinese text (they approximate words); unigrams keep
//! single-character queries from embedding to zero.

/// Vector dimension of the token-hash embedder.
pub const TOKEN_HASH_DIM: usize = 256;

/// Text-to-vector encoder. Implementations must be deterministic: equal
/// input text yields an identical vector, and `id()` changes whenever the
/// scheme does, so persisted collections can refuse mismatched queries.
pub trait Embedder: Send + Sync {
    /// Stable identifier pinned into every collection built with this
    /// embedder.
    fn id(&self) -> &'static str;
    fn dim(&self) -> usize;
    /// Encode `text` into an L2-normalized vector of `dim()` elements.
    /// Text with no recognizable tokens encodes to the zero vector.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// The default deterministic embedder.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenHashEmbedder;

fn fnv1a64(s: &str) -> u64 {
    let mut h: u64 = 14695981039346656037;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(1099511628211);
    }
    h
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4e00}'..='\u{9fff}'        // CJK Unified Ideographs
        | '\u{3400}'..='\u{4dbf}'      // Extension A
        | '\u{f900}'..='\u{faff}'      // Compatibility Ideographs
    )
}

/// ASCII alphanumeric runs (lowercased) plus CJK unigrams and bigrams.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut ascii_run = String::new();
    let mut prev_cjk: Option<char> = None;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            ascii_run.push(c.to_ascii_lowercase());
            prev_cjk = None;
            continue;
        }
        if !ascii_run.is_empty() {
            tokens.push(std::mem::take(&mut ascii_run));
        }
        if is_cjk(c) {
            tokens.push(c.to_string());
            if let Some(p) = prev_cjk {
                tokens.push(format!("{p}{c}"));
            }
            prev_cjk = Some(c);
        } else {
            prev_cjk = None;
        }
    }
    if !ascii_run.is_empty() {
        tokens.push(ascii_run);
    }
    tokens
}

impl Embedder for TokenHashEmbedder {
    fn id(&self) -> &'static str {
        "token-hash-256-v1"
    }

    fn dim(&self) -> usize {
        TOKEN_HASH_DIM
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; TOKEN_HASH_DIM];
        for t in tokenize(text) {
            let h = fnv1a64(&t);
            let idx = (h % (TOKEN_HASH_DIM as u64)) as usize;
            let sign = if ((h >> 32) & 1) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let mut norm2 = 0.0f32;
        for x in &v {
            norm2 += x * x;
        }
        if norm2 > 0.0 {
            let inv = 1.0f32 / norm2.sqrt();
            for x in v.iter_mut() {
                *x *= inv;
            }
        }
        v
    }
}

/// Dot product of two equal-length vectors. On unit vectors this is the
/// cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut s = 0.0f32;
    for i in 0..a.len().min(b.len()) {
        s += a[i] * b[i];
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_mixed_ascii_and_cjk() {
        let tokens = tokenize("TNT属于硝基化合物");
        assert!(tokens.contains(&"tnt".to_string()));
        assert!(tokens.contains(&"硝".to_string()));
        assert!(tokens.contains(&"硝基".to_string()));
        assert!(tokens.contains(&"化合".to_string()));
    }

    #[test]
    fn punctuation_breaks_bigrams() {
        let tokens = tokenize("硝化，反应");
        assert!(tokens.contains(&"硝化".to_string()));
        assert!(!tokens.contains(&"化反".to_string()));
        assert!(tokens.contains(&"反应".to_string()));
    }

    #[test]
    fn embedding_is_deterministic_and_normalized() {
        let e = TokenHashEmbedder;
        let a = e.embed("硝化反应需要严格控温");
        let b = e.embed("硝化反应需要严格控温");
        assert_eq!(a, b);
        assert_eq!(a.len(), TOKEN_HASH_DIM);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero() {
        let e = TokenHashEmbedder;
        let v = e.embed("，。！");
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn shared_vocabulary_scores_higher_than_disjoint() {
        let e = TokenHashEmbedder;
        let q = e.embed("过氧化物的储存要求");
        let near = e.embed("过氧化物必须避光低温储存");
        let far = e.embed("色谱柱日常维护流程");
        assert!(dot(&q, &near) > dot(&q, &far));
    }
}
