//! Text normalization and similarity helpers shared by the alert filters.

use std::collections::HashSet;

use md5::{Digest, Md5};

/// Canonical form of a message for dedup purposes: lowercased, whitespace
/// collapsed, punctuation stripped, and each digit run masked to one `#`
/// so "room 5" and "room 47" compare equal.
pub fn normalize_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut last_was_space = true;
    let mut last_was_digit = false;

    for c in message.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            last_was_digit = false;
        } else if c.is_ascii_digit() {
            if !last_was_digit {
                out.push('#');
            }
            last_was_space = false;
            last_was_digit = true;
        } else if c.is_ascii_punctuation() {
            // "buy now" and "buy now!!!" are the same message.
            last_was_digit = false;
        } else {
            for lc in c.to_lowercase() {
                out.push(lc);
            }
            last_was_space = false;
            last_was_digit = false;
        }
    }

    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Identity hash of a message within a user's context.
pub fn content_hash(username: &str, normalized_message: &str) -> String {
    let digest = Md5::digest(format!("{username}:{normalized_message}").as_bytes());
    hex::encode(digest)
}

fn token_set(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

/// Jaccard similarity over whitespace tokens, in [0, 1].
///
/// Inputs are expected to be normalized already; two empty texts count as
/// identical.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}
