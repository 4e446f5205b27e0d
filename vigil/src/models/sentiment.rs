//! Lexicon-based sentiment scoring.

use std::collections::HashMap;

use super::SentimentScorer;

/// Valence entries for the built-in lexicon, roughly on a [-4, 4] scale.
const LEXICON: &[(&str, f64)] = &[
    ("abuse", -3.2),
    ("afraid", -2.0),
    ("angry", -2.3),
    ("attack", -2.1),
    ("awful", -2.0),
    ("bad", -2.5),
    ("blood", -1.6),
    ("creep", -1.9),
    ("danger", -2.4),
    ("dangerous", -2.4),
    ("die", -2.9),
    ("disgusting", -2.4),
    ("fight", -1.6),
    ("force", -1.4),
    ("gross", -1.6),
    ("gun", -2.2),
    ("harass", -2.6),
    ("hate", -2.7),
    ("hurt", -2.4),
    ("kill", -3.7),
    ("knife", -1.9),
    ("scared", -2.2),
    ("scary", -2.2),
    ("stop", -0.8),
    ("threat", -2.4),
    ("threaten", -2.6),
    ("uncomfortable", -1.5),
    ("violence", -3.1),
    ("weapon", -2.0),
    ("worst", -2.6),
    ("amazing", 2.8),
    ("beautiful", 2.9),
    ("fun", 2.3),
    ("good", 1.9),
    ("great", 3.1),
    ("happy", 2.7),
    ("love", 3.2),
    ("nice", 1.8),
    ("sweet", 2.0),
    ("wonderful", 2.7),
];

/// Negations flip the valence of the word that follows.
const NEGATIONS: &[&str] = &["not", "no", "never", "dont", "don't", "cant", "can't"];

/// Sentiment scorer backed by a fixed valence lexicon.
///
/// Scores each token against the lexicon, flips valence after a negation,
/// and normalizes the sum into [-1, 1]. Crude next to a trained model, but
/// deterministic and dependency-free; swap in a real scorer through the
/// [`SentimentScorer`] seam when one is available.
pub struct LexiconSentiment {
    valences: HashMap<&'static str, f64>,
}

impl LexiconSentiment {
    pub fn new() -> Self {
        Self {
            valences: LEXICON.iter().copied().collect(),
        }
    }
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for LexiconSentiment {
    fn score(&self, text: &str) -> f64 {
        let mut sum = 0.0;
        let mut negated = false;

        for raw in text.split_whitespace() {
            let token: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '\'')
                .collect::<String>()
                .to_lowercase();
            if token.is_empty() {
                continue;
            }

            if NEGATIONS.contains(&token.as_str()) {
                negated = true;
                continue;
            }

            if let Some(&valence) = self.valences.get(token.as_str()) {
                sum += if negated { -valence } else { valence };
            }
            negated = false;
        }

        // Same squashing shape as compound scores: bounded, saturating.
        sum / (sum * sum + 15.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_text_scores_below_zero() {
        let scorer = LexiconSentiment::new();
        assert!(scorer.score("I hate this, it's the worst") < -0.5);
    }

    #[test]
    fn test_positive_text_scores_above_zero() {
        let scorer = LexiconSentiment::new();
        assert!(scorer.score("this is great, I love it") > 0.5);
    }

    #[test]
    fn test_neutral_text_scores_near_zero() {
        let scorer = LexiconSentiment::new();
        assert_eq!(scorer.score("the stream started at noon"), 0.0);
    }

    #[test]
    fn test_negation_flips_valence() {
        let scorer = LexiconSentiment::new();
        let plain = scorer.score("this is good");
        let negated = scorer.score("this is not good");
        assert!(plain > 0.0);
        assert!(negated < 0.0);
    }

    #[test]
    fn test_score_is_bounded() {
        let scorer = LexiconSentiment::new();
        let score = scorer.score("kill kill kill kill kill kill kill kill");
        assert!((-1.0..=1.0).contains(&score));
    }
}
