//! Keyword mood meter for the latest user message
//!
//! A coarse 0-10 distress score shown next to each reply. It never changes
//! how a turn is routed; crisis handling stays with [`crate::gate`].

/// Sadness, fear and exhaustion words
const DISTRESS_WORDS: &[&str] = &[
    "sedih", "takut", "cemas", "bingung", "sakit", "capek", "lelah", "mati",
];

/// Anger words
const ANGER_WORDS: &[&str] = &["marah", "kesal", "benci", "sebal"];

/// Relief and gratitude words
const CALM_WORDS: &[&str] = &["senang", "bahagia", "tenang", "lega", "makasih", "baik"];

/// Band of a mood score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodZone {
    /// Score 8 and above
    NeedsAttention,
    /// Score 4 to 7
    Neutral,
    /// Score 3 and below
    Stable,
}

impl MoodZone {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NeedsAttention => "Perlu Perhatian",
            Self::Neutral => "Netral / Sedang",
            Self::Stable => "Stabil / Positif",
        }
    }
}

/// Mood reading of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mood {
    /// 0 (calm) to 10 (distressed)
    pub score: u8,
}

impl Mood {
    /// Reading used before the user has said anything
    pub const NEUTRAL: Self = Self { score: 5 };

    /// Score a user message; the first matching word group wins
    #[must_use]
    pub fn assess(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

        let score = if mentions(DISTRESS_WORDS) {
            8
        } else if mentions(ANGER_WORDS) {
            7
        } else if mentions(CALM_WORDS) {
            2
        } else {
            5
        };
        Self { score }
    }

    #[must_use]
    pub const fn zone(self) -> MoodZone {
        match self.score {
            8.. => MoodZone::NeedsAttention,
            0..=3 => MoodZone::Stable,
            _ => MoodZone::Neutral,
        }
    }
}

impl Default for Mood {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_groups_in_priority_order() {
        assert_eq!(Mood::assess("Aku CEMAS banget").score, 8);
        assert_eq!(Mood::assess("aku kesal sama dia").score, 7);
        assert_eq!(Mood::assess("sekarang lebih lega").score, 2);
        assert_eq!(Mood::assess("hari ini rapat").score, 5);
        // Distress outranks anger and calm
        assert_eq!(Mood::assess("aku marah tapi juga sedih").score, 8);
    }

    #[test]
    fn test_zones() {
        assert_eq!(Mood::assess("takut").zone(), MoodZone::NeedsAttention);
        assert_eq!(Mood::assess("benci").zone(), MoodZone::Neutral);
        assert_eq!(Mood::assess("makasih ya").zone(), MoodZone::Stable);
        assert_eq!(Mood::default().zone(), MoodZone::Neutral);
        assert_eq!(MoodZone::Stable.label(), "Stabil / Positif");
    }
}
