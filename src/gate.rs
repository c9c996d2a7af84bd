//! Pre-retrieval turn classification
//!
//! Every transcript passes through [`TurnGate::classify`] before any
//! retrieval or generation. Checks run in a fixed order (stop intent,
//! filler, safety) and the first match wins, so "stop" ends the session
//! even though it is also short enough to look like filler.

use std::sync::LazyLock;

use regex::Regex;

/// Whole-utterance stop phrases (1 to 3 tokens)
const STOP_PHRASES_EXACT: &[&str] = &[
    "sudah",
    "udah",
    "cukup",
    "stop",
    "berhenti",
    "selesai",
    "done",
    "makas",
    "terima kasih",
    "thanks",
    "itu aja",
    "segitu aja",
    "sampai sini",
];

/// Stop phrases matched anywhere in the utterance
const STOP_PHRASES_CONTAINS: &[&str] = &[
    "udah dulu",
    "sudah dulu",
    "cukup dulu",
    "stop dulu",
    "selesai dulu",
    "kita stop",
    "kita selesai",
    "aku selesai",
    "aku udahan",
];

/// Words that carry no content on their own
const FILLER_WORDS: &[&str] = &[
    "mm", "mmm", "mmmm", "hmm", "hmmm", "eh", "euh", "uh", "uhh", "hah", "oh", "aha", "anu",
    "eee", "em", "emm", "ya", "yah", "iya", "oke", "ok",
];

/// Murmur fragments for very short compacted utterances
const FILLER_FRAGMENTS: &[&str] = &["mm", "mmm", "hmm", "eh", "uh", "hah", "oh", "aha", "em"];

/// Longest compacted utterance still checked for murmur fragments
const FILLER_MAX_COMPACT_CHARS: usize = 6;

/// Self-harm and suicide indicators (Indonesian and English)
const HIGH_RISK_PHRASES: &[&str] = &[
    "bunuh diri",
    "suicide",
    "kill myself",
    "end my life",
    "self harm",
    "self-harm",
    "melukai diri",
    "mengakhiri hidup",
    "pengen mati",
    "ingin mati",
];

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("valid regex"));

/// Reply when the user ends the session
pub const STOP_REPLY: &str = "Oke, kita berhenti dulu ya. Terima kasih sudah cerita, jaga diri baik-baik. \
     Kalau kapan-kapan kamu mau lanjut, aku siap dengerin. Sampai ketemu lagi.";

/// Reply to murmurs and pauses
pub const FILLER_REPLY: &str = "Aku denger kok. Nggak apa-apa kalau kamu lagi mikir atau jeda sebentar. \
     Lanjutkan aja pelan-pelan, aku dengerin.";

/// Crisis referral reply
pub const SAFETY_REPLY: &str = "Terima kasih sudah berani cerita. Aku ikut prihatin kamu sedang ngerasain ini. \
     Karena ini menyangkut keselamatan, aku nggak bisa menangani ini sendirian. \
     Tolong hubungi orang terdekat yang kamu percaya sekarang (keluarga/teman), \
     atau layanan darurat setempat / tenaga profesional kesehatan mental. \
     Kalau kamu berada dalam bahaya segera, cari bantuan darurat secepatnya. \
     Kalau kamu mau, kamu bisa bilang: kamu sekarang sendirian atau ada orang di dekatmu?";

/// Classification of one transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// User wants to end the session
    Stop,
    /// Murmur or pause without content
    Filler,
    /// High-risk content requiring a crisis referral
    Unsafe,
    /// Proceed to retrieval and generation
    Normal,
}

/// What the conversation loop does after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnAction {
    /// Retrieve, generate and reply
    Respond,
    /// Reply with the fixed message and wait for the next input
    Reprompt,
    /// Reply with the fixed message and end the session
    End,
}

impl TurnKind {
    /// Fixed reply for gated turns, `None` for normal turns
    #[must_use]
    pub const fn reply(self) -> Option<&'static str> {
        match self {
            Self::Stop => Some(STOP_REPLY),
            Self::Filler => Some(FILLER_REPLY),
            Self::Unsafe => Some(SAFETY_REPLY),
            Self::Normal => None,
        }
    }

    #[must_use]
    pub const fn action(self) -> TurnAction {
        match self {
            Self::Stop => TurnAction::End,
            Self::Filler | Self::Unsafe => TurnAction::Reprompt,
            Self::Normal => TurnAction::Respond,
        }
    }
}

/// Routes transcripts to stop, filler, safety or normal handling
#[derive(Debug, Clone, Copy)]
pub struct TurnGate {
    safety_enabled: bool,
}

impl Default for TurnGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TurnGate {
    #[must_use]
    pub const fn new(safety_enabled: bool) -> Self {
        Self { safety_enabled }
    }

    #[must_use]
    pub const fn safety_enabled(&self) -> bool {
        self.safety_enabled
    }

    /// Classify a raw transcript
    #[must_use]
    pub fn classify(&self, text: &str) -> TurnKind {
        let kind = if is_stop_intent(text) {
            TurnKind::Stop
        } else if is_mostly_filler(text) {
            TurnKind::Filler
        } else if self.safety_enabled && is_high_risk(text) {
            TurnKind::Unsafe
        } else {
            TurnKind::Normal
        };

        tracing::debug!(?kind, "turn classified");
        kind
    }
}

/// Whether the user is asking to end the session
///
/// Short utterances must match a stop phrase exactly, so "sudah" inside a
/// longer sentence does not end the session. Longer phrases such as
/// "udah dulu" match anywhere.
#[must_use]
pub fn is_stop_intent(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let normalized = PUNCTUATION.replace_all(lowered.trim(), "");
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if tokens.is_empty() {
        return false;
    }

    if tokens.len() <= 3 && STOP_PHRASES_EXACT.contains(&tokens.join(" ").as_str()) {
        return true;
    }

    STOP_PHRASES_CONTAINS
        .iter()
        .any(|phrase| normalized.contains(phrase))
}

/// Whether the transcript is only murmurs or pauses
#[must_use]
pub fn is_mostly_filler(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let lowered = lowered.trim();
    if lowered.is_empty() {
        return true;
    }

    let stripped = NON_ALPHANUMERIC.replace_all(lowered, " ");
    let tokens: Vec<&str> = stripped.split_whitespace().collect();
    if tokens.is_empty() {
        return true;
    }

    if tokens.len() <= 2 && tokens.iter().all(|t| FILLER_WORDS.contains(t)) {
        return true;
    }

    // Drawn-out murmurs like "mmmm" or "ehh"
    let compact: String = lowered.chars().filter(|c| !c.is_whitespace()).collect();
    compact.chars().count() <= FILLER_MAX_COMPACT_CHARS
        && compact.chars().any(char::is_alphabetic)
        && FILLER_FRAGMENTS.iter().any(|f| compact.contains(f))
}

/// Whether the transcript contains a high-risk phrase
#[must_use]
pub fn is_high_risk(text: &str) -> bool {
    let lowered = text.to_lowercase();
    HIGH_RISK_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_exact_short_phrases() {
        assert!(is_stop_intent("stop"));
        assert!(is_stop_intent("Sudah."));
        assert!(is_stop_intent("  Terima kasih!  "));
        assert!(is_stop_intent("terima   kasih"));
        assert!(!is_stop_intent(""));
        assert!(!is_stop_intent("?!"));
    }

    #[test]
    fn test_stop_not_triggered_inside_sentence() {
        assert!(!is_stop_intent("aku sudah makan tadi pagi"));
        assert!(!is_stop_intent("jangan stop aku dong"));
    }

    #[test]
    fn test_stop_contains_phrases() {
        assert!(is_stop_intent("oke deh, udah dulu ya kak"));
        assert!(is_stop_intent("Kayaknya kita selesai di sini."));
    }

    #[test]
    fn test_filler_detection() {
        assert!(is_mostly_filler("mm"));
        assert!(is_mostly_filler("Hmm... oke"));
        assert!(is_mostly_filler("ehh"));
        assert!(is_mostly_filler("   "));
        assert!(is_mostly_filler("..."));
        assert!(!is_mostly_filler("mm ok tapi aku sedih banget hari ini"));
        assert!(!is_mostly_filler("aku capek"));
    }

    #[test]
    fn test_high_risk_case_insensitive() {
        assert!(is_high_risk("kadang aku kepikiran BUNUH DIRI"));
        assert!(is_high_risk("I want to end my life"));
        assert!(!is_high_risk("aku cuma capek kerja"));
    }

    #[test]
    fn test_gate_order_stop_before_filler() {
        let gate = TurnGate::default();
        assert_eq!(gate.classify("stop"), TurnKind::Stop);
        assert_eq!(gate.classify("Stop!"), TurnKind::Stop);
        assert_eq!(gate.classify("mm"), TurnKind::Filler);
    }

    #[test]
    fn test_gate_safety_toggle() {
        let text = "aku pengen bunuh diri rasanya";
        assert_eq!(TurnGate::new(true).classify(text), TurnKind::Unsafe);
        assert_eq!(TurnGate::new(false).classify(text), TurnKind::Normal);
    }

    #[test]
    fn test_kind_actions_and_replies() {
        assert_eq!(TurnKind::Stop.action(), TurnAction::End);
        assert_eq!(TurnKind::Filler.action(), TurnAction::Reprompt);
        assert_eq!(TurnKind::Unsafe.action(), TurnAction::Reprompt);
        assert_eq!(TurnKind::Normal.action(), TurnAction::Respond);
        assert_eq!(TurnKind::Unsafe.reply(), Some(SAFETY_REPLY));
        assert!(TurnKind::Normal.reply().is_none());
    }
}
