//! Echo and duplicate transcript suppression
//!
//! Audio-level echo cancellation is not available on every platform, so the
//! assistant's own speech leaking into the microphone is detected lexically:
//! the core knows exactly what it last said.

/// Minimum normalized reply length for full-echo rejection (exclusive)
const FULL_ECHO_MIN_LEN: usize = 5;

/// Minimum normalized utterance length for fragment rejection (exclusive)
const FRAGMENT_MIN_LEN: usize = 8;

/// Why a transcript was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The utterance contains the whole last reply
    EchoFull,
    /// The utterance is a fragment of the last reply
    EchoFragment,
    /// The recognizer re-emitted the last committed utterance
    Duplicate,
}

/// Suppressor decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Treat as real user speech
    Accept,
    /// Discard
    Reject(RejectReason),
}

impl Verdict {
    /// Whether the transcript should be dispatched
    #[must_use]
    pub const fn is_accept(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Stateless echo/duplicate predicate
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoSuppressor;

impl EchoSuppressor {
    /// Decide whether `utterance` is genuine user input
    #[must_use]
    pub fn evaluate(utterance: &str, last_spoken_reply: &str, last_committed: &str) -> Verdict {
        let heard = normalize(utterance);
        let spoken = normalize(last_spoken_reply);

        if spoken.len() > FULL_ECHO_MIN_LEN && heard.contains(&spoken) {
            return Verdict::Reject(RejectReason::EchoFull);
        }

        if heard.len() > FRAGMENT_MIN_LEN && spoken.contains(&heard) {
            return Verdict::Reject(RejectReason::EchoFragment);
        }

        if utterance == last_committed {
            return Verdict::Reject(RejectReason::Duplicate);
        }

        Verdict::Accept
    }
}

/// Lowercase and keep only alphanumerics
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
