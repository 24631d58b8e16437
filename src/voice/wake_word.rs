//! Wake word and exit keyword matching
//!
//! Plain case-insensitive substring containment against a static phrase list.
//! No fuzzy matching: a missed phrase just has to be repeated.

/// A set of trigger phrases matched against recognized text
#[derive(Debug, Clone, Default)]
pub struct PhraseSet {
    phrases: Vec<String>,
}

impl PhraseSet {
    /// Build a phrase set, normalizing to trimmed lowercase
    ///
    /// Blank phrases are dropped since they would match every transcript.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases: Vec<String> = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        tracing::debug!(phrases = ?phrases, "phrase set initialized");

        Self { phrases }
    }

    /// Return the first phrase contained in `transcript`, if any
    #[must_use]
    pub fn find_in(&self, transcript: &str) -> Option<&str> {
        let normalized = transcript.to_lowercase();

        self.phrases
            .iter()
            .find(|phrase| normalized.contains(phrase.as_str()))
            .map(String::as_str)
    }

    /// Check if `transcript` contains any phrase
    #[must_use]
    pub fn matches(&self, transcript: &str) -> bool {
        self.find_in(transcript).is_some()
    }

    /// Get the normalized phrases
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}
