use crate::state::Turn;

/// Ordered, append-only record of one session's turns.
///
/// Turns can only be added, never removed or edited.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Every turn, oldest first
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    /// Every turn except the most recent `n`; empty if `n` covers the whole transcript
    pub fn all_except_last(&self, n: usize) -> &[Turn] {
        &self.turns[..self.turns.len().saturating_sub(n)]
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Role;

    fn sample() -> Transcript {
        let mut transcript = Transcript::new();
        transcript.append(Turn::user("first"));
        transcript.append(Turn::assistant("one"));
        transcript.append(Turn::user("second"));
        transcript.append(Turn::assistant("two"));
        transcript
    }

    #[test]
    fn append_preserves_order() {
        let transcript = sample();
        let messages: Vec<&str> = transcript.all().iter().map(|t| t.message()).collect();
        assert_eq!(messages, vec!["first", "one", "second", "two"]);
        assert_eq!(transcript.last().map(|t| t.role()), Some(Role::Assistant));
    }

    #[test]
    fn rereading_is_idempotent() {
        let transcript = sample();
        let first = transcript.all().to_vec();
        let second = transcript.all().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn all_except_last_omits_recent_turns() {
        let transcript = sample();
        let earlier = transcript.all_except_last(2);
        assert_eq!(earlier.len(), 2);
        assert_eq!(earlier[1].message(), "one");

        assert!(transcript.all_except_last(4).is_empty());
        assert!(transcript.all_except_last(10).is_empty());
        assert_eq!(transcript.all_except_last(0).len(), 4);
    }

    #[test]
    fn empty_transcript() {
        let transcript = Transcript::new();
        assert!(transcript.is_empty());
        assert!(transcript.last().is_none());
        assert!(transcript.all_except_last(2).is_empty());
    }
}
