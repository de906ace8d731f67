//! Turn history and round bookkeeping for one conversation.

use crate::Turn;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("number of rounds must be at least 1, got {0}")]
    InvalidRounds(u32),
    #[error("session finished after {0} rounds")]
    Finished(u32),
    #[error("round {0} is already in progress")]
    RoundInProgress(u32),
    #[error("no round in progress")]
    NoOpenRound,
}

/// Ordered turn history over a fixed system + exemplar prefix.
///
/// With `prompt_append` every committed exchange is kept and sent again next
/// round; without it each request is the prefix plus the current user turn.
/// The prefix itself is never modified.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    base: Vec<Turn>,
    appended: Vec<Turn>,
    pending: Option<Turn>,
    rounds: u32,
    round: u32,
    prompt_append: bool,
}

impl ConversationSession {
    pub fn new(base: Vec<Turn>, rounds: u32, prompt_append: bool) -> Result<Self, SessionError> {
        if rounds < 1 {
            return Err(SessionError::InvalidRounds(rounds));
        }
        Ok(Self {
            base,
            appended: Vec::new(),
            pending: None,
            rounds,
            round: 0,
            prompt_append,
        })
    }

    /// Open the next round with a user turn. The round counts as used from here on.
    pub fn begin_round(
        &mut self,
        instruction: &str,
        image_ref: &str,
    ) -> Result<Turn, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::RoundInProgress(self.round));
        }
        if self.is_finished() {
            return Err(SessionError::Finished(self.rounds));
        }
        self.round += 1;
        let turn = Turn::user(image_ref, instruction);
        self.pending = Some(turn.clone());
        debug!(round = self.round, "round opened");
        Ok(turn)
    }

    /// Commit the open round with the assistant's reply.
    pub fn append_reply(&mut self, reply: Turn) -> Result<(), SessionError> {
        let user = self.pending.take().ok_or(SessionError::NoOpenRound)?;
        if self.prompt_append {
            self.appended.push(user);
            self.appended.push(reply);
        }
        Ok(())
    }

    /// Drop the open round's user turn; history is left as it was.
    pub fn discard_round(&mut self) {
        if self.pending.take().is_some() {
            debug!(round = self.round, "round discarded");
        }
    }

    /// Consume a round that never produced a user turn.
    pub fn skip_round(&mut self) -> Result<u32, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::RoundInProgress(self.round));
        }
        if self.is_finished() {
            return Err(SessionError::Finished(self.rounds));
        }
        self.round += 1;
        Ok(self.round)
    }

    /// Turns to send for the open round: history plus the pending user turn.
    pub fn request_turns(&self) -> Vec<Turn> {
        self.history()
            .chain(self.pending.iter())
            .cloned()
            .collect()
    }

    /// Committed turns, prefix first.
    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.base.iter().chain(self.appended.iter())
    }

    pub fn base(&self) -> &[Turn] {
        &self.base
    }

    /// 1-based index of the latest round opened; 0 before the first.
    pub fn round_index(&self) -> u32 {
        self.round
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn prompt_append(&self) -> bool {
        self.prompt_append
    }

    pub fn in_round(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.round >= self.rounds && self.pending.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<Turn> {
        vec![Turn::system("sys"), Turn::user("ex.png", "hi"), Turn::assistant("{}")]
    }

    #[test]
    fn zero_rounds_rejected() {
        assert_eq!(
            ConversationSession::new(base(), 0, false).unwrap_err(),
            SessionError::InvalidRounds(0)
        );
    }

    #[test]
    fn without_append_every_request_is_prefix_plus_user() {
        let mut s = ConversationSession::new(base(), 3, false).unwrap();
        for i in 1..=3 {
            s.begin_round(&format!("q{i}"), "live.png").unwrap();
            let turns = s.request_turns();
            assert_eq!(turns.len(), 4);
            assert_eq!(&turns[..3], s.base());
            assert_eq!(turns[3].text(), format!("q{i}"));
            s.append_reply(Turn::assistant("a")).unwrap();
            assert_eq!(s.round_index(), i);
        }
        assert!(s.is_finished());
        assert_eq!(s.begin_round("q4", "live.png"), Err(SessionError::Finished(3)));
    }

    #[test]
    fn append_mode_grows_history() {
        let mut s = ConversationSession::new(base(), 2, true).unwrap();
        s.begin_round("first", "a.png").unwrap();
        s.append_reply(Turn::assistant("r1")).unwrap();
        s.begin_round("second", "b.png").unwrap();
        let turns = s.request_turns();
        assert_eq!(turns.len(), 6);
        assert_eq!(turns[3].text(), "first");
        assert_eq!(turns[4].text(), "r1");
        assert_eq!(turns[5].text(), "second");
        assert_eq!(s.base(), base().as_slice());
    }

    #[test]
    fn discarded_round_leaves_history_but_uses_round() {
        let mut s = ConversationSession::new(base(), 2, true).unwrap();
        s.begin_round("lost", "a.png").unwrap();
        assert_eq!(
            s.begin_round("again", "a.png"),
            Err(SessionError::RoundInProgress(1))
        );
        s.discard_round();
        assert_eq!(s.history().count(), 3);
        assert_eq!(s.append_reply(Turn::assistant("x")), Err(SessionError::NoOpenRound));
        assert_eq!(s.skip_round(), Ok(2));
        assert!(s.is_finished());
    }
}
