//! `Message`: one coalesced diagnostic and the ranks that produced it.
//!
//! A message starts life on the rank that logged it, with that rank as its
//! single contributor. Whenever two equivalent messages meet (locally or after
//! travelling up the communicator tree) one is fused into the other: the ranks
//! list grows until it reaches the aggregator's `ranks_limit`, while
//! `rank_count` keeps counting every contributing event.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::debug_invariants::{DebugInvariants, require};
use crate::lumberjack_error::LumberjackError;

/// Message severity. Lower ordinal means more severe.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Level {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    /// Number of severity levels.
    pub const COUNT: usize = 4;

    /// All levels, most severe first.
    pub const ALL: [Level; Level::COUNT] = [Level::Error, Level::Warning, Level::Info, Level::Debug];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`Level::index`]; `None` for out-of-range values.
    pub fn from_index(raw: u32) -> Option<Level> {
        Level::ALL.get(raw as usize).copied()
    }

    /// Upper-case name used by the output formats.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of severity levels packed into one byte.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct LevelMask(u8);

impl LevelMask {
    pub const NONE: LevelMask = LevelMask(0);
    pub const ALL: LevelMask = LevelMask((1 << Level::COUNT) - 1);

    #[inline]
    pub const fn only(level: Level) -> Self {
        LevelMask(1 << level as u8)
    }

    #[inline]
    pub fn contains(self, level: Level) -> bool {
        self.0 & (1 << level as u8) != 0
    }

    #[inline]
    pub fn insert(&mut self, level: Level) {
        self.0 |= 1 << level as u8;
    }

    #[inline]
    pub fn remove(&mut self, level: Level) {
        self.0 &= !(1 << level as u8);
    }

    /// Set or clear `level` depending on `enabled`.
    pub fn set(&mut self, level: Level, enabled: bool) {
        if enabled {
            self.insert(level)
        } else {
            self.remove(level)
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Levels in the mask, most severe first.
    pub fn iter(self) -> impl Iterator<Item = Level> {
        Level::ALL.into_iter().filter(move |&l| self.contains(l))
    }
}

impl std::ops::BitOr for LevelMask {
    type Output = LevelMask;
    fn bitor(self, rhs: LevelMask) -> LevelMask {
        LevelMask(self.0 | rhs.0)
    }
}

impl From<Level> for LevelMask {
    fn from(level: Level) -> Self {
        LevelMask::only(level)
    }
}

impl FromIterator<Level> for LevelMask {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        let mut mask = LevelMask::NONE;
        for level in iter {
            mask.insert(level);
        }
        mask
    }
}

impl fmt::Debug for LevelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// A diagnostic message plus the ranks that contributed to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    text: String,
    ranks: Vec<usize>,
    rank_count: usize,
    file_name: String,
    line_number: u32,
    level: Level,
    tag: String,
}

impl Message {
    /// Create a message logged once by `rank`.
    pub fn new(
        text: impl Into<String>,
        file_name: impl Into<String>,
        line_number: u32,
        level: Level,
        tag: impl Into<String>,
        rank: usize,
    ) -> Self {
        Message {
            text: text.into(),
            ranks: vec![rank],
            rank_count: 1,
            file_name: file_name.into(),
            line_number,
            level,
            tag: tag.into(),
        }
    }

    /// A bare `Debug` message with no origin and no tag.
    pub fn from_text(text: impl Into<String>, rank: usize) -> Self {
        Message::new(text, "", 0, Level::Debug, "", rank)
    }

    /// Rebuild a message from decoded wire fields.
    pub(crate) fn from_parts(
        text: String,
        tag: String,
        file_name: String,
        line_number: u32,
        level: Level,
        rank_count: usize,
        ranks: Vec<usize>,
    ) -> Self {
        Message {
            text,
            ranks,
            rank_count,
            file_name,
            line_number,
            level,
            tag,
        }
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Ranks individually tracked for this message, in the order first seen.
    #[inline]
    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    /// Total number of events folded into this message.
    #[inline]
    pub fn rank_count(&self) -> usize {
        self.rank_count
    }

    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[inline]
    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    #[inline]
    pub fn level(&self) -> Level {
        self.level
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Record one more occurrence from `rank`.
    ///
    /// `rank` is stored only if it is new and fewer than `ranks_limit` ranks
    /// are tracked; `rank_count` is incremented regardless (saturating).
    pub fn add_rank(&mut self, rank: usize, ranks_limit: usize) {
        self.track(rank, ranks_limit);
        self.rank_count = self.rank_count.saturating_add(1);
    }

    /// Fold in the ranks of another message that stood for `count` events.
    pub fn add_ranks(&mut self, ranks: &[usize], count: usize, ranks_limit: usize) {
        for &rank in ranks {
            self.track(rank, ranks_limit);
        }
        self.rank_count = self.rank_count.saturating_add(count);
    }

    fn track(&mut self, rank: usize, ranks_limit: usize) {
        if self.ranks.len() < ranks_limit && !self.ranks.contains(&rank) {
            self.ranks.push(rank);
        }
    }

    /// Forget tracked ranks beyond the first `ranks_limit` (always keeps one).
    pub(crate) fn truncate_ranks(&mut self, ranks_limit: usize) {
        self.ranks.truncate(ranks_limit.max(1));
    }

    /// Tracked ranks joined by `delimiter`, e.g. `"0,3,7"`.
    pub fn stringify_ranks(&self, delimiter: &str) -> String {
        self.ranks.iter().join(delimiter)
    }
}

impl DebugInvariants for Message {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Message");
    }

    fn validate_invariants(&self) -> Result<(), LumberjackError> {
        require(!self.ranks.is_empty(), || {
            format!("message {:?} tracks no ranks", self.text)
        })?;
        require(self.rank_count >= self.ranks.len(), || {
            format!(
                "message {:?} counts {} events but tracks {} ranks",
                self.text,
                self.rank_count,
                self.ranks.len()
            )
        })?;
        require(self.ranks.iter().all_unique(), || {
            format!("message {:?} tracks a rank twice: {:?}", self.text, self.ranks)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_has_single_contributor() {
        let m = Message::new("boom", "solver.rs", 12, Level::Error, "solver", 3);
        assert_eq!(m.ranks(), &[3]);
        assert_eq!(m.rank_count(), 1);
        assert_eq!(m.file_name(), "solver.rs");
        assert_eq!(m.line_number(), 12);
        assert_eq!(m.level(), Level::Error);
        assert_eq!(m.tag(), "solver");
        assert!(m.validate_invariants().is_ok());
    }

    #[test]
    fn add_rank_respects_limit_but_always_counts() {
        let mut m = Message::from_text("x", 0);
        m.add_rank(1, 2);
        m.add_rank(2, 2);
        m.add_rank(3, 2);
        assert_eq!(m.ranks(), &[0, 1]);
        assert_eq!(m.rank_count(), 4);
    }

    #[test]
    fn duplicate_rank_only_bumps_count() {
        let mut m = Message::from_text("x", 4);
        m.add_rank(4, 10);
        assert_eq!(m.ranks(), &[4]);
        assert_eq!(m.rank_count(), 2);
    }

    #[test]
    fn add_ranks_sums_counts() {
        let mut m = Message::from_text("x", 0);
        m.add_ranks(&[1, 0, 2], 7, 5);
        assert_eq!(m.ranks(), &[0, 1, 2]);
        assert_eq!(m.rank_count(), 8);
    }

    #[test]
    fn counts_saturate_instead_of_overflowing() {
        let mut m = Message::from_text("x", 0);
        m.add_ranks(&[1], usize::MAX, 5);
        assert_eq!(m.rank_count(), usize::MAX);
        m.add_rank(2, 5);
        assert_eq!(m.rank_count(), usize::MAX);
        assert_eq!(m.ranks(), &[0, 1, 2]);
        assert!(m.validate_invariants().is_ok());
    }

    #[test]
    fn stringify_ranks_joins() {
        let mut m = Message::from_text("x", 5);
        m.add_rank(9, 3);
        assert_eq!(m.stringify_ranks(","), "5,9");
        assert_eq!(m.stringify_ranks(" | "), "5 | 9");
    }

    #[test]
    fn level_mask_basics() {
        let mut mask = LevelMask::only(Level::Error) | Level::Warning.into();
        assert!(mask.contains(Level::Error));
        assert!(mask.contains(Level::Warning));
        assert!(!mask.contains(Level::Debug));
        mask.set(Level::Error, false);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![Level::Warning]);
        assert_eq!(LevelMask::ALL.iter().count(), Level::COUNT);
        assert!(LevelMask::NONE.is_empty());
    }

    #[test]
    fn level_ordering_and_index() {
        assert!(Level::Error < Level::Debug);
        assert_eq!(Level::from_index(2), Some(Level::Info));
        assert_eq!(Level::from_index(4), None);
        assert_eq!(Level::Warning.to_string(), "WARNING");
    }

    #[test]
    fn broken_invariants_are_reported() {
        let m = Message::from_parts(
            "t".into(),
            String::new(),
            String::new(),
            0,
            Level::Info,
            1,
            vec![0, 1],
        );
        assert!(matches!(
            m.validate_invariants(),
            Err(LumberjackError::InvariantViolation(_))
        ));
    }
}
