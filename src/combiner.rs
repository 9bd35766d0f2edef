//! Combiner trait: rules for deciding when two messages are the same and how
//! to fuse them.

use crate::message::Message;

/// *Combiner* encapsulates equivalence and fusion for [`Message`]s.
///
/// `should_merge` must be reflexive and symmetric. `merge` must be
/// commutative and associative up to the order of the tracked ranks.
pub trait Combiner: Send + Sync {
    /// Unique identifier; the aggregator rejects a second combiner with the
    /// same id.
    fn id(&self) -> &str;

    /// Whether `a` and `b` describe the same diagnostic.
    fn should_merge(&self, a: &Message, b: &Message) -> bool;

    /// Fold `src` into `dst`, tracking at most `ranks_limit` ranks.
    fn merge(&self, dst: &mut Message, src: &Message, ranks_limit: usize);

    /// A key such that `should_merge(a, b)` iff both keys are equal.
    ///
    /// Combiners that are a pure equivalence on one string can return it here
    /// and the aggregator will group by key instead of comparing every pair.
    fn merge_key<'m>(&self, _message: &'m Message) -> Option<&'m str> {
        None
    }
}

/// Identifier of [`TextEqualityCombiner`].
pub const TEXT_EQUALITY_COMBINER_ID: &str = "TextEqualityCombiner";

/// Default combiner: messages with identical text are the same message.
#[derive(Copy, Clone, Debug, Default)]
pub struct TextEqualityCombiner;

impl Combiner for TextEqualityCombiner {
    fn id(&self) -> &str {
        TEXT_EQUALITY_COMBINER_ID
    }

    #[inline]
    fn should_merge(&self, a: &Message, b: &Message) -> bool {
        a.text() == b.text()
    }

    #[inline]
    fn merge(&self, dst: &mut Message, src: &Message, ranks_limit: usize) {
        dst.add_ranks(src.ranks(), src.rank_count(), ranks_limit);
    }

    fn merge_key<'m>(&self, message: &'m Message) -> Option<&'m str> {
        Some(message.text())
    }
}
