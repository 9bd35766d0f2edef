//! The per-rank aggregator.
//!
//! A `Lumberjack` holds the messages logged on this rank, folds equivalent
//! ones together with its combiners, and pushes what it holds toward the
//! output node through its [`Communicator`]. After
//! [`push_fully`](Lumberjack::push_fully) the output node holds one message per
//! equivalence class across the whole world and every other rank holds none.
//!
//! Misuse (no communicator, duplicate combiner ids) and corrupt packs are
//! reported through the `log` facade and otherwise ignored. Only substrate
//! failures are returned, and they leave the local messages untouched.

use hashbrown::HashMap;

use crate::combiner::{Combiner, TextEqualityCombiner};
use crate::communicator::Communicator;
use crate::debug_invariants::{DebugInvariants, require};
use crate::lumberjack_error::LumberjackError;
use crate::message::{Level, Message};
use crate::wire;

/// Ranks tracked per message unless configured otherwise.
pub const DEFAULT_RANKS_LIMIT: usize = 5;

/// Tag of messages the aggregator logs about itself.
pub const INTERNAL_TAG: &str = "lumberjack";

pub struct Lumberjack {
    communicator: Option<Box<dyn Communicator>>,
    ranks_limit: usize,
    combiners: Vec<Box<dyn Combiner>>,
    messages: Vec<Message>,
}

impl Default for Lumberjack {
    /// An aggregator with the text-equality combiner and no communicator yet.
    fn default() -> Self {
        Lumberjack {
            communicator: None,
            ranks_limit: DEFAULT_RANKS_LIMIT,
            combiners: vec![Box::new(TextEqualityCombiner)],
            messages: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Lumberjack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lumberjack")
            .field("rank", &self.rank())
            .field("ranks_limit", &self.ranks_limit)
            .field("combiners", &self.combiner_ids().collect::<Vec<_>>())
            .field("messages", &self.messages.len())
            .finish()
    }
}

fn sanitize_limit(value: usize) -> usize {
    if value == 0 {
        log::warn!("ranks limit of 0 is not supported; tracking 1 rank per message");
        1
    } else {
        value
    }
}

impl Lumberjack {
    /// Aggregator bound to `communicator`, with the default combiner.
    pub fn new(communicator: Box<dyn Communicator>, ranks_limit: usize) -> Self {
        let mut lj = Lumberjack::default();
        lj.initialize(communicator, ranks_limit);
        lj
    }

    /// Bind the communicator and the rank limit.
    pub fn initialize(&mut self, mut communicator: Box<dyn Communicator>, ranks_limit: usize) {
        self.ranks_limit = sanitize_limit(ranks_limit);
        communicator.set_ranks_limit(self.ranks_limit);
        self.communicator = Some(communicator);
    }

    /// Drop all messages and combiners and finalize the communicator.
    pub fn finalize(&mut self) {
        self.messages.clear();
        self.combiners.clear();
        if let Some(mut communicator) = self.communicator.take() {
            communicator.finalize();
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.communicator.is_some()
    }

    /// Rank of this process, if a communicator is bound.
    pub fn rank(&self) -> Option<usize> {
        self.communicator.as_ref().map(|c| c.rank())
    }

    // ----- combiners -------------------------------------------------------

    /// Register `combiner`. Earlier combiners take precedence. Returns `false`
    /// (and registers nothing) if its id is already present.
    pub fn add_combiner(&mut self, combiner: Box<dyn Combiner>) -> bool {
        if self.has_combiner(combiner.id()) {
            log::warn!(
                "{}",
                LumberjackError::DuplicateCombiner(combiner.id().to_owned())
            );
            return false;
        }
        self.combiners.push(combiner);
        true
    }

    /// Remove the combiner registered under `id`.
    pub fn remove_combiner(&mut self, id: &str) -> bool {
        match self.combiners.iter().position(|c| c.id() == id) {
            Some(pos) => {
                self.combiners.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear_combiners(&mut self) {
        self.combiners.clear();
    }

    pub fn has_combiner(&self, id: &str) -> bool {
        self.combiners.iter().any(|c| c.id() == id)
    }

    /// Registered combiner ids in precedence order.
    pub fn combiner_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.combiners.iter().map(|c| c.id())
    }

    // ----- rank limit ------------------------------------------------------

    pub fn ranks_limit(&self) -> usize {
        self.ranks_limit
    }

    /// Change the rank limit here and on the communicator.
    pub fn set_ranks_limit(&mut self, value: usize) {
        self.ranks_limit = sanitize_limit(value);
        if let Some(c) = self.communicator.as_mut() {
            c.set_ranks_limit(self.ranks_limit);
        }
    }

    // ----- messages --------------------------------------------------------

    /// Messages currently held by this rank. Only the output node should emit
    /// them.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Queue a bare `Debug` message.
    pub fn enqueue(&mut self, text: impl Into<String>) {
        self.enqueue_message(text, "", 0, Level::Debug, "");
    }

    /// Queue a message logged on this rank.
    pub fn enqueue_message(
        &mut self,
        text: impl Into<String>,
        file_name: impl Into<String>,
        line_number: u32,
        level: Level,
        tag: impl Into<String>,
    ) {
        let Some(rank) = self.rank() else {
            log::warn!("{}; message dropped", LumberjackError::NoCommunicator);
            return;
        };
        self.messages
            .push(Message::new(text, file_name, line_number, level, tag, rank));
    }

    /// Fold every pair of equivalent messages until none are left.
    ///
    /// The first combiner (in registration order) that accepts a pair merges
    /// it. With a single key-based combiner (the default) messages are grouped
    /// by key in one pass; otherwise all pairs are compared repeatedly until a
    /// full pass merges nothing.
    pub fn combine_all(&mut self) {
        if self.messages.len() < 2 || self.combiners.is_empty() {
            return;
        }
        let keyed = match self.combiners.as_slice() {
            [only] => self.messages.iter().all(|m| only.merge_key(m).is_some()),
            _ => false,
        };
        if keyed {
            self.combine_by_key();
        } else {
            self.combine_pairwise();
        }
        self.debug_assert_invariants();
    }

    fn combine_by_key(&mut self) {
        let Lumberjack {
            combiners,
            messages,
            ranks_limit,
            ..
        } = self;
        let combiner = &combiners[0];
        let mut slots: HashMap<String, usize> = HashMap::with_capacity(messages.len());
        let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
        for message in std::mem::take(messages) {
            let key = combiner.merge_key(&message).unwrap_or_default();
            match slots.get(key) {
                Some(&slot) => combiner.merge(&mut merged[slot], &message, *ranks_limit),
                None => {
                    slots.insert(key.to_owned(), merged.len());
                    merged.push(message);
                }
            }
        }
        *messages = merged;
    }

    fn combine_pairwise(&mut self) {
        let Lumberjack {
            combiners,
            messages,
            ranks_limit,
            ..
        } = self;
        loop {
            let mut dirty = false;
            let mut i = 0;
            while i < messages.len() {
                let mut j = i + 1;
                while j < messages.len() {
                    let hit = combiners
                        .iter()
                        .find(|c| c.should_merge(&messages[i], &messages[j]));
                    match hit {
                        Some(combiner) => {
                            let src = messages.remove(j);
                            combiner.merge(&mut messages[i], &src, *ranks_limit);
                            dirty = true;
                        }
                        None => j += 1,
                    }
                }
                i += 1;
            }
            if !dirty {
                break;
            }
        }
    }

    /// Move messages one hop toward the output node.
    ///
    /// Combines locally, sends this rank's pack (non-output nodes then hold
    /// nothing), decodes what arrived from peers and combines again. A pack
    /// that fails to decode is dropped whole and replaced by a local `Warning`.
    pub fn push_once(&mut self) -> Result<(), LumberjackError> {
        let (rank, output_node) = match self.communicator.as_ref() {
            Some(c) => (c.rank(), c.is_output_node()),
            None => {
                log::warn!("{}; push skipped", LumberjackError::NoCommunicator);
                return Ok(());
            }
        };

        self.combine_all();
        let outgoing = if output_node {
            bytes::Bytes::new()
        } else {
            wire::encode_messages(&self.messages)
        };

        let mut incoming = Vec::new();
        if let Some(c) = self.communicator.as_mut() {
            if let Err(e) = c.push(outgoing, &mut incoming) {
                log::error!("rank {rank}: push failed: {e}");
                return Err(e);
            }
        }
        if !output_node {
            self.messages.clear();
        }

        for pack in &incoming {
            self.absorb_pack(rank, pack);
        }
        self.combine_all();
        Ok(())
    }

    fn absorb_pack(&mut self, rank: usize, pack: &[u8]) {
        match wire::decode_messages(pack) {
            Ok(decoded) => {
                let limit = self.ranks_limit;
                self.messages.extend(decoded.into_iter().map(|mut m| {
                    m.truncate_ranks(limit);
                    m
                }));
            }
            Err(e) => {
                log::warn!(
                    "rank {rank}: dropping corrupt message pack of {} bytes: {e}",
                    pack.len()
                );
                self.messages.push(Message::new(
                    format!("Lumberjack dropped a corrupt message pack: {e}"),
                    "",
                    0,
                    Level::Warning,
                    INTERNAL_TAG,
                    rank,
                ));
            }
        }
    }

    /// Push until every message reached the output node.
    pub fn push_fully(&mut self) -> Result<(), LumberjackError> {
        let rounds = match self.communicator.as_ref() {
            Some(c) => c.num_pushes_to_flush(),
            None => {
                log::warn!("{}; flush skipped", LumberjackError::NoCommunicator);
                return Ok(());
            }
        };
        for round in 0..rounds {
            log::trace!("push round {} of {rounds}", round + 1);
            self.push_once()?;
        }
        // A world of one needs no rounds but still coalesces.
        self.combine_all();
        Ok(())
    }

    /// Whether this rank should emit the messages it holds.
    pub fn is_output_node(&self) -> bool {
        self.communicator
            .as_ref()
            .is_some_and(|c| c.is_output_node())
    }
}

impl DebugInvariants for Lumberjack {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Lumberjack");
    }

    fn validate_invariants(&self) -> Result<(), LumberjackError> {
        for m in &self.messages {
            m.validate_invariants()?;
            require(m.ranks().len() <= self.ranks_limit, || {
                format!(
                    "message {:?} tracks {} ranks, limit is {}",
                    m.text(),
                    m.ranks().len(),
                    self.ranks_limit
                )
            })?;
        }
        Ok(())
    }
}
