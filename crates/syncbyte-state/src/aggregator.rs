//! Reduction of a sync attempt's state messages into one checkpoint.
//!
//! An aggregator is owned by a single attempt and moved, never shared. A
//! retried attempt may fold a previous attempt's aggregator into its own
//! with [`StateAggregator::merge`].

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;
use syncbyte_types::{State, StateMessage, StateType, StreamDescriptor};

use crate::error::{self, StateError};

/// The two aggregator variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregatorKind {
    /// One entry per stream descriptor.
    PerStream,
    /// One message for the whole connection (legacy and global state).
    Single,
}

impl AggregatorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerStream => "per-stream",
            Self::Single => "single",
        }
    }

    /// Variant that can hold messages of `state_type`.
    #[must_use]
    pub fn for_state_type(state_type: StateType) -> Self {
        match state_type {
            StateType::Stream => Self::PerStream,
            StateType::Legacy | StateType::Global => Self::Single,
        }
    }
}

impl fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-write-wins map from stream descriptor to its latest state message.
///
/// Entries keep the position of the first message seen for their stream, so
/// serialization is stable across identical inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStateAggregator {
    entries: IndexMap<StreamDescriptor, StateMessage>,
}

impl StreamStateAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `message` under its stream descriptor.
    ///
    /// The legacy `data` payload is dropped before storage.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::MissingStreamDescriptor`] if the message has no
    /// stream section.
    pub fn ingest(&mut self, mut message: StateMessage) -> error::Result<()> {
        let Some(descriptor) = message.descriptor().cloned() else {
            return Err(StateError::MissingStreamDescriptor {
                state_type: message.effective_type(),
            });
        };
        message.data = None;
        self.entries.insert(descriptor, message);
        Ok(())
    }

    /// Fold every entry of `other` into this aggregator, in `other`'s order.
    pub fn merge(&mut self, other: StreamStateAggregator) {
        for (descriptor, message) in other.entries {
            self.entries.insert(descriptor, message);
        }
    }

    /// # Errors
    ///
    /// Returns [`StateError::Serialization`] if a message cannot be encoded.
    pub fn aggregated(&self) -> error::Result<State> {
        let messages = self
            .entries
            .values()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(State::new(Value::Array(messages)))
    }

    #[must_use]
    pub fn get(&self, descriptor: &StreamDescriptor) -> Option<&StateMessage> {
        self.entries.get(descriptor)
    }

    /// Descriptors in first-seen order.
    pub fn descriptors(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.entries.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Holds the latest whole-connection message (legacy or global).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleStateAggregator {
    latest: Option<StateMessage>,
}

impl SingleStateAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held message.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnsupportedStateType`] for per-stream messages.
    pub fn ingest(&mut self, message: StateMessage) -> error::Result<()> {
        let state_type = message.effective_type();
        if state_type == StateType::Stream {
            return Err(StateError::UnsupportedStateType {
                kind: AggregatorKind::Single,
                state_type,
            });
        }
        self.latest = Some(message);
        Ok(())
    }

    pub fn merge(&mut self, other: SingleStateAggregator) {
        if other.latest.is_some() {
            self.latest = other.latest;
        }
    }

    /// Legacy state yields the opaque `data` blob; global state yields a
    /// one-element array holding the message.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Serialization`] if the message cannot be encoded.
    pub fn aggregated(&self) -> error::Result<State> {
        let Some(message) = &self.latest else {
            return Ok(State::new(Value::Null));
        };
        match message.effective_type() {
            StateType::Legacy => Ok(State::new(message.data.clone().unwrap_or(Value::Null))),
            StateType::Global | StateType::Stream => {
                Ok(State::new(Value::Array(vec![serde_json::to_value(message)?])))
            }
        }
    }

    #[must_use]
    pub fn latest(&self) -> Option<&StateMessage> {
        self.latest.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }
}

/// Tagged aggregator over both variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StateAggregator {
    PerStream(StreamStateAggregator),
    Single(SingleStateAggregator),
}

impl Default for StateAggregator {
    fn default() -> Self {
        Self::PerStream(StreamStateAggregator::new())
    }
}

impl StateAggregator {
    #[must_use]
    pub fn new(kind: AggregatorKind) -> Self {
        match kind {
            AggregatorKind::PerStream => Self::PerStream(StreamStateAggregator::new()),
            AggregatorKind::Single => Self::Single(SingleStateAggregator::new()),
        }
    }

    /// Empty aggregator able to hold messages of `state_type`.
    #[must_use]
    pub fn for_state_type(state_type: StateType) -> Self {
        Self::new(AggregatorKind::for_state_type(state_type))
    }

    #[must_use]
    pub fn kind(&self) -> AggregatorKind {
        match self {
            Self::PerStream(_) => AggregatorKind::PerStream,
            Self::Single(_) => AggregatorKind::Single,
        }
    }

    /// # Errors
    ///
    /// Returns [`StateError`] if the message does not fit this variant.
    pub fn ingest(&mut self, message: StateMessage) -> error::Result<()> {
        match self {
            Self::PerStream(agg) => agg.ingest(message),
            Self::Single(agg) => agg.ingest(message),
        }
    }

    /// Fold `other` into this aggregator as if its messages were replayed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::KindMismatch`] if the variants differ; `self` is
    /// left untouched.
    pub fn merge(&mut self, other: StateAggregator) -> error::Result<()> {
        match (self, other) {
            (Self::PerStream(this), Self::PerStream(other)) => {
                this.merge(other);
                Ok(())
            }
            (Self::Single(this), Self::Single(other)) => {
                this.merge(other);
                Ok(())
            }
            (this, other) => Err(StateError::KindMismatch {
                this: this.kind(),
                other: other.kind(),
            }),
        }
    }

    /// Current checkpoint. Repeatable; reflects every successful ingest.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Serialization`] if a message cannot be encoded.
    pub fn aggregated(&self) -> error::Result<State> {
        match self {
            Self::PerStream(agg) => agg.aggregated(),
            Self::Single(agg) => agg.aggregated(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::PerStream(agg) => agg.is_empty(),
            Self::Single(agg) => agg.is_empty(),
        }
    }
}
