//! Instrumentation events emitted by the rendering pipeline.
//!
//! The segmenter and the output classifier report each decision they take
//! to a [`PipelineObserver`]. Observers only watch: results are identical
//! whichever observer is passed, including [`NoopObserver`].

use std::cell::RefCell;

use crate::parts::PartKind;

/// Which branch of the output classifier produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierBranch {
    /// The value itself is a chart spec.
    DirectSpec,
    /// The spec sits in the first cell of a tabular result.
    TabularCell,
    /// The spec sits in the `output` field of a tool envelope.
    Envelope,
    /// The value is a string that decoded as JSON.
    DecodedString,
    /// Nothing matched.
    NotFound,
}

/// A single decision taken by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PipelineEvent {
    /// A new segment was started.
    SegmentOpened {
        /// Position of the segment.
        index: usize,
        /// Kind of its first part.
        leading: PartKind,
    },
    /// A citation was appended to the preceding segment.
    CitationGrouped {
        /// Position of the segment that grew.
        index: usize,
    },
    /// A text part joined the run of citations before it.
    TextGrouped {
        /// Position of the segment that grew.
        index: usize,
    },
    /// A name marker segment was suppressed.
    NameSuppressed {
        /// Position of the segment.
        index: usize,
        /// The display name it carried.
        name: String,
    },
    /// A text segment was captured as a tool's streamed output.
    TextCaptured {
        /// Position of the text segment.
        index: usize,
        /// The tool call that owns it.
        tool_call_id: String,
    },
    /// The classifier took a branch.
    Classified {
        /// The branch.
        branch: ClassifierBranch,
        /// Recursion depth at which it was taken.
        depth: usize,
    },
    /// The classifier hit its recursion bound.
    DepthExceeded {
        /// The configured bound.
        limit: usize,
    },
    /// A string looked like JSON but failed to decode.
    DecodeFailed {
        /// The decoder's message.
        reason: String,
    },
}

/// Receives pipeline events.
pub trait PipelineObserver {
    /// Called once per decision.
    fn observe(&self, event: &PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn observe(&self, _event: &PipelineEvent) {}
}

/// Forwards every event to `log::debug!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn observe(&self, event: &PipelineEvent) {
        log::debug!(target: "parlance::pipeline", "{event:?}");
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the recorded events, leaving the recorder empty.
    pub fn take(&self) -> Vec<PipelineEvent> {
        self.events.take()
    }
}

impl PipelineObserver for RecordingObserver {
    fn observe(&self, event: &PipelineEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
