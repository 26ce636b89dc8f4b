use crate::media::{parse_count, Attachment, Timestamp};

/// Progress of an audio trim conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrimState {
    AwaitingFile,
    AwaitingStart { source: Attachment },
    AwaitingEnd { source: Attachment, start: Timestamp },
    /// Job handed to the pipeline; the session goes away when it finishes
    Running,
}

/// Everything a trim job needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimJob {
    pub source: Attachment,
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Outcome of feeding one input into a [`TrimState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrimStep {
    AskStart,
    AskEnd,
    InvalidStart,
    InvalidEnd,
    Ready(TrimJob),
    /// A file is already stored; progress is untouched
    FileAlreadyQueued,
    NotAwaitingText,
    Busy,
}

impl TrimState {
    /// Whether the next text message should be read as a timestamp
    pub fn awaits_timestamp(&self) -> bool {
        matches!(
            self,
            TrimState::AwaitingStart { .. } | TrimState::AwaitingEnd { .. }
        )
    }

    pub fn accept_file(&mut self, attachment: Attachment) -> TrimStep {
        match self {
            TrimState::AwaitingFile => {
                *self = TrimState::AwaitingStart { source: attachment };
                TrimStep::AskStart
            }
            TrimState::AwaitingStart { .. } | TrimState::AwaitingEnd { .. } => {
                TrimStep::FileAlreadyQueued
            }
            TrimState::Running => TrimStep::Busy,
        }
    }

    pub fn accept_text(&mut self, text: &str) -> TrimStep {
        match self {
            TrimState::AwaitingStart { source } => match Timestamp::parse(text) {
                Some(start) => {
                    let source = source.clone();
                    *self = TrimState::AwaitingEnd { source, start };
                    TrimStep::AskEnd
                }
                None => TrimStep::InvalidStart,
            },
            TrimState::AwaitingEnd { source, start } => match Timestamp::parse(text) {
                // No ordering check between start and end; the transcoder decides
                Some(end) => {
                    let job = TrimJob {
                        source: source.clone(),
                        start: start.clone(),
                        end,
                    };
                    *self = TrimState::Running;
                    TrimStep::Ready(job)
                }
                None => TrimStep::InvalidEnd,
            },
            TrimState::AwaitingFile => TrimStep::NotAwaitingText,
            TrimState::Running => TrimStep::Busy,
        }
    }
}

/// Progress of an audio merge conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeState {
    AwaitingCount,
    AwaitingFiles {
        expected: usize,
        received: Vec<Attachment>,
    },
    Running,
}

/// Inputs of a merge job, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJob {
    pub inputs: Vec<Attachment>,
}

/// Outcome of feeding one input into a [`MergeState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStep {
    CountSet(usize),
    InvalidCount,
    Received { count: usize, expected: usize },
    /// The last expected file arrived
    Ready(MergeJob),
    /// A file arrived before the count was given
    CountPending,
    Busy,
}

impl MergeState {
    pub fn awaits_count(&self) -> bool {
        matches!(self, MergeState::AwaitingCount)
    }

    pub fn accept_count(&mut self, text: &str) -> MergeStep {
        match self {
            MergeState::AwaitingCount => match parse_count(text) {
                Some(expected) => {
                    *self = MergeState::AwaitingFiles {
                        expected,
                        received: Vec::new(),
                    };
                    MergeStep::CountSet(expected)
                }
                None => MergeStep::InvalidCount,
            },
            MergeState::AwaitingFiles { .. } | MergeState::Running => MergeStep::Busy,
        }
    }

    pub fn accept_file(&mut self, attachment: Attachment) -> MergeStep {
        match self {
            MergeState::AwaitingCount => MergeStep::CountPending,
            MergeState::AwaitingFiles { expected, received } => {
                received.push(attachment);
                if received.len() < *expected {
                    return MergeStep::Received {
                        count: received.len(),
                        expected: *expected,
                    };
                }
                let inputs = std::mem::take(received);
                *self = MergeState::Running;
                MergeStep::Ready(MergeJob { inputs })
            }
            MergeState::Running => MergeStep::Busy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::AttachmentKind;

    fn audio(id: &str) -> Attachment {
        Attachment::new(AttachmentKind::Audio, id)
    }

    #[test]
    fn trim_fills_file_then_start_then_end() {
        let mut state = TrimState::AwaitingFile;

        assert_eq!(state.accept_text("00:00:01"), TrimStep::NotAwaitingText);
        assert_eq!(state.accept_file(audio("a")), TrimStep::AskStart);
        assert_eq!(state.accept_text("nope"), TrimStep::InvalidStart);
        assert_eq!(state.accept_text("00:00:10"), TrimStep::AskEnd);
        assert_eq!(state.accept_text("25:00:00"), TrimStep::InvalidEnd);

        match state.accept_text("00:00:05") {
            TrimStep::Ready(job) => {
                assert_eq!(job.source.file_id, "a");
                assert_eq!(job.start.as_str(), "00:00:10");
                assert_eq!(job.end.as_str(), "00:00:05");
            }
            other => panic!("expected a ready job, got {other:?}"),
        }
        assert_eq!(state, TrimState::Running);
        assert_eq!(state.accept_text("00:00:06"), TrimStep::Busy);
    }

    #[test]
    fn second_trim_file_keeps_progress() {
        let mut state = TrimState::AwaitingFile;
        state.accept_file(audio("first"));
        state.accept_text("00:01:00");

        assert_eq!(state.accept_file(audio("second")), TrimStep::FileAlreadyQueued);
        match &state {
            TrimState::AwaitingEnd { source, start } => {
                assert_eq!(source.file_id, "first");
                assert_eq!(start.as_str(), "00:01:00");
            }
            other => panic!("progress lost: {other:?}"),
        }
    }

    #[test]
    fn merge_is_ready_exactly_at_expected_count() {
        let mut state = MergeState::AwaitingCount;

        assert_eq!(state.accept_file(audio("early")), MergeStep::CountPending);
        assert_eq!(state.accept_count("0"), MergeStep::InvalidCount);
        assert_eq!(state.accept_count("3"), MergeStep::CountSet(3));

        assert_eq!(state.accept_file(audio("a")), MergeStep::Received { count: 1, expected: 3 });
        assert_eq!(state.accept_file(audio("b")), MergeStep::Received { count: 2, expected: 3 });
        match state.accept_file(audio("c")) {
            MergeStep::Ready(job) => {
                let ids: Vec<_> = job.inputs.iter().map(|a| a.file_id.as_str()).collect();
                assert_eq!(ids, ["a", "b", "c"]);
            }
            other => panic!("expected a ready job, got {other:?}"),
        }
        assert_eq!(state.accept_file(audio("d")), MergeStep::Busy);
    }
}
