//! Typed progress events emitted by a search.
//!
//! Events are sent to an optional `mpsc::Sender<SearchEvent>` after each stage
//! barrier; rendering them is up to the receiver. A dropped receiver is ignored.
//! A full channel applies backpressure until the search is cancelled.

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::error::Stage;
use crate::evaluate::Violation;
use crate::tree::NodeId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    /// `iteration` is 1-based.
    IterationStarted { iteration: usize },
    /// Leaf picked for expansion, with its decayed score.
    LeafSelected { leaf: NodeId, score: f64 },
    /// Result of the stopping predicate for one selected leaf.
    StopChecked { leaf: NodeId, answerable: bool },
    /// A candidate thought was committed under `parent`.
    CandidateScored {
        parent: NodeId,
        node: NodeId,
        content: String,
        score: f64,
        survived: bool,
        violation: Option<Violation>,
    },
    AnswerRejected {
        node: NodeId,
        answer: String,
        failures: Vec<String>,
    },
    AnswerAccepted { node: NodeId, answer: String },
    /// A stage failed or was cancelled; nothing from this iteration was committed.
    IterationAborted { iteration: usize, stage: Stage, reason: String },
    /// Search reached a terminal state.
    Finished { answered: bool, iterations: usize },
}

/// Sends `event` if a sink is attached. Waits for room in a full channel, but gives
/// up (dropping the event) once `cancel` fires.
pub(crate) async fn emit(
    sink: &Option<mpsc::Sender<SearchEvent>>,
    cancel: &CancellationToken,
    event: SearchEvent,
) {
    let Some(tx) = sink else { return };
    match tx.try_send(event) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(event)) => {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("search cancelled, progress event dropped");
                }
                _ = tx.send(event) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let v = serde_json::to_value(SearchEvent::AnswerAccepted {
            node: NodeId(4),
            answer: "24".into(),
        })
        .unwrap();
        assert_eq!(v["type"], "answer_accepted");
        assert_eq!(v["node"], 4);
        assert_eq!(v["answer"], "24");
    }

    #[tokio::test]
    async fn emit_without_sink_or_receiver_is_silent() {
        let cancel = CancellationToken::new();
        emit(&None, &cancel, SearchEvent::IterationStarted { iteration: 1 }).await;
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        emit(&Some(tx), &cancel, SearchEvent::IterationStarted { iteration: 1 }).await;
    }

    #[tokio::test]
    async fn cancellation_releases_a_full_channel() {
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(1);
        let sink = Some(tx);
        emit(&sink, &cancel, SearchEvent::IterationStarted { iteration: 1 }).await;

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let sent = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            emit(&sink, &cancel, SearchEvent::IterationStarted { iteration: 2 }),
        )
        .await;
        assert!(sent.is_ok());
        assert_eq!(rx.recv().await, Some(SearchEvent::IterationStarted { iteration: 1 }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancelled_search_still_reports_when_there_is_room() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, mut rx) = mpsc::channel(1);
        emit(&Some(tx), &cancel, SearchEvent::Finished { answered: false, iterations: 0 }).await;
        assert!(rx.try_recv().is_ok());
    }
}
