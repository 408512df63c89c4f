//! Bounded event multiplexer and the caller-facing run handle.
//!
//! Every producer task in an orchestration funnels [`CouncilEvent`]
//! values through one bounded channel. A full buffer suspends producers,
//! propagating backpressure from a slow consumer all the way to provider
//! streaming. A dropped consumer trips the run's cancellation token so
//! in-flight model calls stop promptly.

use council_domain::{CouncilEvent, CouncilTurn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sending half of the output stream, shared by all producer tasks.
#[derive(Clone)]
pub struct EventMux {
    tx: mpsc::Sender<CouncilEvent>,
    cancel: CancellationToken,
}

impl EventMux {
    /// Create the bounded channel plus its receiving half.
    pub fn channel(capacity: usize, cancel: CancellationToken) -> (Self, mpsc::Receiver<CouncilEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, cancel }, rx)
    }

    /// Send one event, suspending while the buffer is full.
    ///
    /// Returns `false` when the consumer is gone; the run's cancellation
    /// token is tripped so producers wind down.
    pub async fn send(&self, event: CouncilEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(_) => {
                debug!("event consumer gone, cancelling run");
                self.cancel.cancel();
                false
            }
        }
    }

    /// Spawn a watchdog that cancels the run as soon as the consumer
    /// drops the receiving half, even while no events are in flight.
    pub fn watch_consumer(&self) -> JoinHandle<()> {
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tx.closed().await;
            cancel.cancel();
        })
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// A running council turn, handed to the caller.
///
/// Dropping the run severs the event stream and cancels in-flight model
/// calls; the turn is then not persisted.
pub struct CouncilRun {
    conversation_id: String,
    receiver: mpsc::Receiver<CouncilEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<Option<CouncilTurn>>,
}

impl CouncilRun {
    pub(crate) fn new(
        conversation_id: String,
        receiver: mpsc::Receiver<CouncilEvent>,
        cancel: CancellationToken,
        handle: JoinHandle<Option<CouncilTurn>>,
    ) -> Self {
        Self {
            conversation_id,
            receiver,
            cancel,
            handle,
        }
    }

    /// The conversation this turn belongs to (newly minted when the
    /// request carried none). Available before the first event, so an
    /// HTTP layer can set its `X-Conversation-ID` header.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Next event, or `None` once the stream is closed.
    pub async fn next_event(&mut self) -> Option<CouncilEvent> {
        self.receiver.recv().await
    }

    /// Cancel the run explicitly.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain any remaining events and wait for the orchestration to
    /// finish, returning the persisted turn if there was one.
    pub async fn join(mut self) -> Option<CouncilTurn> {
        while self.receiver.recv().await.is_some() {}
        self.handle.await.ok().flatten()
    }

    /// Collect the full event stream and the turn result. Test and
    /// batch-mode convenience.
    pub async fn collect(mut self) -> (Vec<CouncilEvent>, Option<CouncilTurn>) {
        let mut events = Vec::new();
        while let Some(event) = self.receiver.recv().await {
            events.push(event);
        }
        let turn = self.handle.await.ok().flatten();
        (events, turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_in_order() {
        let cancel = CancellationToken::new();
        let (mux, mut rx) = EventMux::channel(4, cancel);
        assert!(mux.send(CouncilEvent::Complete).await);
        assert!(mux.send(CouncilEvent::error("x")).await);
        assert_eq!(rx.recv().await, Some(CouncilEvent::Complete));
        assert_eq!(rx.recv().await, Some(CouncilEvent::error("x")));
    }

    #[tokio::test]
    async fn dropped_receiver_cancels_run() {
        let cancel = CancellationToken::new();
        let (mux, rx) = EventMux::channel(4, cancel.clone());
        let watchdog = mux.watch_consumer();
        drop(rx);
        watchdog.await.unwrap();
        assert!(cancel.is_cancelled());
        assert!(!mux.send(CouncilEvent::Complete).await);
    }

    #[tokio::test]
    async fn full_buffer_suspends_sender() {
        let cancel = CancellationToken::new();
        let (mux, mut rx) = EventMux::channel(1, cancel);
        assert!(mux.send(CouncilEvent::Complete).await);

        let mux2 = mux.clone();
        let pending = tokio::spawn(async move { mux2.send(CouncilEvent::error("late")).await });

        // The second send cannot finish until we consume one event.
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        assert_eq!(rx.recv().await, Some(CouncilEvent::Complete));
        assert!(pending.await.unwrap());
        assert_eq!(rx.recv().await, Some(CouncilEvent::error("late")));
    }
}
