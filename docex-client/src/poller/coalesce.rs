//! One in-flight poll per document id.
//!
//! The first caller for a document spawns the poll as a background task. The
//! task publishes every snapshot on a `watch` channel; later callers for the
//! same id subscribe to it instead of starting their own poll. The entry is
//! dropped from the map as soon as the poll resolves, or when every caller
//! has gone away. The map only holds a weak handle: the task owns the sender,
//! so a task that dies closes the channel for everyone following it.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{DocumentSource, Observer, PollOptions, poll_until_complete};
use crate::error::{ClientError, ClientResult};
use crate::models::DocumentRecord;

/// What the shared poll has published so far
#[derive(Debug, Clone, Default)]
struct PollState {
    /// Bumped on every snapshot
    seq: u64,
    latest: Option<DocumentRecord>,
    outcome: Option<Result<DocumentRecord, Arc<ClientError>>>,
}

const MAX_SUBSCRIBE_ROUNDS: usize = 2;

type PollSender = Arc<watch::Sender<PollState>>;
type PollHandle = Weak<watch::Sender<PollState>>;

enum Followed {
    Done(ClientResult<DocumentRecord>),
    /// The shared poll ended without publishing a result
    Abandoned,
}

/// Shares polls between concurrent callers asking about the same document.
pub struct PollCoalescer<S> {
    source: Arc<S>,
    options: PollOptions,
    in_flight: Arc<DashMap<String, PollHandle>>,
}

impl<S> Clone for PollCoalescer<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            options: self.options,
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<S: DocumentSource + 'static> PollCoalescer<S> {
    pub fn new(source: Arc<S>, options: PollOptions) -> Self {
        Self {
            source,
            options,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of documents currently being polled
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Wait for a document to complete, joining an existing poll if there is one.
    ///
    /// The observer sees the latest snapshot at join time and each one
    /// published afterwards. Snapshots published faster than the observer
    /// runs may be skipped. Cancelling `cancel` detaches this caller only;
    /// the shared poll continues for anyone else still waiting.
    pub async fn poll_until_complete(
        &self,
        document_id: &str,
        cancel: &CancellationToken,
        mut observer: Option<Observer<'_>>,
    ) -> ClientResult<DocumentRecord> {
        // A poll can be abandoned between our lookup and subscription; one
        // retry starts a fresh poll.
        for _ in 0..MAX_SUBSCRIBE_ROUNDS {
            let receiver = self.subscribe(document_id);
            match follow(receiver, document_id, cancel, observer.as_deref_mut()).await {
                Followed::Done(result) => return result,
                Followed::Abandoned => {
                    debug!(doc_id = %document_id, "Shared poll ended without a result, resubscribing");
                }
            }
        }
        warn!(doc_id = %document_id, "Shared poll repeatedly ended without a result");
        Err(ClientError::PollInterrupted {
            document_id: document_id.to_string(),
        })
    }

    fn subscribe(&self, document_id: &str) -> watch::Receiver<PollState> {
        let (receiver, sender) = match self.in_flight.entry(document_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let live = entry.get().upgrade();
                match live {
                    Some(sender) => {
                        debug!(doc_id = %document_id, "Joining in-flight poll");
                        (sender.subscribe(), None)
                    }
                    // The task behind this entry is gone
                    None => {
                        let (sender, receiver) = channel();
                        entry.insert(Arc::downgrade(&sender));
                        (receiver, Some(sender))
                    }
                }
            }
            Entry::Vacant(entry) => {
                let (sender, receiver) = channel();
                entry.insert(Arc::downgrade(&sender));
                (receiver, Some(sender))
            }
        };

        // Spawn outside the map guard; the task removes its own entry.
        if let Some(sender) = sender {
            self.spawn_poll(document_id.to_string(), sender);
        }
        receiver
    }

    fn spawn_poll(&self, document_id: String, sender: PollSender) {
        let source = self.source.clone();
        let options = self.options;
        let in_flight = self.in_flight.clone();

        debug!(doc_id = %document_id, "Starting shared poll");
        tokio::spawn(async move {
            let mut publish = |record: &DocumentRecord| -> ClientResult<()> {
                sender.send_modify(|state| {
                    state.seq += 1;
                    state.latest = Some(record.clone());
                });
                Ok(())
            };
            let unused = CancellationToken::new();
            let poll = poll_until_complete(
                source.as_ref(),
                &document_id,
                &options,
                &unused,
                Some(&mut publish),
            );

            let outcome = tokio::select! {
                result = poll => Some(result),
                _ = sender.closed() => None,
            };

            let handle = Arc::downgrade(&sender);
            in_flight.remove_if(&document_id, |_, current| Weak::ptr_eq(current, &handle));

            match outcome {
                Some(result) => {
                    sender.send_modify(|state| state.outcome = Some(result.map_err(Arc::new)));
                }
                None => debug!(doc_id = %document_id, "All callers detached, shared poll stopped"),
            }
        });
    }
}

fn channel() -> (PollSender, watch::Receiver<PollState>) {
    let (sender, receiver) = watch::channel(PollState::default());
    (Arc::new(sender), receiver)
}

async fn follow<'o>(
    mut receiver: watch::Receiver<PollState>,
    document_id: &str,
    cancel: &CancellationToken,
    mut observer: Option<&mut (dyn FnMut(&DocumentRecord) -> ClientResult<()> + Send + 'o)>,
) -> Followed {
    let mut seen = 0;
    loop {
        let state = receiver.borrow_and_update().clone();

        // The final snapshot and the outcome can land together; deliver the
        // snapshot first.
        if state.seq > seen {
            seen = state.seq;
            if let (Some(observer), Some(record)) = (observer.as_mut(), state.latest.as_ref())
                && let Err(e) = observer(record)
            {
                return Followed::Done(Err(e));
            }
        }
        if let Some(outcome) = state.outcome {
            return Followed::Done(outcome.map_err(ClientError::from));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Followed::Done(Err(ClientError::Cancelled {
                    document_id: document_id.to_string(),
                }));
            }
            changed = receiver.changed() => {
                if changed.is_err() {
                    return Followed::Abandoned;
                }
            }
        }
    }
}
