//! The authority actor: one task per symbol owning all state for it.
//!
//! Commands arrive on a bounded mailbox and are processed one at a time,
//! which serializes serial assignment and the conflict rule without locks.
//! The same loop drives the persistence tick, long-poll expiry and
//! persistence reports.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::persist::Persistence;
use super::state::AuthorityState;
use super::waiters::{WaitList, WaiterKey};
use crate::domain::{Diff, Epoch, Published, Receipt, Record, RecordKind, Serial, Symbol};
use crate::error::{Error, ReplicationError, Result};
use crate::infrastructure::config::ReplicationConfig;
use crate::infrastructure::{Backoff, ShutdownSignal};
use crate::port::outbound::{RecordFeed, RecordStore};

/// Upper bound on the shutdown flush against an unresponsive store.
const FINAL_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Point-in-time counters of one authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityStats {
    pub kind: RecordKind,
    pub symbol: Symbol,
    pub epoch: Epoch,
    pub max_serial: Serial,
    pub saved_serial: Serial,
    pub records: usize,
    pub waiters: usize,
    pub persisting: bool,
}

pub(crate) enum Command<R: Record> {
    Submit {
        records: Vec<R>,
        reply: oneshot::Sender<std::result::Result<Receipt, ReplicationError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Diff<R>>,
    },
    DiffSince {
        epoch: Epoch,
        from: Serial,
        wait: Duration,
        reply: oneshot::Sender<Diff<R>>,
    },
    Lookup {
        id: R::Id,
        reply: oneshot::Sender<Option<R>>,
    },
    Stats {
        reply: oneshot::Sender<AuthorityStats>,
    },
    Flush {
        reply: oneshot::Sender<Serial>,
    },
}

/// Cheap, cloneable address of a running authority.
pub struct AuthorityHandle<R: Record> {
    symbol: Symbol,
    mailbox: mpsc::Sender<Command<R>>,
}

impl<R: Record> Clone for AuthorityHandle<R> {
    fn clone(&self) -> Self {
        Self {
            symbol: self.symbol.clone(),
            mailbox: self.mailbox.clone(),
        }
    }
}

impl<R: Record> AuthorityHandle<R> {
    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Whether the actor behind this handle has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    pub async fn submit_many(&self, records: Vec<R>) -> Result<Receipt> {
        let receipt = self
            .request(|reply| Command::Submit { records, reply })
            .await?;
        Ok(receipt?)
    }

    pub async fn snapshot(&self) -> Result<Diff<R>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn diff_since(&self, epoch: Epoch, from: Serial, wait: Duration) -> Result<Diff<R>> {
        self.request(|reply| Command::DiffSince {
            epoch,
            from,
            wait,
            reply,
        })
        .await
    }

    pub async fn lookup(&self, id: R::Id) -> Result<Option<R>> {
        self.request(|reply| Command::Lookup { id, reply }).await
    }

    pub async fn stats(&self) -> Result<AuthorityStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Persist every accepted change now and return the saved watermark.
    pub async fn flush(&self) -> Result<Serial> {
        self.request(|reply| Command::Flush { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command<R>) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(build(reply))
            .await
            .map_err(|_| self.unavailable())?;
        response.await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> Error {
        ReplicationError::AuthorityUnavailable {
            kind: R::KIND,
            symbol: self.symbol.clone(),
        }
        .into()
    }
}

/// Load a symbol, retrying with backoff, and start its actor.
///
/// # Errors
///
/// Returns [`Error::StoreUnavailable`] once the load retry budget is spent.
pub async fn spawn_authority<R, S>(
    symbol: Symbol,
    store: Arc<S>,
    feed: Option<Arc<dyn RecordFeed<R>>>,
    config: &ReplicationConfig,
    shutdown: ShutdownSignal,
) -> Result<(AuthorityHandle<R>, JoinHandle<()>)>
where
    R: Record,
    S: RecordStore<R>,
{
    let stored = load_with_retry(&symbol, store.as_ref(), config).await?;
    let state = AuthorityState::load(symbol.clone(), stored);
    info!(
        kind = %R::KIND,
        symbol = %symbol,
        epoch = %state.epoch(),
        records = state.len(),
        "Authority started"
    );

    let (mailbox, inbox) = mpsc::channel(config.mailbox_capacity.max(1));
    let (waiters, expired) = WaitList::new();
    let persistence = Persistence::new(symbol.clone(), store, state.max_serial());
    let actor = AuthorityActor {
        symbol: symbol.clone(),
        state,
        waiters,
        expired,
        persistence,
        inbox,
        feed,
        persist_interval: config.persist_interval(),
        shutdown,
    };
    let task = tokio::spawn(actor.run());

    Ok((AuthorityHandle { symbol, mailbox }, task))
}

async fn load_with_retry<R, S>(symbol: &Symbol, store: &S, config: &ReplicationConfig) -> Result<Vec<R>>
where
    R: Record,
    S: RecordStore<R>,
{
    let attempts = config.load_retry_attempts.max(1);
    let mut backoff = Backoff::new(&config.retry);
    loop {
        match store.load_all(symbol).await {
            Ok(records) => return Ok(records),
            Err(e) if backoff.failures() + 1 >= attempts => {
                error!(kind = %R::KIND, symbol = %symbol, attempts, error = %e, "Giving up loading records");
                return Err(Error::StoreUnavailable {
                    symbol: symbol.clone(),
                    attempts,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    kind = %R::KIND,
                    symbol = %symbol,
                    attempt = backoff.failures(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Loading records failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

struct AuthorityActor<R: Record> {
    symbol: Symbol,
    state: AuthorityState<R>,
    waiters: WaitList<R>,
    expired: mpsc::UnboundedReceiver<WaiterKey>,
    persistence: Persistence<R>,
    inbox: mpsc::Receiver<Command<R>>,
    feed: Option<Arc<dyn RecordFeed<R>>>,
    persist_interval: Duration,
    shutdown: ShutdownSignal,
}

impl<R: Record> AuthorityActor<R> {
    async fn run(mut self) {
        let mut tick = tokio::time::interval(self.persist_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                command = self.inbox.recv() => {
                    let Some(command) = command else {
                        debug!(symbol = %self.symbol, "All handles dropped");
                        break;
                    };
                    if let Err(e) = self.handle(command) {
                        error!(kind = %R::KIND, symbol = %self.symbol, error = %e, "Authority stopping");
                        self.waiters.release_all(self.state.epoch());
                        return;
                    }
                }
                Some(key) = self.expired.recv() => {
                    self.waiters.expire(key, self.state.epoch());
                }
                Some(report) = self.persistence.next_report() => {
                    self.persistence.on_report(report);
                }
                _ = tick.tick() => {
                    self.persistence.tick(&self.state);
                }
                () = shutdown.wait() => {
                    debug!(symbol = %self.symbol, "Shutdown requested");
                    break;
                }
            }
        }

        self.inbox.close();
        self.waiters.release_all(self.state.epoch());
        self.persistence.complete(&self.state, FINAL_FLUSH_TIMEOUT).await;
        info!(
            kind = %R::KIND,
            symbol = %self.symbol,
            max_serial = self.state.max_serial(),
            saved = self.persistence.saved(),
            "Authority stopped"
        );
    }

    fn handle(&mut self, command: Command<R>) -> std::result::Result<(), ReplicationError> {
        match command {
            Command::Submit { records, reply } => match self.submit(records) {
                Ok(receipt) => {
                    let _ = reply.send(Ok(receipt));
                }
                Err(e) => {
                    let _ = reply.send(Err(e.clone()));
                    return Err(e);
                }
            },
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            Command::DiffSince {
                epoch,
                from,
                wait,
                reply,
            } => match self.state.diff_since(epoch, from) {
                Some(diff) => {
                    let _ = reply.send(diff);
                }
                None if wait.is_zero() => {
                    let _ = reply.send(Diff::empty(self.state.epoch(), from.saturating_sub(1)));
                }
                None => self.waiters.park(from, wait, reply),
            },
            Command::Lookup { id, reply } => {
                let _ = reply.send(self.state.lookup(&id));
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            Command::Flush { reply } => self.persistence.flush(&self.state, reply),
        }
        Ok(())
    }

    fn submit(&mut self, records: Vec<R>) -> std::result::Result<Receipt, ReplicationError> {
        let mut accepted = 0;
        for record in records {
            if record.symbol() != &self.symbol {
                warn!(
                    kind = %R::KIND,
                    symbol = %self.symbol,
                    record_symbol = %record.symbol(),
                    id = %record.id(),
                    "Dropping record submitted to another symbol"
                );
                continue;
            }
            let published = self.feed.as_ref().map(|_| record.clone());
            if let Some(serial) = self.state.submit(record)? {
                accepted += 1;
                if let (Some(feed), Some(record)) = (&self.feed, published) {
                    feed.publish(Published {
                        epoch: self.state.epoch(),
                        serial,
                        record,
                    });
                }
            }
        }

        if accepted > 0 {
            let answered = self.waiters.complete(&self.state);
            debug!(
                symbol = %self.symbol,
                accepted,
                serial = self.state.max_serial(),
                answered,
                "Accepted records"
            );
        }

        Ok(Receipt {
            epoch: self.state.epoch(),
            serial: self.state.max_serial(),
            accepted,
        })
    }

    fn stats(&self) -> AuthorityStats {
        AuthorityStats {
            kind: R::KIND,
            symbol: self.symbol.clone(),
            epoch: self.state.epoch(),
            max_serial: self.state.max_serial(),
            saved_serial: self.persistence.saved(),
            records: self.state.len(),
            waiters: self.waiters.len(),
            persisting: self.persistence.is_busy(),
        }
    }
}
