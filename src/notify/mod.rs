//! Alert notification.
//!
//! `Notifier` is the seam between the monitoring loop and whatever delivers
//! alerts. The loop never calls it directly: `NotificationDispatcher` runs each
//! alert on its own worker thread so a slow transport cannot stall frame
//! processing.

pub mod contacts;
pub mod message;
pub mod transport;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::{AlertSettings, NotifySettings};

pub use contacts::{title_case, Contact, ContactBook, MessageTemplate};
pub use message::{AlertMessage, ContactNotifier};
pub use transport::{LogTransport, MessageTransport, WebhookTransport};

/// Delivers one alert for a stored snapshot.
pub trait Notifier: Send + Sync {
    fn send(&self, snapshot: &Path) -> Result<()>;
}

/// Contact-list notifier over the webhook transport when a URL is configured,
/// the log transport otherwise.
pub fn build_notifier(notify: &NotifySettings, alert: &AlertSettings) -> Result<Arc<dyn Notifier>> {
    let transport: Box<dyn MessageTransport> = match notify.webhook_url.as_deref() {
        Some(url) => Box::new(WebhookTransport::new(url)?),
        None => Box::new(LogTransport),
    };
    log::info!("alerts go to contacts in {} via {}", notify.contacts_path.display(), transport.name());
    Ok(Arc::new(ContactNotifier::new(
        notify.contacts_path.clone(),
        notify.message_path.clone(),
        notify.subject.clone(),
        alert.cooldown.as_secs(),
        transport,
    )))
}

/// Fire-and-forget alert delivery on named worker threads.
///
/// Workers only see the snapshot path and the shared notifier. Their failures
/// are logged and never reach the loop. Handles are kept so shutdown can wait
/// for deliveries still in flight.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    in_flight: Arc<AtomicUsize>,
    workers: Vec<JoinHandle<()>>,
    dispatched: u64,
}

/// Decrements the in-flight count when the worker exits, even by panic.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            in_flight: Arc::new(AtomicUsize::new(0)),
            workers: Vec::new(),
            dispatched: 0,
        }
    }

    /// Start delivering `snapshot` in the background and return immediately.
    pub fn dispatch(&mut self, snapshot: PathBuf) -> Result<()> {
        self.reap_finished();
        self.dispatched += 1;
        let id = self.dispatched;
        let notifier = Arc::clone(&self.notifier);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        let spawned = thread::Builder::new()
            .name(format!("notify-{}", id))
            .spawn(move || {
                let _guard = guard;
                log::info!("alert {}: notifying for {}", id, snapshot.display());
                match notifier.send(&snapshot) {
                    Ok(()) => log::info!("alert {}: delivered", id),
                    Err(err) => log::error!("alert {}: notification failed: {:#}", id, err),
                }
            })
            .context("spawn notification worker")?;
        self.workers.push(spawned);
        Ok(())
    }

    /// Workers started and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Wait for every outstanding worker. Returns how many were joined.
    pub fn join_all(&mut self) -> usize {
        let workers = std::mem::take(&mut self.workers);
        let count = workers.len();
        for worker in workers {
            join_worker(worker);
        }
        count
    }

    fn reap_finished(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.workers)
            .into_iter()
            .partition(|worker| worker.is_finished());
        self.workers = running;
        for worker in finished {
            join_worker(worker);
        }
    }
}

fn join_worker(worker: JoinHandle<()>) {
    let name = worker.thread().name().unwrap_or("notify").to_string();
    if worker.join().is_err() {
        log::error!("{} panicked", name);
    }
}
