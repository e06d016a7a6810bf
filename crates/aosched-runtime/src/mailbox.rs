//! Message-queue actor
//!
//! A [`Mailbox`] owns one active object that stays `Active` while the mailbox
//! is open. Any thread may post closures; posting enqueues the closure and
//! completes the object, and the completion hook drains the queue on the
//! scheduler thread before re-arming.
//!
//! Only a thread holding the gate mutex completes the object. Off-thread
//! senders hold it from enqueue until their `complete()` returns, so each one
//! blocks until its message has been delivered. The scheduler thread only
//! ever tries the gate; whoever holds it re-checks for stranded work after
//! releasing it.

use crate::error::MailboxError;
use aosched_engine::{ActiveObject, HookResult, ObjectId, Scheduler};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{self, AtomicBool, Ordering};
use std::sync::Arc;

type Message = Box<dyn FnOnce() + Send>;

/// State shared between the handles and the delivery hook
struct Queue {
    rx: Receiver<Message>,
    /// Held by whoever may complete the object
    gate: Mutex<()>,
    closed: AtomicBool,
    /// Signalled each time a delivery pass re-arms or deletes the object
    pass_lock: Mutex<()>,
    pass_end: Condvar,
}

impl Queue {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Complete the object for work nobody else will pick up: a close, or a
    /// message queued while the gate was taken. A thread that finds the gate
    /// taken leaves this to the holder, which runs it after releasing.
    fn settle(&self, object: &ActiveObject) {
        loop {
            atomic::fence(Ordering::SeqCst);
            let stranded = self.is_closed() || !self.rx.is_empty();
            if !stranded || !object.is_active() {
                return;
            }
            let Some(_gate) = self.gate.try_lock() else {
                return;
            };
            if object.is_active() {
                object.complete();
            }
        }
    }

    fn signal_pass_end(&self) {
        let _lock = self.pass_lock.lock();
        self.pass_end.notify_all();
    }

    /// Completion hook: drain the queue, then re-arm or retire
    fn deliver(&self, object: &ActiveObject) -> HookResult {
        let mut delivered = 0usize;
        while !self.is_closed() {
            let Ok(message) = self.rx.try_recv() else {
                break;
            };
            message();
            delivered += 1;
        }

        if self.is_closed() {
            let dropped = self.rx.try_iter().count();
            tracing::debug!(object = %object.id(), delivered, dropped, "mailbox closed");
            object.delete();
        } else {
            tracing::trace!(object = %object.id(), delivered, "mailbox drained");
            object.set_active();
            // A close racing with the drain saw an idle object and left it here
            self.settle(object);
        }
        self.signal_pass_end();
        Ok(())
    }
}

struct Inner {
    object: ActiveObject,
    tx: Sender<Message>,
    queue: Arc<Queue>,
}

/// Actor that runs posted closures on the scheduler thread
///
/// A cheap, cloneable handle. An open mailbox keeps `Scheduler::run` alive;
/// call [`Mailbox::close`] to let it finish.
#[derive(Clone)]
pub struct Mailbox {
    inner: Arc<Inner>,
}

impl Mailbox {
    /// Open a mailbox. Must be called on the scheduler thread.
    pub fn new(scheduler: &Scheduler) -> Self {
        let (tx, rx) = channel::unbounded::<Message>();
        let queue = Arc::new(Queue {
            rx,
            gate: Mutex::new(()),
            closed: AtomicBool::new(false),
            pass_lock: Mutex::new(()),
            pass_end: Condvar::new(),
        });

        let object = {
            let queue = queue.clone();
            ActiveObject::new(scheduler, move |object| queue.deliver(object))
        };
        object.set_active();
        tracing::debug!(object = %object.id(), "mailbox open");

        Self {
            inner: Arc::new(Inner { object, tx, queue }),
        }
    }

    /// Identifier of the mailbox's active object
    pub fn id(&self) -> ObjectId {
        self.inner.object.id()
    }

    /// Messages queued but not yet delivered
    pub fn pending(&self) -> usize {
        self.inner.queue.rx.len()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.queue.is_closed()
    }

    /// Queue `f` to run on the scheduler thread.
    ///
    /// Off the scheduler thread this returns once `f` has been delivered. On
    /// the scheduler thread it returns immediately and `f` runs on a later
    /// dispatch.
    pub fn post<F>(&self, f: F) -> Result<(), MailboxError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Box::new(f))
    }

    /// Run `f` on the scheduler thread and return its value.
    ///
    /// # Errors
    ///
    /// [`MailboxError::WouldDeadlock`] on the scheduler thread;
    /// [`MailboxError::Closed`] if the mailbox closed before `f` ran.
    pub fn request<F, R>(&self, f: F) -> Result<R, MailboxError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.inner.object.scheduler().is_scheduler_thread() {
            return Err(MailboxError::WouldDeadlock);
        }

        let (reply_tx, reply_rx) = channel::bounded(1);
        let sent = self.send(Box::new(move || {
            // The requester may have given up
            let _ = reply_tx.send(f());
        }));
        // `f` may have run before the close was noticed
        if let Err(err) = sent {
            return reply_rx.try_recv().map_err(|_| err);
        }
        reply_rx.recv().map_err(|_| MailboxError::Closed)
    }

    /// Stop delivering and release the active object so `run` can finish.
    ///
    /// Callable from any thread. Messages still queued when the delivery hook
    /// observes the close are dropped; pending requests fail with
    /// [`MailboxError::Closed`].
    pub fn close(&self) {
        if self.inner.queue.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(object = %self.id(), pending = self.pending(), "mailbox closing");
        self.inner.queue.settle(&self.inner.object);
    }

    fn send(&self, message: Message) -> Result<(), MailboxError> {
        if self.inner.object.scheduler().is_scheduler_thread() {
            return self.send_local(message);
        }

        let queue = &self.inner.queue;
        let sent = {
            let _gate = queue.gate.lock();
            if queue.is_closed() {
                Err(MailboxError::Closed)
            } else {
                self.inner
                    .tx
                    .send(message)
                    .map_err(|_| MailboxError::Closed)
                    .and_then(|()| self.kick())
            }
        };
        queue.settle(&self.inner.object);
        sent
    }

    /// Scheduler-thread send: never blocks
    fn send_local(&self, message: Message) -> Result<(), MailboxError> {
        if self.is_closed() || !self.inner.object.is_registered() {
            return Err(MailboxError::Closed);
        }
        self.inner
            .tx
            .send(message)
            .map_err(|_| MailboxError::Closed)?;
        // Inside the delivery hook the object is idle and the drain loop
        // picks the message up.
        self.inner.queue.settle(&self.inner.object);
        Ok(())
    }

    /// Get the queued message delivered. Caller holds the gate.
    fn kick(&self) -> Result<(), MailboxError> {
        let object = &self.inner.object;
        let queue = &self.inner.queue;
        let mut pass = queue.pass_lock.lock();
        loop {
            if !object.is_registered() {
                drop(pass);
                self.discard();
                return Err(MailboxError::Closed);
            }
            if object.is_active() {
                drop(pass);
                // Nobody else can complete it while we hold the gate
                object.complete();
                return Ok(());
            }
            // Completed by the scheduler thread, or mid-delivery. The pass
            // that follows drains the queue, then signals under this lock.
            queue.pass_end.wait(&mut pass);
        }
    }

    /// Drop messages stranded after the object was deleted
    fn discard(&self) {
        let dropped = self.inner.queue.rx.try_iter().count();
        if dropped > 0 {
            tracing::debug!(object = %self.id(), dropped, "mailbox discarded messages");
        }
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("id", &self.id())
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}
