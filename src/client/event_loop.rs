//! Event dispatch bridge
//!
//! The connection's descriptor is registered with a calloop `Generic` source
//! for read readiness. Every wakeup drains the socket, dispatches everything
//! queued and flushes whatever the handlers sent. A flush that hits a full
//! socket leaves the rest queued and is retried on a short timer. The loop
//! stops once the client has recorded an exit reason.

use std::io;
use std::time::Duration;

use calloop::generic::Generic;
use calloop::{EventLoop, Interest, Mode, PostAction};
use log::{debug, info, trace};
use wayland_client::backend::WaylandError;
use wayland_client::EventQueue;

use super::{App, ExitReason};
use crate::error::ClientError;

/// Wait between flush attempts while the compositor is not reading
pub const FLUSH_RETRY: Duration = Duration::from_millis(10);

/// The three operations the bridge needs from a connection
pub trait ConnectionQueue<D> {
    /// Reads whatever the socket has without blocking
    fn read_available(&mut self) -> Result<(), ClientError>;

    /// Runs handlers for every queued event; returns how many ran
    fn dispatch_pending(&mut self, state: &mut D) -> Result<usize, ClientError>;

    /// Sends queued requests; `Ok(false)` when the socket is full and some remain
    fn flush(&mut self) -> Result<bool, ClientError>;
}

fn would_block(err: &WaylandError) -> bool {
    matches!(err, WaylandError::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
}

impl<D: 'static> ConnectionQueue<D> for EventQueue<D> {
    fn read_available(&mut self) -> Result<(), ClientError> {
        // None means events are already queued; dispatch those first.
        let Some(guard) = self.prepare_read() else {
            return Ok(());
        };
        match guard.read() {
            Ok(_) => Ok(()),
            Err(err) if would_block(&err) => Ok(()),
            Err(err) => Err(ClientError::dispatch("read", err)),
        }
    }

    fn dispatch_pending(&mut self, state: &mut D) -> Result<usize, ClientError> {
        EventQueue::dispatch_pending(self, state).map_err(|e| ClientError::dispatch("dispatch", e))
    }

    fn flush(&mut self) -> Result<bool, ClientError> {
        match EventQueue::flush(self) {
            Ok(()) => Ok(true),
            Err(err) if would_block(&err) => Ok(false),
            Err(err) => Err(ClientError::dispatch("flush", err)),
        }
    }
}

/// Outcome of one [`pump`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pumped {
    pub dispatched: usize,
    /// Requests are still waiting for room in the socket
    pub backlog: bool,
}

/// One readiness notification's worth of protocol work
pub fn pump<D, Q>(queue: &mut Q, state: &mut D) -> Result<Pumped, ClientError>
where
    Q: ConnectionQueue<D>,
{
    queue.read_available()?;
    let dispatched = queue.dispatch_pending(state)?;
    let backlog = !queue.flush()?;
    Ok(Pumped { dispatched, backlog })
}

/// Loop-owned state: the client context and its event queue
pub struct Session {
    pub app: App,
    pub queue: EventQueue<App>,
    backlog: bool,
}

impl Session {
    pub fn new(app: App, queue: EventQueue<App>) -> Self {
        Self {
            app,
            queue,
            backlog: false,
        }
    }

    fn pump(&mut self) {
        match pump(&mut self.queue, &mut self.app) {
            Ok(pumped) => {
                if pumped.dispatched > 0 {
                    debug!("Dispatched {} events", pumped.dispatched);
                }
                self.note_backlog(pumped.backlog);
            }
            Err(err) => self.app.fail(err),
        }
    }

    fn retry_flush(&mut self) {
        match ConnectionQueue::<App>::flush(&mut self.queue) {
            Ok(done) => self.note_backlog(!done),
            Err(err) => self.app.fail(err),
        }
    }

    fn note_backlog(&mut self, backlog: bool) {
        if backlog && !self.backlog {
            debug!("Compositor socket full; holding requests");
        } else if !backlog && self.backlog {
            trace!("Request backlog flushed");
        }
        self.backlog = backlog;
    }
}

/// Runs until the primary surface closes or the connection fails
pub fn run(mut session: Session) -> Result<ExitReason, ClientError> {
    let mut event_loop: EventLoop<Session> =
        EventLoop::try_new().map_err(|e| ClientError::EventLoop(e.to_string()))?;

    let fd = session
        .app
        .connection()
        .backend()
        .poll_fd()
        .try_clone_to_owned()
        .map_err(|e| ClientError::EventLoop(format!("cannot duplicate connection fd: {}", e)))?;

    event_loop
        .handle()
        .insert_source(
            Generic::new(fd, Interest::READ, Mode::Level),
            |_, _, session: &mut Session| {
                session.pump();
                Ok(PostAction::Continue)
            },
        )
        .map_err(|e| ClientError::EventLoop(e.error.to_string()))?;

    // Requests issued during setup and events that arrived with the
    // discovery round-trip are handled before the first wait.
    session.pump();

    if session.app.exit_reason().is_none() {
        info!("Entering event loop");
    }
    while session.app.exit_reason().is_none() {
        let timeout = session.backlog.then_some(FLUSH_RETRY);
        event_loop
            .dispatch(timeout, &mut session)
            .map_err(|e| ClientError::EventLoop(e.to_string()))?;
        if session.backlog && session.app.exit_reason().is_none() {
            session.retry_flush();
        }
    }

    match session.app.take_exit() {
        Some(reason) => Ok(reason),
        None => Err(ClientError::EventLoop("event loop stopped unexpectedly".into())),
    }
}
