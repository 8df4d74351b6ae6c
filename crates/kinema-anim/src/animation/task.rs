use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::chain::Continuation;

pub(crate) type SyncBody = Rc<RefCell<dyn FnMut(Continuation)>>;
pub(crate) type AsyncBody = Rc<RefCell<dyn FnMut(Continuation, Duration)>>;

#[derive(Clone)]
pub(crate) enum Body {
    Sync(SyncBody),
    Async(AsyncBody),
}

/// Whether a task completes in one call or runs per frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum TaskKind {
    Sync,
    Async,
}

/// One step of an [`Animation`](super::Animation).
///
/// Bodies are reference counted so the driver can call them without holding
/// a borrow of the chain, and so a body survives `dispose` while it runs.
pub(crate) struct Task {
    pub(crate) body: Body,
    pub(crate) wait: Option<Duration>,
}

impl Task {
    /// A step that runs once and calls `proceed` on its continuation when done.
    pub(crate) fn sync<F>(f: F) -> Self
    where
        F: FnMut(Continuation) + 'static,
    {
        let body: SyncBody = Rc::new(RefCell::new(f));
        Self { body: Body::Sync(body), wait: None }
    }

    /// A step called on every qualifying frame with the elapsed time, until it
    /// calls `proceed`.
    pub(crate) fn per_frame<F>(f: F) -> Self
    where
        F: FnMut(Continuation, Duration) + 'static,
    {
        let body: AsyncBody = Rc::new(RefCell::new(f));
        Self { body: Body::Async(body), wait: None }
    }

    pub(crate) fn kind(&self) -> TaskKind {
        match self.body {
            Body::Sync(_) => TaskKind::Sync,
            Body::Async(_) => TaskKind::Async,
        }
    }

    /// Delay between this task finishing and the next one starting.
    pub(crate) fn wait(&self) -> Option<Duration> {
        self.wait
    }
}
