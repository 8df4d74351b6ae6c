use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;
use std::time::Duration;

use kinema_engine::core::{FrameHost, TimerHandle};
use kinema_engine::event_loop::EventLoop;
use kinema_engine::time::FrameClock;

use crate::loader::ImageLoader;

use super::task::{AsyncBody, Body, SyncBody, Task};

/// Step interval used by `start` when none is given.
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_millis(80);

/// Lifecycle of an [`Animation`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AnimationState {
    /// Not started, finished, or disposed. Only this state accepts new tasks.
    Initial,
    Running,
    Paused,
}

struct Core {
    tasks:  Vec<Task>,
    cursor: usize,
    state:  AnimationState,
    /// Dispatch token. Every dispatch, completion and dispose bumps it; a
    /// continuation only acts while its token is still current.
    step:   u64,

    driving: bool,
    redrive: bool,
    /// A drive was refused while paused; `resume` owes the chain one.
    stalled: bool,
    frame_task_active: bool,
    wait_timer: Option<TimerHandle>,

    clock:      FrameClock,
    preload_ok: Option<bool>,
}

pub(super) struct Inner {
    host:                 Rc<dyn FrameHost>,
    pub(super) loader:    ImageLoader,
    /// Shared with the built-in frame tasks, which index frames by it.
    pub(super) interval:  Rc<Cell<Duration>>,
    core:                 RefCell<Core>,
}

impl Inner {
    pub(super) fn record_preload(&self, ok: bool) {
        self.core.borrow_mut().preload_ok = Some(ok);
    }
}

enum Dispatch {
    Idle,
    Finished,
    Sync { index: usize, body: SyncBody, next: Continuation },
    Frame { index: usize, body: AsyncBody, step: u64, clock: FrameClock },
}

#[derive(Copy, Clone, Debug)]
enum Move {
    Forward,
    Back,
}

/// Completion handle given to a task body.
///
/// Calling [`proceed`](Continuation::proceed) moves the chain past the task.
/// Only the first completion of a dispatch counts: continuations left over
/// from an earlier dispatch, or from before `dispose`, do nothing.
///
/// A continuation keeps its chain alive until it is completed or dropped.
pub struct Continuation {
    chain:      Rc<Inner>,
    step:       u64,
    from_frame: bool,
}

impl Continuation {
    pub fn proceed(self) {
        self.advance(Move::Forward);
    }

    /// Steps the cursor back onto the previous task and runs it again.
    pub(crate) fn rewind(self) {
        self.advance(Move::Back);
    }

    /// Whether calling `proceed` would still have an effect.
    pub fn is_current(&self) -> bool {
        self.chain.core.borrow().step == self.step
    }

    fn advance(self, dir: Move) {
        let inner = self.chain;

        let (clock, wait) = {
            let mut core = inner.core.borrow_mut();
            if core.step != self.step {
                log::trace!("stale continuation ignored");
                return;
            }
            core.step += 1;

            let clock = if self.from_frame {
                core.frame_task_active = false;
                Some(core.clock.clone())
            } else {
                None
            };

            let wait = match dir {
                Move::Back if core.cursor > 0 => {
                    core.cursor -= 1;
                    None
                }
                _ => {
                    if let Move::Back = dir {
                        log::warn!("repeat at the head of the chain has nothing to rewind to");
                    }
                    let wait = core.tasks.get(core.cursor).and_then(Task::wait);
                    core.cursor += 1;
                    wait
                }
            };
            (clock, wait)
        };

        if let Some(clock) = clock {
            clock.stop();
            // The installed frame callback owns the chain; release it.
            clock.set_on_frame(|_| {});
        }
        match wait {
            Some(delay) => schedule_drive(&inner, delay),
            None => drive(&inner),
        }
    }
}

/// Chainable frame-animation task list.
///
/// Build the chain with the step methods (`preload_images`, `then`,
/// `animate_background_position`, ...), then call [`start`](Animation::start).
/// The handle is cheap to clone; clones control the same chain.
///
/// A started chain stays alive without any handle for as long as it has
/// pending work: a scheduled wait, a running frame task, or an outstanding
/// continuation. A chain whose continuation was dropped is freed with its
/// last handle. A chain paused inside a frame task keeps itself alive through
/// its clock until `dispose`.
///
/// ```rust,ignore
/// let anim = Animation::new(&event_loop)
///     .preload_images(["rabbit-big.png"])
///     .animate_background_position(sprite, positions, Some("rabbit-big.png"))
///     .repeat(Some(3))
///     .then(|| log::info!("done"));
/// anim.start_with_interval(Duration::from_millis(150));
/// ```
#[derive(Clone)]
pub struct Animation {
    pub(super) inner: Rc<Inner>,
}

impl Animation {
    /// Chain on `event_loop` whose preloads decode images from disk.
    pub fn new(event_loop: &EventLoop) -> Self {
        Self::with_loader(ImageLoader::decoding(event_loop))
    }

    /// Chain on the loader's host, preloading through `loader`.
    pub fn with_loader(loader: ImageLoader) -> Self {
        let host = loader.host().clone();
        let clock = FrameClock::new(host.clone());
        Self {
            inner: Rc::new(Inner {
                host,
                loader,
                interval: Rc::new(Cell::new(DEFAULT_STEP_INTERVAL)),
                core: RefCell::new(Core {
                    tasks: Vec::new(),
                    cursor: 0,
                    state: AnimationState::Initial,
                    step: 0,
                    driving: false,
                    redrive: false,
                    stalled: false,
                    frame_task_active: false,
                    wait_timer: None,
                    clock,
                    preload_ok: None,
                }),
            }),
        }
    }

    // ── building ──────────────────────────────────────────────────────────

    pub(super) fn add(self, task: Task) -> Self {
        {
            let mut core = self.inner.core.borrow_mut();
            if core.state == AnimationState::Initial {
                core.tasks.push(task);
            } else {
                log::warn!("{:?} task added to a started animation; ignored", task.kind());
            }
        }
        self
    }

    /// Delays the start of the next task by `delay` once the last added task
    /// finishes. Does nothing on an empty chain.
    pub fn wait(self, delay: Duration) -> Self {
        {
            let mut core = self.inner.core.borrow_mut();
            if core.state != AnimationState::Initial {
                log::warn!("wait({delay:?}) on a started animation; ignored");
            } else if let Some(last) = core.tasks.last_mut() {
                last.wait = Some(delay);
            }
        }
        self
    }

    // ── control ───────────────────────────────────────────────────────────

    /// Starts with [`DEFAULT_STEP_INTERVAL`].
    pub fn start(&self) {
        self.start_inner(None);
    }

    /// Starts with `interval` between animation steps. A zero interval means
    /// [`DEFAULT_STEP_INTERVAL`].
    pub fn start_with_interval(&self, interval: Duration) {
        self.start_inner(Some(interval));
    }

    fn start_inner(&self, interval: Option<Duration>) {
        let (stale_timer, len, cursor) = {
            let mut core = self.inner.core.borrow_mut();
            if core.state == AnimationState::Running || core.tasks.is_empty() {
                return;
            }
            core.state = AnimationState::Running;
            core.step += 1;
            core.stalled = false;
            core.frame_task_active = false;
            (core.wait_timer.take(), core.tasks.len(), core.cursor)
        };
        if let Some(timer) = stale_timer {
            self.inner.host.cancel(timer);
        }

        let interval = interval.filter(|d| !d.is_zero()).unwrap_or(DEFAULT_STEP_INTERVAL);
        self.inner.interval.set(interval);
        log::debug!("animation started at task {cursor}/{len}, step interval {interval:?}");
        drive(&self.inner);
    }

    /// Suspends the chain; the current frame task keeps its progress.
    pub fn pause(&self) {
        let clock = {
            let mut core = self.inner.core.borrow_mut();
            if core.state != AnimationState::Running {
                return;
            }
            core.state = AnimationState::Paused;
            core.clock.clone()
        };
        clock.stop();
        log::debug!("animation paused");
    }

    /// Continues a paused chain.
    ///
    /// A paused frame task picks up at its paused elapsed time. Work that
    /// completed while paused (a preload, a wait) is picked up here.
    pub fn resume(&self) {
        enum Resume {
            Clock(FrameClock),
            Drive,
            Nothing,
        }
        let action = {
            let mut core = self.inner.core.borrow_mut();
            if core.state != AnimationState::Paused {
                return;
            }
            core.state = AnimationState::Running;
            if core.frame_task_active {
                Resume::Clock(core.clock.clone())
            } else if mem::take(&mut core.stalled) {
                Resume::Drive
            } else {
                Resume::Nothing
            }
        };
        log::debug!("animation resumed");
        match action {
            Resume::Clock(clock) => clock.resume(),
            Resume::Drive => drive(&self.inner),
            Resume::Nothing => {}
        }
    }

    /// Stops everything and empties the chain.
    ///
    /// The frame clock is replaced by a fresh one, so the same handle can be
    /// rebuilt and started again. Runs automatically after the last task.
    pub fn dispose(&self) {
        let (clock, timer, tasks) = {
            let mut core = self.inner.core.borrow_mut();
            if core.state == AnimationState::Initial {
                return;
            }
            core.state = AnimationState::Initial;
            core.cursor = 0;
            core.step += 1;
            core.stalled = false;
            core.frame_task_active = false;
            let fresh = FrameClock::new(self.inner.host.clone());
            (
                mem::replace(&mut core.clock, fresh),
                core.wait_timer.take(),
                mem::take(&mut core.tasks),
            )
        };
        clock.stop();
        if let Some(timer) = timer {
            self.inner.host.cancel(timer);
        }
        // Task closures and the old clock's callback may own the chain; drop
        // them outside the borrow.
        drop(tasks);
        drop(clock);
        log::debug!("animation disposed");
    }

    // ── inspection ────────────────────────────────────────────────────────

    pub fn state(&self) -> AnimationState {
        self.inner.core.borrow().state
    }

    /// Index of the task currently eligible to run.
    pub fn cursor(&self) -> usize {
        self.inner.core.borrow().cursor
    }

    pub fn len(&self) -> usize {
        self.inner.core.borrow().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Step interval of the current (or last) run.
    pub fn interval(&self) -> Duration {
        self.inner.interval.get()
    }

    /// Outcome of the most recent `preload_images` step, if one finished.
    ///
    /// The chain proceeds either way; this is for callers that care.
    pub fn last_preload_ok(&self) -> Option<bool> {
        self.inner.core.borrow().preload_ok
    }

    /// The clock currently driving frame tasks.
    pub fn clock(&self) -> FrameClock {
        self.inner.core.borrow().clock.clone()
    }
}

impl Inner {
    fn next_dispatch(self: &Rc<Self>) -> Dispatch {
        let mut core = self.core.borrow_mut();
        match core.state {
            AnimationState::Running => {}
            AnimationState::Paused => {
                core.stalled = true;
                return Dispatch::Idle;
            }
            AnimationState::Initial => return Dispatch::Idle,
        }
        if core.cursor >= core.tasks.len() {
            return Dispatch::Finished;
        }

        core.step += 1;
        let step = core.step;
        let index = core.cursor;
        match core.tasks[index].body.clone() {
            Body::Sync(body) => {
                let next = Continuation { chain: self.clone(), step, from_frame: false };
                Dispatch::Sync { index, body, next }
            }
            Body::Async(body) => {
                core.frame_task_active = true;
                Dispatch::Frame { index, body, step, clock: core.clock.clone() }
            }
        }
    }

    fn install_frame_task(self: &Rc<Self>, index: usize, body: AsyncBody, step: u64, clock: FrameClock) {
        let chain = self.clone();
        clock.set_on_frame(move |elapsed| {
            let next = Continuation { chain: chain.clone(), step, from_frame: true };
            match body.try_borrow_mut() {
                Ok(mut f) => (&mut *f)(next, elapsed),
                Err(_) => log::warn!("frame task {index} re-entered; tick dropped"),
            }
        });
        clock.start(Some(self.interval.get()));
    }
}

/// Runs tasks from the cursor until one of them yields.
///
/// Re-entrant calls (a sync task proceeding from inside its own body) only
/// flag another round for the loop that is already running, so the stack
/// stays flat however long the chain of sync tasks is.
fn drive(inner: &Rc<Inner>) {
    {
        let mut core = inner.core.borrow_mut();
        if core.driving {
            core.redrive = true;
            return;
        }
        core.driving = true;
    }

    loop {
        match inner.next_dispatch() {
            Dispatch::Idle => {}
            Dispatch::Finished => {
                log::debug!("animation finished");
                Animation { inner: inner.clone() }.dispose();
            }
            Dispatch::Sync { index, body, next } => {
                log::trace!("running task {index}");
                match body.try_borrow_mut() {
                    Ok(mut f) => (&mut *f)(next),
                    Err(_) => log::warn!("task {index} is already running; dispatch skipped"),
                }
            }
            Dispatch::Frame { index, body, step, clock } => {
                log::trace!("starting frame task {index}");
                inner.install_frame_task(index, body, step, clock);
            }
        }

        let mut core = inner.core.borrow_mut();
        if !core.redrive {
            core.driving = false;
            break;
        }
        core.redrive = false;
    }
}

fn schedule_drive(inner: &Rc<Inner>, delay: Duration) {
    let chain = inner.clone();
    let handle = inner.host.set_timeout(
        delay,
        Box::new(move || {
            chain.core.borrow_mut().wait_timer = None;
            drive(&chain);
        }),
    );
    let previous = inner.core.borrow_mut().wait_timer.replace(handle);
    if let Some(previous) = previous {
        inner.host.cancel(previous);
    }
}
