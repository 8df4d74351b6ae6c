use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::core::{Callback, FrameHost, TimerHandle};

/// Default spacing between frame callbacks: one 60 Hz frame.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_nanos(16_666_667);

/// Lifecycle of a [`FrameClock`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ClockState {
    Initial,
    Running,
    Stopped,
}

type FrameCallback = Rc<RefCell<dyn FnMut(Duration)>>;

struct ClockCore {
    state:      ClockState,
    interval:   Option<Duration>,
    /// Host time the current run segment counts from. After a resume this is
    /// synthetic: `now - elapsed_at_stop`.
    start_time: Option<Duration>,
    /// Elapsed time recorded by the last `stop`.
    stopped_at: Option<Duration>,
    last_tick:  Duration,
    pending:    Option<TimerHandle>,
    frames:     u64,
}

struct Shared {
    host:     Rc<dyn FrameHost>,
    core:     RefCell<ClockCore>,
    on_frame: RefCell<FrameCallback>,
}

/// Start/stop/resume timeline on top of a [`FrameHost`].
///
/// While running, the clock ticks on every host frame (or every `interval`
/// when the host has no frame primitive) and calls the registered frame
/// callback with the time elapsed since `start`, at most once per `interval`.
///
/// Handles are cheap to clone and share the same clock.
#[derive(Clone)]
pub struct FrameClock {
    shared: Rc<Shared>,
}

impl FrameClock {
    pub fn new(host: Rc<dyn FrameHost>) -> Self {
        let noop: FrameCallback = Rc::new(RefCell::new(|_: Duration| {}));
        Self {
            shared: Rc::new(Shared {
                host,
                core: RefCell::new(ClockCore {
                    state:      ClockState::Initial,
                    interval:   None,
                    start_time: None,
                    stopped_at: None,
                    last_tick:  Duration::ZERO,
                    pending:    None,
                    frames:     0,
                }),
                on_frame: RefCell::new(noop),
            }),
        }
    }

    pub fn state(&self) -> ClockState {
        self.shared.core.borrow().state
    }

    pub fn interval(&self) -> Option<Duration> {
        self.shared.core.borrow().interval
    }

    /// Number of frame callbacks delivered so far.
    pub fn frames(&self) -> u64 {
        self.shared.core.borrow().frames
    }

    /// Elapsed time of the current run segment.
    ///
    /// Live while running, frozen at the value recorded by `stop` while
    /// stopped, zero before the first start.
    pub fn elapsed(&self) -> Duration {
        let core = self.shared.core.borrow();
        match (core.state, core.start_time) {
            (ClockState::Running, Some(start)) => self.shared.host.now().saturating_sub(start),
            (ClockState::Stopped, _) => core.stopped_at.unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    /// Replaces the frame callback.
    ///
    /// Safe to call from inside the current callback; the replacement is used
    /// from the next tick on.
    pub fn set_on_frame<F>(&self, f: F)
    where
        F: FnMut(Duration) + 'static,
    {
        let callback: FrameCallback = Rc::new(RefCell::new(f));
        *self.shared.on_frame.borrow_mut() = callback;
    }

    /// Starts ticking. `None` or a zero interval uses [`DEFAULT_FRAME_INTERVAL`].
    ///
    /// Starting a running clock does nothing.
    pub fn start(&self, interval: Option<Duration>) {
        let now = self.shared.host.now();
        let mut core = self.shared.core.borrow_mut();
        if core.state == ClockState::Running {
            return;
        }
        core.state = ClockState::Running;
        core.interval = Some(interval.filter(|d| !d.is_zero()).unwrap_or(DEFAULT_FRAME_INTERVAL));
        core.stopped_at = None;
        begin(&self.shared, &mut core, now, now);
        log::trace!("frame clock started (interval {:?})", core.interval);
    }

    /// Stops ticking and remembers the elapsed time for `resume`.
    pub fn stop(&self) {
        let now = self.shared.host.now();
        let pending = {
            let mut core = self.shared.core.borrow_mut();
            if core.state != ClockState::Running {
                return;
            }
            core.state = ClockState::Stopped;
            if let Some(start) = core.start_time {
                core.stopped_at = Some(now.saturating_sub(start));
            }
            core.pending.take()
        };
        if let Some(handle) = pending {
            self.shared.host.cancel(handle);
        }
        log::trace!("frame clock stopped");
    }

    /// Continues a stopped clock where it left off.
    ///
    /// Elapsed values keep counting from the value recorded by `stop`. Does
    /// nothing unless a full start/stop cycle has happened.
    pub fn resume(&self) {
        let now = self.shared.host.now();
        let mut core = self.shared.core.borrow_mut();
        if core.state != ClockState::Stopped {
            return;
        }
        let (Some(elapsed), Some(_)) = (core.stopped_at, core.interval) else {
            return;
        };
        core.state = ClockState::Running;
        begin(&self.shared, &mut core, now.saturating_sub(elapsed), now);
        log::trace!("frame clock resumed at {elapsed:?}");
    }
}

fn begin(shared: &Rc<Shared>, core: &mut ClockCore, start_time: Duration, now: Duration) {
    core.start_time = Some(start_time);
    core.last_tick = now;
    core.pending = Some(schedule(shared, core.interval.unwrap_or(DEFAULT_FRAME_INTERVAL)));
}

fn schedule(shared: &Rc<Shared>, interval: Duration) -> TimerHandle {
    let weak: Weak<Shared> = Rc::downgrade(shared);
    let callback: Callback = Box::new(move || {
        if let Some(shared) = weak.upgrade() {
            tick(&shared);
        }
    });
    if shared.host.supports_frame_requests() {
        shared.host.request_frame(callback)
    } else {
        shared.host.set_timeout(interval, callback)
    }
}

fn tick(shared: &Rc<Shared>) {
    let elapsed = {
        let mut core = shared.core.borrow_mut();
        if core.state != ClockState::Running {
            return;
        }
        let interval = core.interval.unwrap_or(DEFAULT_FRAME_INTERVAL);
        // Reschedule before anything else so the frame chain never breaks.
        core.pending = Some(schedule(shared, interval));

        let now = shared.host.now();
        if now.saturating_sub(core.last_tick) < interval {
            return;
        }
        core.last_tick = now;
        core.frames += 1;
        now.saturating_sub(core.start_time.unwrap_or(now))
    };

    let callback = shared.on_frame.borrow().clone();
    match callback.try_borrow_mut() {
        Ok(mut f) => (&mut *f)(elapsed),
        Err(_) => log::warn!("frame callback re-entered; tick at {elapsed:?} dropped"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::{EventLoop, LoopConfig};
    use std::cell::Cell;

    fn ms(v: u64) -> Duration { Duration::from_millis(v) }

    fn setup(frame_ms: Option<u64>) -> (EventLoop, FrameClock, Rc<RefCell<Vec<Duration>>>) {
        let ev = EventLoop::manual(LoopConfig { frame_period: frame_ms.map(ms) });
        let clock = FrameClock::new(ev.host());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        clock.set_on_frame(move |elapsed| s.borrow_mut().push(elapsed));
        (ev, clock, seen)
    }

    // ── start ─────────────────────────────────────────────────────────────

    #[test]
    fn ticks_are_spaced_by_interval() {
        let (ev, clock, seen) = setup(Some(10));
        clock.start(Some(ms(30)));
        ev.advance(ms(100)).unwrap();
        assert_eq!(*seen.borrow(), vec![ms(30), ms(60), ms(90)]);
        assert_eq!(clock.frames(), 3);
    }

    #[test]
    fn start_is_not_synchronous() {
        let (_ev, clock, seen) = setup(Some(10));
        clock.start(Some(Duration::ZERO));
        assert!(seen.borrow().is_empty());
        assert_eq!(clock.state(), ClockState::Running);
    }

    #[test]
    fn start_while_running_is_ignored() {
        let (ev, clock, seen) = setup(Some(10));
        clock.start(Some(ms(20)));
        ev.advance(ms(20)).unwrap();
        clock.start(Some(ms(50)));
        assert_eq!(clock.interval(), Some(ms(20)));
        ev.advance(ms(20)).unwrap();
        assert_eq!(*seen.borrow(), vec![ms(20), ms(40)]);
    }

    #[test]
    fn default_interval_is_one_frame() {
        let (_ev, clock, _) = setup(None);
        clock.start(None);
        assert_eq!(clock.interval(), Some(DEFAULT_FRAME_INTERVAL));
    }

    #[test]
    fn zero_interval_means_default() {
        let (ev, clock, seen) = setup(Some(10));
        clock.start(Some(Duration::ZERO));
        assert_eq!(clock.interval(), Some(DEFAULT_FRAME_INTERVAL));
        ev.advance(ms(10)).unwrap();
        assert!(seen.borrow().is_empty());
        ev.advance(ms(10)).unwrap();
        assert_eq!(*seen.borrow(), vec![ms(20)]);
    }

    #[test]
    fn falls_back_to_timeouts_without_frame_primitive() {
        let (ev, clock, seen) = setup(None);
        clock.start(Some(ms(25)));
        ev.advance(ms(80)).unwrap();
        assert_eq!(*seen.borrow(), vec![ms(25), ms(50), ms(75)]);
    }

    // ── stop / resume ─────────────────────────────────────────────────────

    #[test]
    fn stop_cancels_pending_tick() {
        let (ev, clock, seen) = setup(Some(10));
        clock.start(Some(ms(10)));
        ev.advance(ms(30)).unwrap();
        clock.stop();
        clock.stop();
        assert_eq!(ev.pending(), 0);
        ev.advance(ms(100)).unwrap();
        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(clock.elapsed(), ms(30));
    }

    #[test]
    fn resume_continues_elapsed_time() {
        let (ev, clock, seen) = setup(Some(10));
        clock.start(Some(ms(20)));
        ev.advance(ms(45)).unwrap();
        clock.stop();
        let at_stop = clock.elapsed();
        assert_eq!(at_stop, ms(45));

        ev.advance(ms(500)).unwrap();
        clock.resume();
        ev.advance(ms(40)).unwrap();

        let seen = seen.borrow();
        let after: Vec<_> = seen.iter().copied().filter(|e| *e > ms(40)).collect();
        assert!(!after.is_empty());
        assert!(after.iter().all(|e| *e >= at_stop && *e < ms(100)));
    }

    #[test]
    fn resume_without_stop_cycle_is_dormant() {
        let (ev, clock, seen) = setup(Some(10));
        clock.resume();
        assert_eq!(clock.state(), ClockState::Initial);
        ev.advance(ms(100)).unwrap();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn start_after_stop_resets_elapsed() {
        let (ev, clock, seen) = setup(Some(10));
        clock.start(Some(ms(10)));
        ev.advance(ms(50)).unwrap();
        clock.stop();
        seen.borrow_mut().clear();
        clock.start(Some(ms(10)));
        ev.advance(ms(10)).unwrap();
        assert_eq!(*seen.borrow(), vec![ms(10)]);
    }

    // ── callback slot ─────────────────────────────────────────────────────

    #[test]
    fn callback_can_stop_its_own_clock() {
        let ev = EventLoop::manual(LoopConfig { frame_period: Some(ms(10)) });
        let clock = FrameClock::new(ev.host());
        let calls = Rc::new(Cell::new(0));
        let (c, handle) = (calls.clone(), clock.clone());
        clock.set_on_frame(move |_| {
            c.set(c.get() + 1);
            handle.stop();
        });
        clock.start(Some(ms(10)));
        ev.run_until_idle().unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(clock.state(), ClockState::Stopped);
    }

    #[test]
    fn callback_can_replace_itself() {
        let ev = EventLoop::manual(LoopConfig { frame_period: Some(ms(10)) });
        let clock = FrameClock::new(ev.host());
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l, handle) = (log.clone(), clock.clone());
        clock.set_on_frame(move |_| {
            l.borrow_mut().push("first");
            let l2 = l.clone();
            handle.set_on_frame(move |_| l2.borrow_mut().push("second"));
        });
        clock.start(Some(ms(10)));
        ev.advance(ms(30)).unwrap();
        assert_eq!(*log.borrow(), vec!["first", "second", "second"]);
    }
}
