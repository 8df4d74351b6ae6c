use anyhow::{anyhow, bail, Context, Result};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::{Callback, FrameHost, TimerHandle};
use crate::time::DEFAULT_FRAME_INTERVAL;

use super::queue::TimerQueue;

/// Event loop configuration.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Spacing of frame boundaries for `request_frame`.
    ///
    /// `None` models a platform without a native frame primitive: frame
    /// requests still work (at the default 60 Hz cadence) but
    /// `supports_frame_requests` reports `false`, so clocks fall back to
    /// plain timeouts.
    pub frame_period: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_period: Some(DEFAULT_FRAME_INTERVAL),
        }
    }
}

enum TimeSource {
    Realtime(Instant),
    Manual(Cell<Duration>),
}

type JobOutput = Box<dyn Any + Send>;
type JobContinuation = Box<dyn FnOnce(JobOutput)>;

struct JobResult {
    id:     u64,
    output: thread::Result<JobOutput>,
}

struct Shared {
    config:   LoopConfig,
    time:     TimeSource,
    timers:   RefCell<TimerQueue>,
    jobs:     RefCell<HashMap<u64, JobContinuation>>,
    next_job: Cell<u64>,
    tx:       Sender<JobResult>,
    rx:       Receiver<JobResult>,
    fatal:    RefCell<Option<anyhow::Error>>,
}

/// Single-threaded cooperative event loop.
///
/// Owns the timer queue and implements [`FrameHost`]. Cloning yields another
/// handle to the same loop. Two flavours exist:
/// - [`EventLoop::realtime`] follows the wall clock and sleeps between deadlines
/// - [`EventLoop::manual`] keeps virtual time that only moves on [`advance`]
///   or [`run_until_idle`], which makes every schedule deterministic
///
/// [`advance`]: EventLoop::advance
/// [`run_until_idle`]: EventLoop::run_until_idle
#[derive(Clone)]
pub struct EventLoop {
    shared: Rc<Shared>,
}

impl EventLoop {
    pub fn realtime(config: LoopConfig) -> Self {
        Self::with_time(config, TimeSource::Realtime(Instant::now()))
    }

    pub fn manual(config: LoopConfig) -> Self {
        Self::with_time(config, TimeSource::Manual(Cell::new(Duration::ZERO)))
    }

    fn with_time(config: LoopConfig, time: TimeSource) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            shared: Rc::new(Shared {
                config,
                time,
                timers: RefCell::new(TimerQueue::default()),
                jobs: RefCell::new(HashMap::new()),
                next_job: Cell::new(0),
                tx,
                rx,
                fatal: RefCell::new(None),
            }),
        }
    }

    /// Returns this loop as a shareable host handle.
    pub fn host(&self) -> Rc<dyn FrameHost> {
        Rc::new(self.clone())
    }

    pub fn is_manual(&self) -> bool {
        matches!(self.shared.time, TimeSource::Manual(_))
    }

    pub fn config(&self) -> &LoopConfig {
        &self.shared.config
    }

    /// Number of pending timers plus background jobs still in flight.
    pub fn pending(&self) -> usize {
        self.shared.timers.borrow().len() + self.shared.jobs.borrow().len()
    }

    /// Runs `work` away from the loop and hands its result to `then` on the loop.
    ///
    /// Realtime loops run `work` on a dedicated thread. Manual loops run it
    /// inline and deliver the result through a zero-delay timeout, so `then`
    /// is never called from inside `spawn_blocking` in either mode.
    pub fn spawn_blocking<T, W, F>(&self, work: W, then: F)
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        F: FnOnce(T) + 'static,
    {
        if self.is_manual() {
            let out = work();
            self.set_timeout(Duration::ZERO, Box::new(move || then(out)));
            return;
        }

        let id = self.shared.next_job.get() + 1;
        self.shared.next_job.set(id);

        let continuation: JobContinuation = Box::new(move |output| match output.downcast::<T>() {
            Ok(value) => then(*value),
            Err(_) => log::error!("background job {id} returned an unexpected type"),
        });
        self.shared.jobs.borrow_mut().insert(id, continuation);

        let tx = self.shared.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("kinema-job-{id}"))
            .spawn(move || {
                let output = panic::catch_unwind(AssertUnwindSafe(|| Box::new(work()) as JobOutput));
                // The loop may already be gone; nothing left to notify then.
                let _ = tx.send(JobResult { id, output });
            });

        if let Err(e) = spawned {
            self.shared.jobs.borrow_mut().remove(&id);
            let err = anyhow::Error::new(e).context(format!("failed to spawn background job {id}"));
            log::error!("{err:#}");
            self.shared.fatal.borrow_mut().get_or_insert(err);
        }
    }

    /// Moves virtual time forward by `dt`, firing everything that falls due.
    ///
    /// Only valid on manual loops.
    pub fn advance(&self, dt: Duration) -> Result<()> {
        let TimeSource::Manual(now) = &self.shared.time else {
            bail!("advance() requires a manual event loop");
        };
        let target = now.get() + dt;
        self.run_until(Some(target))?;
        now.set(now.get().max(target));
        Ok(())
    }

    /// Runs callbacks until no timers and no background jobs remain.
    ///
    /// A running frame clock reschedules itself forever, so this only returns
    /// once every clock on the loop has been stopped.
    pub fn run_until_idle(&self) -> Result<()> {
        self.run_until(None)
    }

    /// Runs callbacks for at most `d` of loop time, returning early when idle.
    pub fn run_for(&self, d: Duration) -> Result<()> {
        let deadline = self.now() + d;
        self.run_until(Some(deadline))?;
        if let TimeSource::Manual(now) = &self.shared.time {
            now.set(now.get().max(deadline));
        }
        Ok(())
    }

    fn run_until(&self, deadline: Option<Duration>) -> Result<()> {
        loop {
            self.check_fatal()?;
            self.drain_jobs()?;

            let next = self.shared.timers.borrow_mut().next_deadline();
            match next {
                Some(at) if deadline.is_none_or(|d| at <= d) => {
                    self.wait_until(at)?;
                    let due = self.shared.timers.borrow_mut().pop_due(self.now());
                    if let Some((handle, callback)) = due {
                        log::trace!("firing timer {}", handle.id());
                        callback();
                    }
                }
                _ => {
                    if self.shared.jobs.borrow().is_empty() {
                        break;
                    }
                    // Only background jobs are left; block until one reports or
                    // the deadline passes.
                    let received = match deadline {
                        Some(d) => {
                            let left = d.saturating_sub(self.now());
                            if left.is_zero() {
                                break;
                            }
                            self.recv_job(left)?
                        }
                        None => Some(self.shared.rx.recv().context("background job channel closed")?),
                    };
                    if let Some(result) = received {
                        self.finish_job(result)?;
                    }
                }
            }
        }
        self.check_fatal()
    }

    fn wait_until(&self, at: Duration) -> Result<()> {
        match &self.shared.time {
            TimeSource::Manual(now) => {
                now.set(now.get().max(at));
            }
            TimeSource::Realtime(_) => {
                let left = at.saturating_sub(self.now());
                if left.is_zero() {
                    return Ok(());
                }
                if self.shared.jobs.borrow().is_empty() {
                    thread::sleep(left);
                } else if let Some(result) = self.recv_job(left)? {
                    self.finish_job(result)?;
                }
            }
        }
        Ok(())
    }

    fn recv_job(&self, timeout: Duration) -> Result<Option<JobResult>> {
        match self.shared.rx.recv_timeout(timeout) {
            Ok(result) => Ok(Some(result)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("background job channel closed")),
        }
    }

    fn drain_jobs(&self) -> Result<()> {
        while let Ok(result) = self.shared.rx.try_recv() {
            self.finish_job(result)?;
        }
        Ok(())
    }

    fn finish_job(&self, result: JobResult) -> Result<()> {
        let JobResult { id, output } = result;
        let continuation = self.shared.jobs.borrow_mut().remove(&id);
        let Some(continuation) = continuation else {
            log::warn!("result for unknown background job {id}");
            return Ok(());
        };
        match output {
            Ok(value) => {
                continuation(value);
                Ok(())
            }
            Err(_) => Err(anyhow!("background job {id} panicked")),
        }
    }

    fn check_fatal(&self) -> Result<()> {
        match self.shared.fatal.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_frame_boundary(&self, now: Duration) -> Duration {
        let period = self
            .shared
            .config
            .frame_period
            .unwrap_or(DEFAULT_FRAME_INTERVAL)
            .as_nanos()
            .max(1);
        let next = (now.as_nanos() / period + 1) * period;
        Duration::from_nanos(u64::try_from(next).unwrap_or(u64::MAX))
    }
}

impl FrameHost for EventLoop {
    fn now(&self) -> Duration {
        match &self.shared.time {
            TimeSource::Realtime(epoch) => epoch.elapsed(),
            TimeSource::Manual(now) => now.get(),
        }
    }

    fn supports_frame_requests(&self) -> bool {
        self.shared.config.frame_period.is_some()
    }

    fn request_frame(&self, callback: Callback) -> TimerHandle {
        let at = self.next_frame_boundary(self.now());
        self.shared.timers.borrow_mut().push(at, callback)
    }

    fn set_timeout(&self, delay: Duration, callback: Callback) -> TimerHandle {
        let at = self.now() + delay;
        self.shared.timers.borrow_mut().push(at, callback)
    }

    fn cancel(&self, handle: TimerHandle) {
        if self.shared.timers.borrow_mut().cancel(handle) {
            log::trace!("cancelled timer {}", handle.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration { Duration::from_millis(v) }

    fn manual() -> EventLoop { EventLoop::manual(LoopConfig::default()) }

    fn push_on(log: &Rc<RefCell<Vec<String>>>, host: &EventLoop, tag: &'static str) -> Callback {
        let log = log.clone();
        let host = host.clone();
        Box::new(move || log.borrow_mut().push(format!("{tag}@{}", host.now().as_millis())))
    }

    // ── timeouts ──────────────────────────────────────────────────────────

    #[test]
    fn advance_fires_due_timeouts_at_their_deadline() {
        let ev = manual();
        let log = Rc::new(RefCell::new(Vec::new()));
        ev.set_timeout(ms(30), push_on(&log, &ev, "b"));
        ev.set_timeout(ms(10), push_on(&log, &ev, "a"));
        ev.set_timeout(ms(90), push_on(&log, &ev, "c"));

        ev.advance(ms(50)).unwrap();
        assert_eq!(*log.borrow(), vec!["a@10", "b@30"]);
        assert_eq!(ev.now(), ms(50));
        assert_eq!(ev.pending(), 1);
    }

    #[test]
    fn callbacks_scheduled_from_callbacks_run_in_same_advance() {
        let ev = manual();
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = push_on(&log, &ev, "inner");
        let ev2 = ev.clone();
        ev.set_timeout(ms(5), Box::new(move || {
            ev2.set_timeout(ms(5), inner);
        }));
        ev.advance(ms(20)).unwrap();
        assert_eq!(*log.borrow(), vec!["inner@10"]);
    }

    #[test]
    fn cancelled_timeout_never_fires() {
        let ev = manual();
        let log = Rc::new(RefCell::new(Vec::new()));
        let h = ev.set_timeout(ms(5), push_on(&log, &ev, "x"));
        ev.cancel(h);
        ev.cancel(h);
        ev.run_until_idle().unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn zero_delay_is_not_synchronous() {
        let ev = manual();
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        ev.set_timeout(Duration::ZERO, Box::new(move || h.set(true)));
        assert!(!hit.get());
        ev.advance(Duration::ZERO).unwrap();
        assert!(hit.get());
    }

    // ── frames ────────────────────────────────────────────────────────────

    #[test]
    fn frame_requests_land_on_next_boundary() {
        let ev = EventLoop::manual(LoopConfig { frame_period: Some(ms(10)) });
        let log = Rc::new(RefCell::new(Vec::new()));
        ev.advance(ms(3)).unwrap();
        ev.request_frame(push_on(&log, &ev, "f"));
        ev.advance(ms(20)).unwrap();
        assert_eq!(*log.borrow(), vec!["f@10"]);

        // Requested exactly on a boundary: goes to the following one.
        ev.advance(ms(7)).unwrap();
        ev.request_frame(push_on(&log, &ev, "g"));
        ev.run_until_idle().unwrap();
        assert_eq!(log.borrow()[1], "g@40");
    }

    #[test]
    fn missing_frame_period_reports_no_native_frames() {
        let ev = EventLoop::manual(LoopConfig { frame_period: None });
        assert!(!ev.supports_frame_requests());
        assert!(manual().supports_frame_requests());
    }

    // ── background jobs ───────────────────────────────────────────────────

    #[test]
    fn manual_spawn_blocking_delivers_on_next_turn() {
        let ev = manual();
        let got = Rc::new(Cell::new(0));
        let g = got.clone();
        ev.spawn_blocking(|| 21 * 2, move |v: i32| g.set(v));
        assert_eq!(got.get(), 0);
        ev.run_until_idle().unwrap();
        assert_eq!(got.get(), 42);
    }

    #[test]
    fn realtime_spawn_blocking_runs_off_thread() {
        let ev = EventLoop::realtime(LoopConfig::default());
        let got = Rc::new(RefCell::new(None));
        let g = got.clone();
        ev.spawn_blocking(
            || thread::current().name().map(str::to_owned),
            move |name| *g.borrow_mut() = name,
        );
        ev.run_until_idle().unwrap();
        let name = got.borrow().clone().unwrap();
        assert!(name.starts_with("kinema-job-"));
        assert_eq!(ev.pending(), 0);
    }

    #[test]
    fn panicking_job_surfaces_as_error() {
        let ev = EventLoop::realtime(LoopConfig::default());
        ev.spawn_blocking(|| -> u8 { panic!("boom") }, |_| {});
        let err = ev.run_until_idle().unwrap_err();
        assert!(format!("{err}").contains("panicked"));
    }

    #[test]
    fn advance_rejects_realtime_loop() {
        let ev = EventLoop::realtime(LoopConfig::default());
        assert!(ev.advance(ms(1)).is_err());
    }

    #[test]
    fn realtime_run_for_respects_deadline() {
        let ev = EventLoop::realtime(LoopConfig::default());
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        ev.set_timeout(ms(5), Box::new(move || h.set(true)));
        ev.set_timeout(Duration::from_secs(60), Box::new(|| {}));
        ev.run_for(ms(30)).unwrap();
        assert!(hit.get());
        assert_eq!(ev.pending(), 1);
    }
}
