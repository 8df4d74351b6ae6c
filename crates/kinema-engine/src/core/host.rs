use std::time::Duration;

/// A one-shot callback scheduled on a host.
pub type Callback = Box<dyn FnOnce()>;

/// Opaque handle to a pending frame request or timeout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub(crate) u64);

impl TimerHandle {
    /// Raw id, useful for log lines.
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Scheduling primitives offered by a platform.
///
/// All callbacks run on the host's thread, one at a time. A host never runs a
/// callback synchronously from inside the call that scheduled it.
pub trait FrameHost {
    /// Monotonic time since the host's epoch.
    fn now(&self) -> Duration;

    /// Whether `request_frame` is backed by a native per-frame primitive.
    ///
    /// Hosts without one still accept frame requests, but clocks should
    /// prefer `set_timeout` with their own interval.
    fn supports_frame_requests(&self) -> bool {
        true
    }

    /// Runs `callback` once at the next frame boundary.
    fn request_frame(&self, callback: Callback) -> TimerHandle;

    /// Runs `callback` once after `delay`.
    fn set_timeout(&self, delay: Duration, callback: Callback) -> TimerHandle;

    /// Cancels a pending callback. Unknown or already fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}
