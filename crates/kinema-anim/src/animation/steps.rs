//! Step builders. Each appends one task to the chain and hands the chain back.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::element::{ImageElement, SpriteElement};
use crate::loader::ImageSource;
use crate::position::Position;

use super::chain::{Animation, Continuation};
use super::task::Task;

/// Index of the frame due at `elapsed`, clamped to `len`.
///
/// Frame `k` (1-based) becomes due once `k` whole intervals have passed; a
/// late tick jumps straight to the newest due frame.
fn frame_index(elapsed: Duration, interval: Duration, len: usize) -> usize {
    if interval.is_zero() {
        return len;
    }
    let due = elapsed.as_nanos() / interval.as_nanos();
    usize::try_from(due).unwrap_or(usize::MAX).min(len)
}

impl Animation {
    /// Loads `images` and moves on once every image settled, loaded or not.
    pub fn preload_images<I, S>(self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ImageSource>,
    {
        let images: Vec<ImageSource> = images.into_iter().map(Into::into).collect();
        let loader = self.inner.loader.clone();
        let chain = Rc::downgrade(&self.inner);
        self.add(Task::sync(move |next| {
            let chain = chain.clone();
            loader.load(
                images.clone(),
                move |ok| {
                    if let Some(inner) = chain.upgrade() {
                        inner.record_preload(ok);
                    }
                    if !ok {
                        log::warn!("preload finished with failures; continuing");
                    }
                    next.proceed();
                },
                None,
            );
        }))
    }

    /// Steps `element`'s background through `positions`, one per interval.
    ///
    /// When `image_url` is given it is set as the background image on every
    /// frame written.
    pub fn animate_background_position<E, I, P>(
        self,
        element: Rc<RefCell<E>>,
        positions: I,
        image_url: Option<&str>,
    ) -> Self
    where
        E: SpriteElement + 'static,
        I: IntoIterator<Item = P>,
        P: Into<Position>,
    {
        let positions: Vec<Position> = positions.into_iter().map(Into::into).collect();
        if positions.is_empty() {
            return self.add(Task::sync(Continuation::proceed));
        }
        let image_url = image_url.map(str::to_string);
        let interval = self.inner.interval.clone();
        self.add(Task::per_frame(move |next, elapsed| {
            let index = frame_index(elapsed, interval.get(), positions.len());
            if index == 0 {
                return;
            }
            {
                let mut el = element.borrow_mut();
                if let Some(url) = &image_url {
                    el.set_background_image(url);
                }
                el.set_background_position(positions[index - 1]);
            }
            if index == positions.len() {
                next.proceed();
            }
        }))
    }

    /// Steps `element`'s source through `sources`, one per interval.
    pub fn animate_image_source<E, I, S>(self, element: Rc<RefCell<E>>, sources: I) -> Self
    where
        E: ImageElement + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources: Vec<String> = sources.into_iter().map(Into::into).collect();
        if sources.is_empty() {
            return self.add(Task::sync(Continuation::proceed));
        }
        let interval = self.inner.interval.clone();
        self.add(Task::per_frame(move |next, elapsed| {
            let index = frame_index(elapsed, interval.get(), sources.len());
            if index == 0 {
                return;
            }
            element.borrow_mut().set_src(&sources[index - 1]);
            if index == sources.len() {
                next.proceed();
            }
        }))
    }

    /// Runs `f` on every qualifying frame with the elapsed time of the task,
    /// until it calls `proceed`.
    pub fn custom_frame_task<F>(self, f: F) -> Self
    where
        F: FnMut(Continuation, Duration) + 'static,
    {
        self.add(Task::per_frame(f))
    }

    /// Runs `f` once. The chain moves on when the continuation is completed,
    /// which may happen later.
    pub fn custom_task<F>(self, f: F) -> Self
    where
        F: FnMut(Continuation) + 'static,
    {
        self.add(Task::sync(f))
    }

    /// Calls `callback` and moves on.
    pub fn then<F>(self, mut callback: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.add(Task::sync(move |next| {
            callback();
            next.proceed();
        }))
    }

    /// Runs the previous task again, `times` more times, or forever on `None`.
    pub fn repeat(self, times: Option<u32>) -> Self {
        let left = Cell::new(times);
        self.add(Task::sync(move |next| match left.get() {
            None => next.rewind(),
            Some(0) => next.proceed(),
            Some(n) => {
                left.set(Some(n - 1));
                next.rewind();
            }
        }))
    }

    pub fn repeat_forever(self) -> Self {
        self.repeat(None)
    }
}
