use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use kinema_engine::core::{FrameHost, TimerHandle};
use kinema_engine::event_loop::EventLoop;

use super::fetch::{DecodeFetcher, ImageFetcher, ImageInfo, LoadError};

/// One entry of a preload list: a bare source or a `{ src }` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(String),
    Spec { src: String },
}

impl ImageSource {
    pub fn src(&self) -> &str {
        match self {
            ImageSource::Path(src) | ImageSource::Spec { src } => src,
        }
    }
}

impl From<&str> for ImageSource {
    fn from(s: &str) -> Self {
        ImageSource::Path(s.to_string())
    }
}

impl From<String> for ImageSource {
    fn from(s: String) -> Self {
        ImageSource::Path(s)
    }
}

impl From<&String> for ImageSource {
    fn from(s: &String) -> Self {
        ImageSource::Path(s.clone())
    }
}

/// Progress of a single image inside a batch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ItemStatus {
    Loading,
    Loaded,
    Failed,
}

/// Loader-wide defaults.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Applied when `load` is called without an explicit timeout.
    pub timeout: Option<Duration>,
}

struct BatchItem {
    src:    String,
    status: ItemStatus,
}

struct Batch {
    items:     BTreeMap<u64, BatchItem>,
    remaining: usize,
    all_ok:    bool,
    finished:  bool,
    timer:     Option<TimerHandle>,
    on_done:   Option<Box<dyn FnOnce(bool)>>,
}

impl Batch {
    /// Marks the batch finished and hands back what must run outside the borrow.
    fn finish(&mut self) -> (Option<Box<dyn FnOnce(bool)>>, Option<TimerHandle>) {
        self.finished = true;
        (self.on_done.take(), self.timer.take())
    }
}

/// Read-only view of one `load` call.
#[derive(Clone)]
pub struct LoadBatch {
    batch: Rc<RefCell<Batch>>,
}

impl LoadBatch {
    /// Status of every usable item, in input order.
    pub fn statuses(&self) -> Vec<(String, ItemStatus)> {
        self.batch
            .borrow()
            .items
            .values()
            .map(|item| (item.src.clone(), item.status))
            .collect()
    }

    pub fn status(&self, src: &str) -> Option<ItemStatus> {
        self.batch.borrow().items.values().find(|i| i.src == src).map(|i| i.status)
    }

    /// Whether `on_done` has been called.
    pub fn is_finished(&self) -> bool {
        self.batch.borrow().finished
    }

    pub fn len(&self) -> usize {
        self.batch.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fire-and-forget batch image preloader.
#[derive(Clone)]
pub struct ImageLoader {
    host:    Rc<dyn FrameHost>,
    fetcher: Rc<dyn ImageFetcher>,
    config:  LoaderConfig,
}

impl ImageLoader {
    pub fn new(host: Rc<dyn FrameHost>, fetcher: Rc<dyn ImageFetcher>) -> Self {
        Self { host, fetcher, config: LoaderConfig::default() }
    }

    /// Loader that decodes files from disk on `event_loop`.
    pub fn decoding(event_loop: &EventLoop) -> Self {
        Self::new(event_loop.host(), Rc::new(DecodeFetcher::new(event_loop.clone())))
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(&self) -> &Rc<dyn FrameHost> {
        &self.host
    }

    /// Loads every item and calls `on_done(all_succeeded)` exactly once.
    ///
    /// Items with an empty source are skipped. With nothing left to load,
    /// `on_done(true)` runs before `load` returns. When `timeout` (or the
    /// configured default) elapses first, `on_done(false)` runs and later
    /// results only update item status.
    pub fn load<F>(&self, items: Vec<ImageSource>, on_done: F, timeout: Option<Duration>) -> LoadBatch
    where
        F: FnOnce(bool) + 'static,
    {
        let usable: Vec<String> = items
            .into_iter()
            .map(|item| item.src().to_string())
            .filter(|src| !src.is_empty())
            .collect();

        let batch = Rc::new(RefCell::new(Batch {
            items:     BTreeMap::new(),
            remaining: usable.len(),
            all_ok:    true,
            finished:  false,
            timer:     None,
            on_done:   Some(Box::new(on_done)),
        }));
        let view = LoadBatch { batch: batch.clone() };

        if usable.is_empty() {
            let (on_done, _) = batch.borrow_mut().finish();
            if let Some(on_done) = on_done {
                on_done(true);
            }
            return view;
        }

        log::debug!("preloading {} image(s)", usable.len());

        if let Some(limit) = timeout.or(self.config.timeout) {
            let b = batch.clone();
            let handle = self.host.set_timeout(limit, Box::new(move || expire(&b, limit)));
            batch.borrow_mut().timer = Some(handle);
        }

        for (index, src) in usable.into_iter().enumerate() {
            let id = index as u64;
            batch.borrow_mut().items.insert(id, BatchItem { src: src.clone(), status: ItemStatus::Loading });

            let b = batch.clone();
            let host = self.host.clone();
            self.fetcher.fetch(&src, Box::new(move |result| settle(&b, &host, id, result)));
        }

        view
    }
}

fn settle(
    batch: &Rc<RefCell<Batch>>,
    host: &Rc<dyn FrameHost>,
    id: u64,
    result: Result<ImageInfo, LoadError>,
) {
    let (on_done, timer, ok) = {
        let mut b = batch.borrow_mut();
        let status = match &result {
            Ok(info) => {
                log::trace!("loaded {} ({}x{})", info.src, info.width, info.height);
                ItemStatus::Loaded
            }
            Err(e) => {
                log::warn!("{e}");
                b.all_ok = false;
                ItemStatus::Failed
            }
        };
        if let Some(item) = b.items.get_mut(&id) {
            item.status = status;
        }
        b.remaining = b.remaining.saturating_sub(1);
        if b.remaining > 0 || b.finished {
            return;
        }
        let ok = b.all_ok;
        let (on_done, timer) = b.finish();
        (on_done, timer, ok)
    };

    if let Some(timer) = timer {
        host.cancel(timer);
    }
    if let Some(on_done) = on_done {
        on_done(ok);
    }
}

fn expire(batch: &Rc<RefCell<Batch>>, limit: Duration) {
    let on_done = {
        let mut b = batch.borrow_mut();
        b.timer = None;
        if b.finished {
            return;
        }
        log::warn!("image preload timed out after {limit:?} with {} item(s) outstanding", b.remaining);
        b.finish().0
    };
    if let Some(on_done) = on_done {
        on_done(false);
    }
}
