//! Scripted fetcher for tests: requests stay pending until settled by hand.

use std::cell::RefCell;
use std::rc::Rc;

use super::fetch::{FetchDone, ImageFetcher, ImageInfo, LoadError};

#[derive(Default)]
pub(crate) struct ManualFetcher {
    pending:   RefCell<Vec<(String, FetchDone)>>,
    requested: RefCell<Vec<String>>,
}

impl ManualFetcher {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub(crate) fn succeed(&self, src: &str) {
        self.settle(src, true);
    }

    pub(crate) fn fail(&self, src: &str) {
        self.settle(src, false);
    }

    fn settle(&self, src: &str, ok: bool) {
        let entry = {
            let mut pending = self.pending.borrow_mut();
            let Some(pos) = pending.iter().position(|(s, _)| s == src) else {
                panic!("no pending fetch for {src}");
            };
            pending.remove(pos)
        };
        let (src, done) = entry;
        if ok {
            done(Ok(ImageInfo { src, width: 1, height: 1 }));
        } else {
            done(Err(LoadError::new(src, "scripted failure")));
        }
    }
}

impl ImageFetcher for ManualFetcher {
    fn fetch(&self, src: &str, done: FetchDone) {
        self.requested.borrow_mut().push(src.to_string());
        self.pending.borrow_mut().push((src.to_string(), done));
    }
}
