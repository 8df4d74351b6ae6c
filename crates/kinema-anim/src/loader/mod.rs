//! Image batch preloading.
//!
//! `ImageLoader` fans a list of sources out to an `ImageFetcher` and reports a
//! single all-succeeded flag, with an optional timeout. Each `load` call owns
//! its own bookkeeping; nothing is shared between batches.

mod batch;
mod fetch;

pub use batch::{ImageLoader, ImageSource, ItemStatus, LoadBatch, LoaderConfig};
pub use fetch::{DecodeFetcher, FetchDone, ImageFetcher, ImageInfo, LoadError};

#[cfg(test)]
pub(crate) mod testing;
