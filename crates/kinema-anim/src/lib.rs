//! Kinema animation crate: chainable sprite animations on top of `kinema-engine`.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use kinema_anim::prelude::*;
//!
//! let event_loop = EventLoop::realtime(LoopConfig::default());
//! let sprite = Rc::new(RefCell::new(RecordingElement::new()));
//! let frames = parse_positions(&["0 -854", "-174 -852", "-349 -852"])?;
//!
//! Animation::new(&event_loop)
//!     .preload_images(["rabbit-big.png"])
//!     .animate_background_position(sprite.clone(), frames, Some("rabbit-big.png"))
//!     .repeat(Some(2))
//!     .then(|| log::info!("rabbit done"))
//!     .start_with_interval(Duration::from_millis(150));
//!
//! event_loop.run_until_idle()?;
//! ```
//!
//! # Custom elements
//!
//! Implement [`SpriteElement`](element::SpriteElement) or
//! [`ImageElement`](element::ImageElement) for whatever should receive the
//! property writes; the chain holds elements as `Rc<RefCell<E>>`.

pub mod animation;
pub mod element;
pub mod loader;
pub mod position;

pub use animation::Animation;

/// Everything needed to build and drive animations.
pub mod prelude {
    pub use crate::animation::{Animation, AnimationState, Continuation, DEFAULT_STEP_INTERVAL};
    pub use crate::element::{ImageElement, Mutation, RecordingElement, SpriteElement};
    pub use crate::loader::{ImageLoader, ImageSource, LoaderConfig};
    pub use crate::position::{parse_positions, Position};

    // Engine primitives every caller touches.
    pub use kinema_engine::event_loop::{EventLoop, LoopConfig};
    pub use kinema_engine::time::FrameClock;
}
