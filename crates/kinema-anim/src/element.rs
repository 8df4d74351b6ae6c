//! Element contracts the animation tasks write to.
//!
//! The chain never renders anything itself; it only pokes these properties.
//! Elements are shared with the caller as `Rc<RefCell<E>>`.

use crate::position::Position;

/// An element whose background is a sprite sheet.
pub trait SpriteElement {
    fn set_background_image(&mut self, url: &str);
    fn set_background_position(&mut self, position: Position);
}

/// An element showing a single image by source.
pub trait ImageElement {
    fn set_src(&mut self, src: &str);
}

/// One property write observed by a [`RecordingElement`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    BackgroundImage(String),
    BackgroundPosition(Position),
    Src(String),
}

/// In-memory element that keeps its current properties and every write.
#[derive(Debug, Clone, Default)]
pub struct RecordingElement {
    pub background_image:    Option<String>,
    pub background_position: Option<Position>,
    pub src:                 Option<String>,
    pub mutations:           Vec<Mutation>,
}

impl RecordingElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Background positions in the order they were written.
    pub fn positions(&self) -> Vec<Position> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::BackgroundPosition(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Image sources in the order they were written.
    pub fn sources(&self) -> Vec<&str> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::Src(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl SpriteElement for RecordingElement {
    fn set_background_image(&mut self, url: &str) {
        self.background_image = Some(url.to_string());
        self.mutations.push(Mutation::BackgroundImage(url.to_string()));
    }

    fn set_background_position(&mut self, position: Position) {
        self.background_position = Some(position);
        self.mutations.push(Mutation::BackgroundPosition(position));
    }
}

impl ImageElement for RecordingElement {
    fn set_src(&mut self, src: &str) {
        self.src = Some(src.to_string());
        self.mutations.push(Mutation::Src(src.to_string()));
    }
}
