//! Window handle.
//!
//! No OS window is opened yet; this tracks the title, size and visibility the
//! game asked for so a real surface backend can pick them up later.

use std::fmt;

use micha_config::WindowConfig;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    title: String,
    size: WindowSize,
    size_dirty: bool,
    visible: bool,
}

impl Window {
    /// A hidden window. The initial size counts as a pending resize.
    pub fn new(title: impl Into<String>, size: WindowSize) -> Self {
        Self {
            title: title.into(),
            size,
            size_dirty: true,
            visible: false,
        }
    }

    /// A hidden window sized and titled from `config.ron`.
    pub fn from_config(config: &WindowConfig) -> Self {
        Self::new(
            config.title.clone(),
            WindowSize::new(config.width, config.height),
        )
    }

    /// Make the window visible. Showing twice is a no-op.
    pub fn show(&mut self) {
        if !self.visible {
            debug!("Showing window \"{}\" at {}", self.title, self.size);
            self.visible = true;
        }
    }

    /// Hide the window without tearing it down.
    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Tear the window down. Only call while the game is closing.
    pub fn destroy(&mut self) {
        self.hide();
        debug!("Destroyed window \"{}\"", self.title);
    }

    /// Returns `true` between [`show`](Self::show) and the next hide.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Returns the current title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Replace the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Returns the requested client size.
    pub fn size(&self) -> WindowSize {
        self.size
    }

    /// Request a new size. It is reported once by
    /// [`take_size_update`](Self::take_size_update).
    pub fn set_size(&mut self, size: WindowSize) {
        self.size = size;
        self.size_dirty = true;
    }

    /// The new size if it changed since the last call.
    pub fn take_size_update(&mut self) -> Option<WindowSize> {
        std::mem::take(&mut self.size_dirty).then_some(self.size)
    }
}
