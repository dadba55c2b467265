//! Micha engine application framework.
//!
//! The heart of this crate is the paced [`game_loop`]. Around it sit the
//! monotonic [`clock`], [`crash`] reporting, the engine [`version`], a
//! [`window`] handle, [`platform`] directories, and the [`app`] object that
//! wires them together.

pub mod app;
pub mod clock;
pub mod crash;
pub mod game_loop;
pub mod platform;
pub mod version;
pub mod window;

pub use app::{App, AppError};
pub use clock::{Clock, ManualClock, MonotonicClock, WaitError};
pub use crash::{
    CapturingSink, CrashMode, CrashReport, CrashSink, LogOnlySink, ProcessCrashHandler,
    install_panic_hook,
};
pub use game_loop::{
    CallbackError, CallbackResult, GameLoop, Hook, LoopCallbacks, LoopConfig, LoopError,
    LoopHandle, Phase,
};
pub use version::{Version, VersionError};
