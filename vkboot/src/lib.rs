//! Vulkan bootstrap: instance creation, physical device selection, and
//! logical device setup, built on [`ash`].
//!
//! The crate covers exactly the initialization sequence of a
//! graphics-capable application, up to (and not beyond) a logical device
//! with a submission queue:
//!
//! ```text
//! Instance
//! ├── DebugReporter        (optional, diagnostics only)
//! └── Device
//!     └── vk::Queue        (borrowed from the Device)
//! ```
//!
//! Each wrapper holds its parent via `Arc` so parents cannot be destroyed
//! while children are alive. [`context::GraphicsContext`] bundles the whole
//! sequence and tears it down in reverse order on drop.
//!
//! # Naming conventions
//!
//! | prefix  | meaning                                   |
//! |---------|-------------------------------------------|
//! | `raw_*` | accepts or returns a raw `ash::vk` handle |
//! | `ash_*` | returns the `ash` wrapper object          |

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub mod config;
pub mod context;
pub mod debug;
pub mod device;
pub mod instance;
pub mod layers;
pub mod select;

pub use ash;
pub use raw_window_handle::HandleError as RwhHandleError;
