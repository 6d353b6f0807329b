//! Reactive rendering core for a terminal UI framework: grapheme
//! measurement, a styled cell buffer, a diff-to-ANSI renderer, a
//! fine-grained reactivity system, a retained view tree, and the render
//! loop that ties them together.

pub mod cell;
pub mod color;
pub mod config;
pub mod element;
pub mod error;
pub mod grapheme;
pub mod layout;
pub mod pool;
pub mod profiler;
pub mod reactive;
pub mod render_loop;
pub mod renderer;
pub mod sanitize;
pub mod state;
pub mod view;

pub use cell::{Cell, CellBuffer, StyleToken};
pub use color::{ColorInput, NamedColor};
pub use element::{render_element, ClipRect};
pub use error::{BufferError, FrameError, LayoutError, Phase};
pub use layout::{compute_layout, ComputedLayout, ComputedRect};
pub use pool::BufferPool;
pub use profiler::{FrameRecord, Profiler};
pub use reactive::{watch, watch_effect, Derived, Effect, Signal};
pub use render_loop::RenderLoop;
pub use renderer::{render_diff, render_full, DiffOptions, DiffStats, InlineRenderer, OutputBuffer, ScrollHint};
pub use view::{Node, NodeId, NodeRef, Style};
