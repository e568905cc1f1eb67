//! Browser actions: the closed action type, batch execution, shape checks and replay remapping

mod action;
mod executor;
mod remap;
mod shape;

pub use action::{ActionKind, BrowserAction, ContentType, ScrollDirection};
pub use executor::{ActionError, ActionExecutor, ActionOutcome, ActionResult, BatchPolicy};
pub use remap::{DroppedCommand, RemapOutcome, remap};
pub use shape::{CommandShape, ShapeMismatch};
