// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool calling for the Concierge chat engine.
//!
//! The [`ToolRegistry`] decides which tools the model sees on a turn. The
//! [`ToolDispatcher`] executes the model's call: it pins entity arguments to
//! the conversation's focus product, validates arguments against the tool's
//! JSON schema, and runs the bound [`ToolHandler`]. Failures come back as
//! [`ToolError`] values, never as panics or propagated errors.

mod args;
pub mod dispatcher;
pub mod handlers;
pub mod notifier;
pub mod registry;
pub mod spec;

pub use dispatcher::{DispatchContext, DispatchOutcome, ToolDispatcher, ToolError, ToolHandler};
pub use handlers::{
    ProductDetailsHandler, ProductSearchHandler, SendInquiryHandler, builtin_handlers,
};
pub use notifier::SmtpNotifier;
pub use registry::ToolRegistry;
pub use spec::{ENTITY_ARGUMENTS, HandlerKind, ToolSpec, builtin_specs};
