// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent routing and retrieval budgeting.
//!
//! The [`IntentRouter`] classifies a query against embedding centroids of
//! configured example utterances. The [`RoutePlanner`] turns that verdict,
//! keyword heuristics and the conversation stage into a [`RouteDecision`].

pub mod intent;
pub mod keywords;
pub mod planner;

pub use intent::{IntentMatch, IntentRouter};
pub use keywords::KeywordSet;
pub use planner::{GENERAL_INTENT, RouteDecision, RoutePlanner};
