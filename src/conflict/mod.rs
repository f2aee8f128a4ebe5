//! Conflict detection and resolution (C7).

pub mod resolver;
pub mod rules;

pub use resolver::{detect, resolve, ConflictHistory, DetectionOutcome, ResolutionPlan};
pub use rules::{ConflictRule, ConflictRuleSet};

// vim: ts=4
