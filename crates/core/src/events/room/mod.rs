//! Typed contents for the `m.room.*` events the engine folds.

pub mod aliases;
pub mod create;
pub mod join_rule;
pub mod member;
pub mod message;
pub mod name;
pub mod power_levels;
pub mod topic;
