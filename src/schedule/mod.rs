//! Schedule logic
//!
//! Pure functions over medications and "now": which medications apply on a
//! date, where a dose sits relative to its due window, and the day's board.

mod board;
mod predicate;
mod window;

pub use board::{DoseGroup, TodayBoard};
pub use predicate::{applicable_on, shows_on};
pub use window::{classify, due_state, offset_minutes, DueState, DUE_EARLY_MINUTES, DUE_LATE_MINUTES};
