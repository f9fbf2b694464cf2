// =============================================================================
// Durable State — rebasing anchor and index history
// =============================================================================
//
// Unlike the signal caches these files are load-bearing: the base value
// anchors every future level and the history backs every period return.
// Both load leniently when absent (a first run) but fail loudly when
// present and unreadable, because silently restarting from empty would
// rebase or truncate the series.

pub mod base_value;
pub mod history;

pub use base_value::{BaseValue, BaseValueStore};
pub use history::{History, HistoryPoint, HistoryStore};
