//! Call history recording and replay.
//!
//! # Overview
//!
//! A callable is decorated by wrapping it in a [`recorder::Recorded`]. Every
//! successful call appends one [`recording::HistoryEntry`] (positional
//! arguments, keyword arguments, output) to a log owned by that wrapper, so
//! two wrappers around the same function never share history. Failed calls
//! propagate unchanged and are not recorded.
//!
//! [`replayer::replay`] renders a wrapper's log without touching it.
//! [`counter::Counted`] only counts attempts and has no log to replay.

pub mod counter;
pub mod recorder;
pub mod recording;
pub mod replayer;
