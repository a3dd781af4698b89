//! Timing of a single task and the record it turns into.
//!
//! A [timer::TimerSession] moves through `Idle → Running ⇄ Paused → Ended`. Ending it produces
//! a [record::TaskRecord], which is the only thing that ever leaves this module.

pub mod record;
pub mod timer;
