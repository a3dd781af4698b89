//! Date partitioned record store. Each finished session becomes one immutable file, so any
//! number of machines can append to a shared directory without coordinating.

pub mod codec;
pub mod partition;
pub mod record_reader;
pub mod record_writer;
