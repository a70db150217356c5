//! OBD-II Command Queue Scheduler
//!
//! Non-blocking engine that sends one queued command at a time, pairs the
//! reassembled answer with its ECU context and hands it to a decoder.

mod scheduler;

pub use scheduler::{
    QueueScheduler, ReconnectPolicy, ResponseHandler, SchedulerConfig, SchedulerEvent,
    SchedulerState,
};
