//! Library to periodically dump and rotate backups of a PostgreSQL database.
//!
//! One process instance guards exactly one database: the [`scheduler`]
//! drives a fixed-interval timer, every tick starts a [`dump`] run unless
//! the [`registry`] reports one still in flight, and [`retention`] keeps
//! only the most recent artifacts. Success and failure events go to an
//! optional [`notify`] sink.

#![forbid(unsafe_code)]

pub mod cli;
pub mod dump;
pub mod notify;
pub mod registry;
pub mod retention;
pub mod scheduler;
