//! Database layer for checkin

mod attendee_repository;
mod connection;
mod migrations;
mod pending_repository;

pub use attendee_repository::{AttendeeRepository, LibSqlAttendeeRepository};
pub use connection::Database;
pub use pending_repository::{
    LibSqlPendingResponseRepository, LibSqlSyncMetadataRepository, PendingResponseRepository,
    SyncMetadataRepository,
};
