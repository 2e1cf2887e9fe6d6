pub mod attendees;
pub mod common;
pub mod completions;
pub mod export;
pub mod kiosk;
pub mod pending;
pub mod report;
pub mod scan;
pub mod sync;
