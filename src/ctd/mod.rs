//! The CTD side of the system: which report files exist, how to fetch them,
//! and how to turn a raw report into a clean file the loader can COPY.

pub mod download;
pub mod registry;
pub mod report;
