pub mod jobs;
pub mod media;
pub mod trackers;
pub mod watched_entries;
