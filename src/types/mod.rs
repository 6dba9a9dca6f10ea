pub mod dataset;
pub mod time_bucket;
