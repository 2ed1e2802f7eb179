pub mod maintenance;
pub mod migrate;
