pub mod merge;
pub mod score;
