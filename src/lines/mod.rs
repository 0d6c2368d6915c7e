//! Grouping of normalized words into display lines.

/// Greedy line segmentation.
pub mod segment;
