// Scoring: pure functions from engagement counters to a quality score.

pub mod decay;
pub mod normalize;
pub mod quality;
