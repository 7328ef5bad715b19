//! Alternative ranking primitives: nutrition scoring, label normalization and
//! validation of generated alternatives.

pub mod normalize;
pub mod response;
pub mod scoring;

pub use normalize::{normalize_price, normalize_quality};
pub use response::{
    extract_json_array, extract_json_object, ExtractionError, RawAlternative, RejectedAlternative,
};
pub use scoring::{
    nutrition_distance, CandidateRanker, NutritionProfile, NutritionWeights, ScoredCandidate,
};

pub const DEFAULT_WEIGHTS: NutritionWeights =
    NutritionWeights { energy: 0.6, sugar: 0.3, fat: 0.1 };

pub const DEFAULT_MATCH_SCORE: u8 = 85;

/// Upper bound on domestic candidates fetched per suggestion run.
pub const DEFAULT_CANDIDATE_POOL: u32 = 200;

/// Closest candidates kept after ranking.
pub const RANKED_CANDIDATE_LIMIT: usize = 10;

/// Candidates actually shown to the generator.
pub const PROMPT_CANDIDATE_LIMIT: usize = 5;

/// Generated entries considered per run.
pub const MAX_ALTERNATIVES: usize = 3;

pub const CREATED_AVAILABILITY: &str = "widely_available";
pub const CREATED_CHANNELS: [&str; 3] = ["Local Stores", "Amazon.in", "Flipkart"];
pub const CREATED_RATING: f64 = 4.0;
pub const CREATED_BARCODE_PREFIX: &str = "ALT";
