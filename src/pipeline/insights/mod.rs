//! Patient-level insight generators: health trend insights and medication
//! recommendations. Both share the structuring stage's LLM client and JSON
//! extraction, and degrade to deterministic fallbacks instead of failing.

pub mod types;
pub mod validation;
pub mod health;
pub mod medication;

pub use types::*;
pub use validation::*;
pub use health::*;
pub use medication::*;
