//! Component G: a segmented prime-gap search engine. Sieves candidate
//! integers derived from a block template, extracts gaps between
//! surviving positions, and verifies candidate endpoints with
//! arbitrary-precision Fermat primality tests.

mod backend;
mod engine;
mod error;
mod fermat;
mod gap;
mod primes;
mod segment;
mod wheel;

pub use backend::{BackendRegistry, SieveBackend};
pub use engine::{GapSolution, SieveConfig, SieveEngine, SHIFT_MAX, SHIFT_MIN};
pub use error::SieveEngineError;
pub use fermat::{is_probable_prime, verify_gap, WITNESSES};
pub use gap::{extract_gaps, GapCandidate};
pub use primes::SmallPrimeTable;
pub use segment::{sieve_segment, SieveSegment};
pub use wheel::Wheel;
