// Comparison engine: pair selection, rating updates, completion, ranking.
// Pure policy lives in elo / pairing / completion / ranking; `engine` owns
// the per-project critical sections and talks to the store.

pub mod completion;
pub mod elo;
pub mod engine;
pub mod handlers;
pub mod pairing;
pub mod ranking;
pub mod reservations;
