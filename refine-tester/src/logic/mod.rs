pub mod loader;
pub mod plan;
pub mod reports;
pub mod seeds;
pub mod tester;

pub use loader::FileDataLoader;
pub use plan::{PlanOptions, build_scenarios, single_track_choice};
pub use seeds::resolve_seed_inputs;
pub use tester::*;
