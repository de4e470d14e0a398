pub mod resolve;
pub mod status;

pub use resolve::{run_active, run_leaders, run_resolve};
pub use status::run_status;
