//! Command implementations.

mod endpoints;
mod submit;
mod validate;
mod work;

pub use endpoints::run_end_points;
pub use submit::run_submit;
pub use validate::run_validate;
pub use work::run_work;
