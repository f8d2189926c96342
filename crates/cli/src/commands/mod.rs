pub mod analyze;
pub mod reports;
pub mod rules;
pub mod util;
pub mod workspace;

pub use analyze::*;
pub use reports::*;
pub use rules::*;
pub use util::*;
pub use workspace::*;
