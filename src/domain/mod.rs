mod bill;
mod group;
mod money;
mod slip;

pub use bill::*;
pub use group::*;
pub use money::*;
pub use slip::*;
