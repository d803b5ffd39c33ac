mod flag;
mod select;

pub use self::{flag::*, select::*};
