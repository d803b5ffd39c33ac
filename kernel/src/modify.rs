mod book;
mod record;
mod user;

pub use self::{book::*, record::*, user::*};
