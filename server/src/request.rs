pub use self::{book::*, record::*, user::*};

mod book;
mod record;
mod user;
