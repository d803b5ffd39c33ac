mod book;
mod common;
mod record;
mod user;

pub use self::{book::*, common::*, record::*, user::*};
