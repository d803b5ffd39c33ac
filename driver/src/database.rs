pub use self::postgres::*;

pub mod postgres;
