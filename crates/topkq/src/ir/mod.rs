//! Intermediate representations: request types and the relational
//! expression produced by the portable strategy.

pub mod generic;
pub mod request;
pub mod rq;
