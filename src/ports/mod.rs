//! Port traits: the seams between the domain and the outside world.

pub mod bar_source;
pub mod gateway;
pub mod journal;
