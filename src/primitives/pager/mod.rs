#![forbid(unsafe_code)]

mod arena;

pub use arena::PageArena;
