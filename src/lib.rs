#![doc = include_str!("../README.md")]
#![warn(missing_docs, missing_debug_implementations)]
mod config;
mod error;
mod event;
mod factory;
mod fsm;
mod pool;
mod poolable;
mod procedure;
mod registry;
mod runtime;

pub use config::*;
pub use error::*;
pub use event::*;
pub use factory::*;
pub use fsm::*;
pub use pool::*;
pub use poolable::*;
pub use procedure::*;
pub use registry::*;
pub use runtime::*;
