//! Export contents of `counter` folder
mod counter_errors;
mod observation;
mod registry;
mod dedup;
mod event;
mod strategy;
mod crossing;
mod dwell;
mod gc;
mod pipeline;
#[cfg(test)]
pub(crate) mod test_data;

pub use self::{
    counter_errors::*,
    observation::*,
    registry::*,
    dedup::*,
    event::*,
    strategy::*,
    crossing::*,
    dwell::*,
    gc::*,
    pipeline::*,
};
