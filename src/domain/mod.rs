// Domain layer: reservation models, the trigger event and the blob store port.

pub mod event;
pub mod model;
pub mod ports;
