// Domain layer: core models, wire types and ports (interfaces).

pub mod api;
pub mod model;
pub mod ports;
