// Domain layer: the rule model and the port the pipeline fetches through.

pub mod model;
pub mod ports;
