// Domain layer: data model, the archive tree and the ports the core is written against.

pub mod model;
pub mod ports;
pub mod tree;
