// Domain layer: catalog, gist and plan models plus the ports the core drives.

pub mod model;
pub mod ports;
