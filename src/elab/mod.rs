// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
mod flatten;
mod properties;
mod registry;

pub use flatten::{topological_order, FlattenedSystem, Flattener};
pub use properties::{Property, PropertyKind, PropertyRegistry};
pub use registry::SystemRegistry;
