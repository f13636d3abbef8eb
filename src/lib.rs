//! Pricing engine for a VRPTW branch-and-price solver.
//!
//! Solves the resource-constrained shortest path problem with time windows
//! and capacity over a depot/customers/duplicate-depot graph, in relaxed
//! (label-setting) and elementary (label-correcting, pulse) form. The outer
//! column-generation loop supplies dual prices and a possibly-restricted
//! travel-time matrix per call and receives the minimum-reduced-cost paths
//! as new columns.

pub mod pricing;
pub mod problem;
pub mod solution;
pub mod utils;
