//! Scenario-based tests for debpipe

mod helpers;

mod failure_handling;
mod naming;
mod property_flow;
mod stage_order;
mod trigger_graph;
