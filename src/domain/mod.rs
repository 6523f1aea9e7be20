//! Core domain types and logic.

pub mod calendar;
pub mod holding;
pub mod weights;
pub mod portfolio;
pub mod strategy;
pub mod execution;
pub mod allocation;
pub mod scheduler;
pub mod model;
pub mod config_validation;
pub mod error;
