// src/lib.rs
//! Ingests BLS occupational workbooks into a DuckDB store keyed by SOC code.

pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod pipeline;
pub mod sheet;
pub mod store;
pub mod taxonomy;
pub mod workbook;
