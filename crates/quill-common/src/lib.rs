//! Common types and utilities for the quill qualifier checker.
//!
//! This crate provides foundational pieces used across all quill crates:
//! - String interning (`Atom`, `Interner`)
//! - Centralized limits and thresholds

// String interning for name deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Centralized limits and thresholds
pub mod limits;
