//! # Kestrel Execution Core API
//!
//! This crate is the interface layer between the kestrel worker-pool
//! execution core and the computation it dispatches. The core is
//! domain-agnostic: it partitions an output frame into disjoint row regions,
//! hands each region to a persistent worker thread, and collects completion
//! through atomic counters. The computation itself, turning a region into
//! pixel bytes, is supplied by implementing [`RenderKernel`].
//!
//! ## Module Organization
//!
//! - [`kernel`]: the [`RenderKernel`] trait implemented by render collaborators
//! - [`types`]: region and frame descriptors shared across the boundary
//! - [`errors`]: the error type a kernel may report mid-task

pub mod errors;
pub mod kernel;
pub mod types;

pub use errors::KernelError;
pub use kernel::RenderKernel;
pub use types::{FrameParams, Region, BYTES_PER_PIXEL};
