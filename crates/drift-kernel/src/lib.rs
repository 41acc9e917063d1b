//! Kernel language, translation and compiled-kernel cache for drift.
//!
//! Kernels are small functions that run once per particle per timestep:
//!
//! ```text
//! fn advect(particle, fieldset, time) {
//!     let (u, v) = fieldset.UV[particle];
//!     particle.lon += u * particle.dt;
//!     particle.lat += v * particle.dt;
//! }
//! ```
//!
//! A [`Kernel`] is an ordered composition of such functions. Translation
//! parses each function, lowers it to a [`Segment`](ir::Segment) of the
//! fixed instruction [IR](ir) and links the segments into one
//! [`Program`]. The program's rendered listing together with the variable
//! schema fingerprint forms its [`KernelSignature`], which keys the
//! [`KernelCache`]. A [`KernelBackend`] turns a program into a
//! [`CompiledKernel`]; the shipped [`InterpreterBackend`] verifies the
//! program and runs it on a stack machine. Finally a [`BoundKernel`]
//! resolves the program's field and constant names against a
//! [`FieldSet`](drift_field::FieldSet).
//!
//! # Pipeline
//!
//! | Stage     | Entry point                     | Failure            |
//! |-----------|---------------------------------|--------------------|
//! | Parse     | [`parser::parse`]               | [`TranslateError`] |
//! | Lower     | [`translate::translate`]        | [`TranslateError`] |
//! | Link      | [`ir::link`]                    | [`TranslateError`] |
//! | Build     | [`KernelCache::get_or_build`]   | [`CompileError`]   |
//! | Bind      | [`BoundKernel::bind`]           | [`BindError`]      |
//! | Invoke    | [`BoundKernel::run`]            | [`Outcome`](drift_core::Outcome) |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod ast;
pub mod backend;
pub mod bind;
pub mod builtins;
pub mod cache;
pub mod error;
pub mod format;
pub mod ir;
pub mod kernel;
pub mod lexer;
pub mod parser;
pub mod print;
pub mod render;
pub mod rng;
pub mod translate;
pub mod vm;

pub use backend::{CompiledKernel, InterpreterBackend, KernelBackend};
pub use bind::BoundKernel;
pub use cache::{CacheStats, KernelCache};
pub use error::{BindError, CompileError, TranslateError};
pub use ir::Program;
pub use kernel::{Kernel, KernelSignature, TranslatedKernel};
pub use print::{CapturedPrint, PrintSink, TracingPrint};
pub use vm::{Invocation, Scratch, MAX_BACK_EDGES};
