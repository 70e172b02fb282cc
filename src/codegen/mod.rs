//! Code generation: lowers a normalized [`crate::ast`] into LLVM IR.
//!
//! Built around one context owning the LLVM context/module/builder plus
//! caches, with a family of per-node-kind lowering functions, structured
//! around this crate's deferred value algebra ([`crate::value::ResoValue`])
//! rather than an always-concrete representation.
//!
//! - [`context`]: the shared [`CodegenContext`] and its caches.
//! - [`convert`] / [`concretize`]: numeric conversion and deferred-value
//!   concretization.
//! - [`builtins`] / [`vector`]: the built-in `Vector<T>`/`String` resources.
//! - [`expression`] / [`statement`]: lowering of `ast::Expr`/`ast::Stmt`.
//! - [`registration`] / [`function`]: the three-pass pipeline — signatures, resource declarations, then bodies.

pub mod builtins;
pub mod concretize;
pub mod context;
pub mod convert;
pub mod expression;
pub mod function;
pub mod registration;
pub mod statement;
pub mod vector;

pub use context::{CodegenContext, CodegenOptions, LoopContext};
