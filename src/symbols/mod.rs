//! The symbol table.
//!
//! A `Vec<Rc<RefCell<Frame>>>` scope stack with lookups walking from the end
//! backwards, holding `variables`/`functions` maps per frame. Resource/type
//! resolution and scope-aware variable lookup are unified into one table
//! here, since this crate does type resolution and IR emission in the same
//! pass rather than as separate checker/codegen phases.

mod table;

pub use table::SymbolTable;

use std::rc::Rc;

use inkwell::values::{FunctionValue, PointerValue};

use crate::diagnostics::Span;
use crate::types::{FileId, ResoType};
use crate::value::ConcreteResoValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Visibility {
    FilePrivate,
    Global,
}

impl Visibility {
    /// Access check: a `(visibility, declaring-file)` pair is accessible
    /// from `current_file` iff `Global` or declared in the same file.
    pub fn is_accessible_from(self, declaring_file: FileId, current_file: FileId) -> bool {
        matches!(self, Visibility::Global) || declaring_file == current_file
    }
}

/// A resource-path segment: either a plain
/// identifier or an indexer `{name: Type}` contributing a parameter to every
/// method nested under it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Ident(String),
    Indexer { name: String, ty: ResoType },
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Ident(name) => write!(f, "{name}"),
            PathSegment::Indexer { .. } => write!(f, "{{Indexer}}"),
        }
    }
}

/// Join path segments with `.`, the canonical display form of a resource path.
pub fn path_to_string(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

pub struct VariableSymbol<'ctx> {
    pub name: String,
    pub reso_type: ResoType,
    pub pointer: PointerValue<'ctx>,
    pub is_constant: bool,
    initialized: std::cell::Cell<bool>,
}

impl<'ctx> VariableSymbol<'ctx> {
    pub fn new(
        name: impl Into<String>,
        reso_type: ResoType,
        pointer: PointerValue<'ctx>,
        is_constant: bool,
        initialized: bool,
    ) -> Self {
        VariableSymbol {
            name: name.into(),
            reso_type,
            pointer,
            is_constant,
            initialized: std::cell::Cell::new(initialized),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// Mark as initialized. Equivalent to re-inserting a new symbol into the
    /// scope map, but a `Cell` flag is observationally identical (same name
    /// still resolves to the same pointer) and avoids re-inserting into
    /// every enclosing scope's map by hand.
    pub fn mark_initialized(&self) {
        self.initialized.set(true);
    }
}

/// Custom call builder used by built-ins (`Vector<T>` methods) and generic
/// instantiations in place of a plain `call` instruction.
pub type CallBuilder<'ctx> = Rc<
    dyn Fn(
            &crate::codegen::CodegenContext<'ctx>,
            Option<ConcreteResoValue<'ctx>>,
            &[ConcreteResoValue<'ctx>],
            Span,
        ) -> Option<ConcreteResoValue<'ctx>>
        + 'ctx,
>;

#[derive(Clone)]
pub struct FunctionSymbol<'ctx> {
    pub name: String,
    pub return_type: ResoType,
    pub params: Vec<ResoType>,
    pub ir_value: Option<FunctionValue<'ctx>>,
    pub visibility: Visibility,
    pub file: FileId,
    pub call_builder: Option<CallBuilder<'ctx>>,
}

#[derive(Clone)]
pub struct MethodSymbol<'ctx> {
    pub name: String,
    pub return_type: ResoType,
    /// `[receiver, indexer-params..., explicit-params...]`.
    pub params: Vec<ResoType>,
    pub ir_value: Option<FunctionValue<'ctx>>,
    pub visibility: Visibility,
    pub path: Vec<PathSegment>,
    pub call_builder: Option<CallBuilder<'ctx>>,
}

impl<'ctx> MethodSymbol<'ctx> {
    pub fn path_string(&self) -> String {
        path_to_string(&self.path)
    }

    /// Parameters contributed by indexers along the path, in source order.
    pub fn indexer_params(&self) -> Vec<(&str, &ResoType)> {
        self.path
            .iter()
            .filter_map(|seg| match seg {
                PathSegment::Indexer { name, ty } => Some((name.as_str(), ty)),
                PathSegment::Ident(_) => None,
            })
            .collect()
    }
}
