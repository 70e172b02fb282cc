//! The code-generation context.
//!
//! One context owns the LLVM context/module/builder plus a `RefCell`-guarded
//! type cache and scope stack; the scope/symbol half is delegated entirely
//! to [`crate::symbols::SymbolTable`] rather than duplicated here.
//! `current_function`, `loop_stack` and `global_strings` round out the field
//! list needed by function/method emission and loop control flow.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{FunctionValue, PointerValue};
use inkwell::AddressSpace;

use crate::diagnostics::Diagnostics;
use crate::symbols::SymbolTable;
use crate::types::{ResoType, ResourceTypeId, TypeRegistry};

/// Ambient configuration threaded through a compilation run. Stands in for
/// the command-line/build-file layer that is out of scope here; only the knobs codegen itself needs are represented.
#[derive(Clone, Copy, Debug)]
pub struct CodegenOptions {
    /// Bit width of `isize`/`usize` and of pointers on the target.
    pub pointer_width: u32,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions { pointer_width: 64 }
    }
}

/// `(continueBlock, breakBlock)` pushed on entry to a loop body and popped on
/// exit.
#[derive(Clone, Copy)]
pub struct LoopContext<'ctx> {
    pub continue_block: BasicBlock<'ctx>,
    pub break_block: BasicBlock<'ctx>,
}

pub struct CodegenContext<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub registry: Rc<TypeRegistry<'ctx>>,
    pub symbols: SymbolTable<'ctx>,
    pub diagnostics: RefCell<Diagnostics>,
    pub options: CodegenOptions,

    llvm_types: RefCell<HashMap<ResoType, BasicTypeEnum<'ctx>>>,
    resource_structs: RefCell<HashMap<ResourceTypeId, inkwell::types::StructType<'ctx>>>,
    current_function: RefCell<Option<FunctionValue<'ctx>>>,
    loop_stack: RefCell<Vec<LoopContext<'ctx>>>,
    global_strings: RefCell<HashMap<String, PointerValue<'ctx>>>,
    runtime_fns: RefCell<HashMap<&'static str, FunctionValue<'ctx>>>,
}

impl<'ctx> CodegenContext<'ctx> {
    pub fn new(
        context: &'ctx Context,
        module_name: &str,
        registry: Rc<TypeRegistry<'ctx>>,
        options: CodegenOptions,
    ) -> Self {
        CodegenContext {
            context,
            module: context.create_module(module_name),
            builder: context.create_builder(),
            registry,
            symbols: SymbolTable::new(),
            diagnostics: RefCell::new(Diagnostics::new()),
            options,
            llvm_types: RefCell::new(HashMap::new()),
            resource_structs: RefCell::new(HashMap::new()),
            current_function: RefCell::new(None),
            loop_stack: RefCell::new(Vec::new()),
            global_strings: RefCell::new(HashMap::new()),
            runtime_fns: RefCell::new(HashMap::new()),
        }
    }

    // -- current function ----------------------------------------------------

    pub fn current_function(&self) -> Option<FunctionValue<'ctx>> {
        *self.current_function.borrow()
    }

    /// Install `function` as current, returning the previous one so the
    /// caller can restore it on the way out.
    pub fn enter_function(&self, function: FunctionValue<'ctx>) -> Option<FunctionValue<'ctx>> {
        self.current_function.replace(Some(function))
    }

    pub fn restore_function(&self, previous: Option<FunctionValue<'ctx>>) {
        *self.current_function.borrow_mut() = previous;
    }

    // -- loop context stack ---------------------------------------------------

    pub fn push_loop(&self, ctx: LoopContext<'ctx>) {
        self.loop_stack.borrow_mut().push(ctx);
    }

    pub fn pop_loop(&self) {
        self.loop_stack.borrow_mut().pop();
    }

    pub fn innermost_loop(&self) -> Option<LoopContext<'ctx>> {
        self.loop_stack.borrow().last().copied()
    }

    // -- global string cache --------------------------------------------------

    /// Return the cached pointer to an already-interned global string, or
    /// create, cache and return a new one.
    pub fn global_string(&self, bytes: &[u8]) -> PointerValue<'ctx> {
        let key = String::from_utf8_lossy(bytes).into_owned() + &format!("\0len{}", bytes.len());
        if let Some(ptr) = self.global_strings.borrow().get(&key) {
            return *ptr;
        }
        let array_ty = self.context.i8_type().array_type(bytes.len() as u32);
        let global = self.module.add_global(array_ty, None, ".str");
        let constant = self.context.const_string(bytes, false);
        global.set_initializer(&constant);
        global.set_constant(true);
        let ptr = global.as_pointer_value();
        self.global_strings.borrow_mut().insert(key, ptr);
        ptr
    }

    // -- LLVM type cache ------------------------------------------------------

    pub fn llvm_type(&self, reso_type: &ResoType) -> BasicTypeEnum<'ctx> {
        if let Some(cached) = self.llvm_types.borrow().get(reso_type) {
            return *cached;
        }
        let built = self.build_llvm_type(reso_type);
        self.llvm_types
            .borrow_mut()
            .insert(reso_type.clone(), built);
        built
    }

    fn build_llvm_type(&self, reso_type: &ResoType) -> BasicTypeEnum<'ctx> {
        use crate::types::{FloatWidth, IntWidth};
        match reso_type {
            ResoType::Int(width) => match width {
                IntWidth::I8 | IntWidth::U8 => self.context.i8_type().into(),
                IntWidth::I16 | IntWidth::U16 => self.context.i16_type().into(),
                IntWidth::I32 | IntWidth::U32 => self.context.i32_type().into(),
                IntWidth::I64 | IntWidth::U64 => self.context.i64_type().into(),
                IntWidth::ISize | IntWidth::USize => match self.options.pointer_width {
                    32 => self.context.i32_type().into(),
                    64 => self.context.i64_type().into(),
                    other => self.context.custom_width_int_type(other).into(),
                },
            },
            ResoType::Float(FloatWidth::F32) => self.context.f32_type().into(),
            ResoType::Float(FloatWidth::F64) => self.context.f64_type().into(),
            ResoType::Bool => self.context.bool_type().into(),
            ResoType::Char => self.context.i32_type().into(),
            ResoType::Null => self.context.ptr_type(AddressSpace::default()).into(),
            ResoType::Unit => self.context.struct_type(&[], false).into(),
            ResoType::Resource(_) => self.context.ptr_type(AddressSpace::default()).into(),
            ResoType::Generic(_) => {
                panic!("unresolved generic placeholder reached codegen's type cache")
            }
        }
    }

    // -- resource struct layout -----------------------------------------------

    /// The named LLVM struct backing one resource instance, created opaque
    /// on first use and given a body from the registry's field list.
    /// `Vector<T>` is special-cased: its registered "elements" field carries
    /// the *element* type for semantic lookups, but the actual struct field
    /// is a pointer (see `codegen::vector`).
    pub fn resource_struct_type(&self, id: ResourceTypeId) -> inkwell::types::StructType<'ctx> {
        if let Some(existing) = self.resource_structs.borrow().get(&id) {
            return *existing;
        }
        let name = {
            let data = self.registry.get(id);
            format!("{}.{}", data.name, id.index())
        };
        let struct_ty = self.context.opaque_struct_type(&name);
        self.resource_structs.borrow_mut().insert(id, struct_ty);
        self.set_resource_struct_body(id, struct_ty);
        struct_ty
    }

    fn set_resource_struct_body(&self, id: ResourceTypeId, struct_ty: inkwell::types::StructType<'ctx>) {
        let is_vector = self.registry.get(id).name == "Vector";
        if is_vector {
            let usize_ty = self.llvm_type(&ResoType::Int(crate::types::IntWidth::USize));
            let ptr_ty = self.context.ptr_type(AddressSpace::default());
            struct_ty.set_body(&[ptr_ty.into(), usize_ty, usize_ty], false);
            return;
        }
        let field_types: Vec<BasicTypeEnum> = self
            .registry
            .get(id)
            .fields
            .iter()
            .map(|(_, ty)| self.llvm_type(ty))
            .collect();
        struct_ty.set_body(&field_types, false);
    }

    // -- runtime hooks --

    pub fn gc_init_fn(&self) -> FunctionValue<'ctx> {
        self.runtime_fn("gc_init", || {
            let fn_type = self.context.void_type().fn_type(&[], false);
            self.module.add_function("GC_init", fn_type, None)
        })
    }

    pub fn gc_malloc_fn(&self) -> FunctionValue<'ctx> {
        self.runtime_fn("gc_malloc", || {
            let usize_ty = self.llvm_type(&ResoType::Int(crate::types::IntWidth::USize));
            let ptr_ty = self.context.ptr_type(AddressSpace::default());
            let fn_type = ptr_ty.fn_type(&[usize_ty.into()], false);
            self.module.add_function("GC_malloc", fn_type, None)
        })
    }

    pub fn gc_malloc_atomic_fn(&self) -> FunctionValue<'ctx> {
        self.runtime_fn("gc_malloc_atomic", || {
            let usize_ty = self.llvm_type(&ResoType::Int(crate::types::IntWidth::USize));
            let ptr_ty = self.context.ptr_type(AddressSpace::default());
            let fn_type = ptr_ty.fn_type(&[usize_ty.into()], false);
            self.module.add_function("GC_malloc_atomic", fn_type, None)
        })
    }

    fn runtime_fn(
        &self,
        key: &'static str,
        build: impl FnOnce() -> FunctionValue<'ctx>,
    ) -> FunctionValue<'ctx> {
        if let Some(f) = self.runtime_fns.borrow().get(key) {
            return *f;
        }
        let f = build();
        self.runtime_fns.borrow_mut().insert(key, f);
        f
    }
}
