//! The `Vector<T>` built-in.
//!
//! Follows a load-receiver, GEP-to-field, sequential-builder-instructions
//! call-emission style for `get`/`set`/`add`/`insert`/`remove`/`size`/
//! `capacity`. The GC-backed resize/shift logic has no precedent elsewhere
//! in the crate since there's no other growable built-in collection; it's
//! built directly from the capacity-growth and bounds-check invariants this
//! type needs to hold.

use inkwell::values::{IntValue, PointerValue};
use inkwell::{AddressSpace, IntPredicate};

use crate::codegen::CodegenContext;
use crate::diagnostics::Span;
use crate::symbols::{CallBuilder, MethodSymbol, PathSegment, Visibility};
use crate::types::{FileId, IntWidth, ResoType, ResourceTypeId};
use crate::value::ConcreteResoValue;

const ELEMENTS_IDX: u32 = 0;
const SIZE_IDX: u32 = 1;
const CAPACITY_IDX: u32 = 2;

fn usize_ty() -> ResoType {
    ResoType::Int(IntWidth::USize)
}

fn struct_ptr<'ctx>(receiver: &ConcreteResoValue<'ctx>) -> PointerValue<'ctx> {
    receiver.ir_value.into_pointer_value()
}

fn load_field<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver_ptr: PointerValue<'ctx>,
    field_idx: u32,
    field_llvm_ty: inkwell::types::BasicTypeEnum<'ctx>,
    name: &str,
) -> inkwell::values::BasicValueEnum<'ctx> {
    let struct_ty = ctx.resource_struct_type(vector_id);
    let field_ptr = ctx
        .builder
        .build_struct_gep(struct_ty, receiver_ptr, field_idx, &format!("{name}_ptr"))
        .expect("vector field index is in range");
    ctx.builder
        .build_load(field_llvm_ty, field_ptr, name)
        .expect("load never fails on a valid pointer")
}

fn store_field<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver_ptr: PointerValue<'ctx>,
    field_idx: u32,
    value: inkwell::values::BasicValueEnum<'ctx>,
    name: &str,
) {
    let struct_ty = ctx.resource_struct_type(vector_id);
    let field_ptr = ctx
        .builder
        .build_struct_gep(struct_ty, receiver_ptr, field_idx, &format!("{name}_ptr"))
        .expect("vector field index is in range");
    ctx.builder.build_store(field_ptr, value).ok();
}

fn element_type(ctx: &CodegenContext, vector_id: ResourceTypeId) -> ResoType {
    ctx.registry.get(vector_id).generics[0].clone()
}

/// Emit an `unreachable` terminator in a fresh block reached when a bounds
/// check fails.
fn emit_bounds_failure<'ctx>(ctx: &CodegenContext<'ctx>, fail_block: inkwell::basic_block::BasicBlock<'ctx>) {
    ctx.builder.position_at_end(fail_block);
    ctx.builder.build_unreachable().ok();
}

/// `vector()`: allocate the struct and backing array at initial capacity 8,
/// size 0. The array slots themselves are never initialized; only the first
/// `size` elements are ever considered live.
pub fn emit_constructor<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let element_ty = element_type(ctx, vector_id);
    let element_llvm = ctx.llvm_type(&element_ty);
    let usize_llvm = ctx.llvm_type(&usize_ty()).into_int_type();
    let struct_ty = ctx.resource_struct_type(vector_id);

    let struct_size = struct_ty.size_of()?;
    let instance_ptr = ctx
        .builder
        .build_call(ctx.gc_malloc_fn(), &[struct_size.into()], "vec_instance")
        .ok()?
        .try_as_basic_value()
        .left()?
        .into_pointer_value();

    let initial_capacity = usize_llvm.const_int(8, false);
    let element_size = element_llvm.size_of()?;
    let bytes = ctx
        .builder
        .build_int_mul(element_size, initial_capacity, "vec_bytes")
        .ok()?;
    let elements_ptr = ctx
        .builder
        .build_call(ctx.gc_malloc_fn(), &[bytes.into()], "vec_elems")
        .ok()?
        .try_as_basic_value()
        .left()?
        .into_pointer_value();

    store_field(ctx, vector_id, instance_ptr, ELEMENTS_IDX, elements_ptr.into(), "elements");
    store_field(ctx, vector_id, instance_ptr, SIZE_IDX, usize_llvm.const_zero().into(), "size");
    store_field(ctx, vector_id, instance_ptr, CAPACITY_IDX, initial_capacity.into(), "capacity");

    Some(ConcreteResoValue::new(
        ResoType::Resource(vector_id),
        instance_ptr.into(),
        span,
    ))
}

/// Wrap an already-allocated, already-populated element buffer in a fresh
/// `Vector<T>` instance, size and capacity both set to `len`. Skips the
/// constructor's own element allocation since the caller already owns one.
pub fn emit_from_existing_buffer<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    elements_ptr: PointerValue<'ctx>,
    len: IntValue<'ctx>,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let struct_ty = ctx.resource_struct_type(vector_id);
    let struct_size = struct_ty.size_of()?;
    let instance_ptr = ctx
        .builder
        .build_call(ctx.gc_malloc_fn(), &[struct_size.into()], "vec_instance")
        .ok()?
        .try_as_basic_value()
        .left()?
        .into_pointer_value();

    store_field(ctx, vector_id, instance_ptr, ELEMENTS_IDX, elements_ptr.into(), "elements");
    store_field(ctx, vector_id, instance_ptr, SIZE_IDX, len.into(), "size");
    store_field(ctx, vector_id, instance_ptr, CAPACITY_IDX, len.into(), "capacity");

    Some(ConcreteResoValue::new(
        ResoType::Resource(vector_id),
        instance_ptr.into(),
        span,
    ))
}

fn bounds_check<'ctx>(
    ctx: &CodegenContext<'ctx>,
    index: IntValue<'ctx>,
    bound: IntValue<'ctx>,
    predicate: IntPredicate,
    label: &str,
) -> Option<()> {
    let function = ctx.current_function()?;
    let ok_block = ctx.context.append_basic_block(function, &format!("{label}_ok"));
    let fail_block = ctx.context.append_basic_block(function, &format!("{label}_fail"));
    let cond = ctx
        .builder
        .build_int_compare(predicate, index, bound, &format!("{label}_cmp"))
        .ok()?;
    ctx.builder.build_conditional_branch(cond, ok_block, fail_block).ok()?;
    emit_bounds_failure(ctx, fail_block);
    ctx.builder.position_at_end(ok_block);
    Some(())
}

fn element_ptr_at<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver_ptr: PointerValue<'ctx>,
    index: IntValue<'ctx>,
) -> PointerValue<'ctx> {
    let element_ty = element_type(ctx, vector_id);
    let element_llvm = ctx.llvm_type(&element_ty);
    let elements_ptr = load_field(
        ctx,
        vector_id,
        receiver_ptr,
        ELEMENTS_IDX,
        ctx.context.ptr_type(AddressSpace::default()).into(),
        "elements",
    )
    .into_pointer_value();
    unsafe {
        ctx.builder
            .build_in_bounds_gep(element_llvm, elements_ptr, &[index], "elem_ptr")
            .expect("element pointer arithmetic never fails")
    }
}

fn emit_get<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver: &ConcreteResoValue<'ctx>,
    args: &[ConcreteResoValue<'ctx>],
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let receiver_ptr = struct_ptr(receiver);
    let index = args[0].ir_value.into_int_value();
    let usize_llvm = ctx.llvm_type(&usize_ty());
    let size = load_field(ctx, vector_id, receiver_ptr, SIZE_IDX, usize_llvm, "size").into_int_value();
    bounds_check(ctx, index, size, IntPredicate::ULT, "get_bounds")?;

    let element_ty = element_type(ctx, vector_id);
    let element_llvm = ctx.llvm_type(&element_ty);
    let element_ptr = element_ptr_at(ctx, vector_id, receiver_ptr, index);
    let value = ctx.builder.build_load(element_llvm, element_ptr, "elem").ok()?;
    Some(ConcreteResoValue::new(element_ty, value, span))
}

fn emit_set<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver: &ConcreteResoValue<'ctx>,
    args: &[ConcreteResoValue<'ctx>],
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let receiver_ptr = struct_ptr(receiver);
    let index = args[0].ir_value.into_int_value();
    let usize_llvm = ctx.llvm_type(&usize_ty());
    let size = load_field(ctx, vector_id, receiver_ptr, SIZE_IDX, usize_llvm, "size").into_int_value();
    bounds_check(ctx, index, size, IntPredicate::ULT, "set_bounds")?;

    let element_ptr = element_ptr_at(ctx, vector_id, receiver_ptr, index);
    ctx.builder.build_store(element_ptr, args[1].ir_value).ok()?;
    Some(ConcreteResoValue::new(ResoType::Unit, unit_value(ctx), span))
}

fn unit_value<'ctx>(ctx: &CodegenContext<'ctx>) -> inkwell::values::BasicValueEnum<'ctx> {
    ctx.context.const_struct(&[], false).into()
}

/// Grow the backing array if `size >= capacity`: new capacity is `max(1,
/// 2*old)` (doubling; `1` the first time an empty vector would otherwise
/// double `0`), GC-allocate, memcpy the live elements across, update both
/// the pointer and capacity fields.
fn ensure_capacity<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver_ptr: PointerValue<'ctx>,
    size: IntValue<'ctx>,
    capacity: IntValue<'ctx>,
) -> Option<IntValue<'ctx>> {
    let usize_llvm = ctx.llvm_type(&usize_ty()).into_int_type();
    let function = ctx.current_function()?;
    let needs_growth = ctx
        .builder
        .build_int_compare(IntPredicate::UGE, size, capacity, "needs_growth")
        .ok()?;
    let no_growth_block = ctx.builder.get_insert_block()?;

    let grow_block = ctx.context.append_basic_block(function, "vec_grow");
    let after_block = ctx.context.append_basic_block(function, "vec_after_grow");
    ctx.builder
        .build_conditional_branch(needs_growth, grow_block, after_block)
        .ok()?;

    ctx.builder.position_at_end(grow_block);
    let doubled = ctx.builder.build_int_mul(capacity, usize_llvm.const_int(2, false), "doubled").ok()?;
    let is_zero = ctx
        .builder
        .build_int_compare(IntPredicate::EQ, capacity, usize_llvm.const_zero(), "cap_is_zero")
        .ok()?;
    let new_capacity = ctx
        .builder
        .build_select(is_zero, usize_llvm.const_int(1, false), doubled, "new_capacity")
        .ok()?
        .into_int_value();

    let element_ty = element_type(ctx, vector_id);
    let element_llvm = ctx.llvm_type(&element_ty);
    let element_size = element_llvm.size_of()?;
    let new_bytes = ctx.builder.build_int_mul(element_size, new_capacity, "new_bytes").ok()?;
    let new_elements = ctx
        .builder
        .build_call(ctx.gc_malloc_fn(), &[new_bytes.into()], "vec_new_elems")
        .ok()?
        .try_as_basic_value()
        .left()?
        .into_pointer_value();

    let old_elements = load_field(
        ctx,
        vector_id,
        receiver_ptr,
        ELEMENTS_IDX,
        ctx.context.ptr_type(AddressSpace::default()).into(),
        "elements",
    )
    .into_pointer_value();
    let old_bytes = ctx.builder.build_int_mul(element_size, size, "old_bytes").ok()?;
    ctx.builder
        .build_memcpy(new_elements, 1, old_elements, 1, old_bytes)
        .ok()?;

    store_field(ctx, vector_id, receiver_ptr, ELEMENTS_IDX, new_elements.into(), "elements");
    store_field(ctx, vector_id, receiver_ptr, CAPACITY_IDX, new_capacity.into(), "capacity");
    let grow_end_block = ctx.builder.get_insert_block()?;
    ctx.builder.build_unconditional_branch(after_block).ok()?;

    ctx.builder.position_at_end(after_block);
    let phi = ctx.builder.build_phi(usize_llvm, "capacity_after_grow").ok()?;
    phi.add_incoming(&[(&new_capacity, grow_end_block), (&capacity, no_growth_block)]);
    Some(phi.as_basic_value().into_int_value())
}

fn emit_add<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver: &ConcreteResoValue<'ctx>,
    args: &[ConcreteResoValue<'ctx>],
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let receiver_ptr = struct_ptr(receiver);
    let usize_llvm = ctx.llvm_type(&usize_ty());
    let size = load_field(ctx, vector_id, receiver_ptr, SIZE_IDX, usize_llvm, "size").into_int_value();
    let capacity = load_field(ctx, vector_id, receiver_ptr, CAPACITY_IDX, usize_llvm, "capacity").into_int_value();
    ensure_capacity(ctx, vector_id, receiver_ptr, size, capacity)?;

    let element_ptr = element_ptr_at(ctx, vector_id, receiver_ptr, size);
    ctx.builder.build_store(element_ptr, args[0].ir_value).ok()?;

    let usize_ty_llvm = usize_llvm.into_int_type();
    let new_size = ctx.builder.build_int_add(size, usize_ty_llvm.const_int(1, false), "new_size").ok()?;
    store_field(ctx, vector_id, receiver_ptr, SIZE_IDX, new_size.into(), "size");
    Some(ConcreteResoValue::new(ResoType::Unit, unit_value(ctx), span))
}

fn emit_insert<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver: &ConcreteResoValue<'ctx>,
    args: &[ConcreteResoValue<'ctx>],
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let receiver_ptr = struct_ptr(receiver);
    let index = args[0].ir_value.into_int_value();
    let usize_llvm = ctx.llvm_type(&usize_ty());
    let usize_ty_llvm = usize_llvm.into_int_type();
    let size = load_field(ctx, vector_id, receiver_ptr, SIZE_IDX, usize_llvm, "size").into_int_value();
    let capacity = load_field(ctx, vector_id, receiver_ptr, CAPACITY_IDX, usize_llvm, "capacity").into_int_value();
    bounds_check(ctx, index, ctx.builder.build_int_add(size, usize_ty_llvm.const_int(1, false), "size_plus_one").ok()?, IntPredicate::ULT, "insert_bounds")?;

    ensure_capacity(ctx, vector_id, receiver_ptr, size, capacity)?;

    let element_ty = element_type(ctx, vector_id);
    let element_llvm = ctx.llvm_type(&element_ty);
    let element_size = element_llvm.size_of()?;
    let shift_count = ctx.builder.build_int_sub(size, index, "shift_count").ok()?;
    let shift_bytes = ctx.builder.build_int_mul(element_size, shift_count, "shift_bytes").ok()?;
    let src_ptr = element_ptr_at(ctx, vector_id, receiver_ptr, index);
    let index_plus_one = ctx.builder.build_int_add(index, usize_ty_llvm.const_int(1, false), "index_plus_one").ok()?;
    let dst_ptr = element_ptr_at(ctx, vector_id, receiver_ptr, index_plus_one);
    ctx.builder.build_memmove(dst_ptr, 1, src_ptr, 1, shift_bytes).ok()?;

    ctx.builder.build_store(src_ptr, args[1].ir_value).ok()?;
    let new_size = ctx.builder.build_int_add(size, usize_ty_llvm.const_int(1, false), "new_size").ok()?;
    store_field(ctx, vector_id, receiver_ptr, SIZE_IDX, new_size.into(), "size");
    Some(ConcreteResoValue::new(ResoType::Unit, unit_value(ctx), span))
}

fn emit_remove<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver: &ConcreteResoValue<'ctx>,
    args: &[ConcreteResoValue<'ctx>],
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let receiver_ptr = struct_ptr(receiver);
    let index = args[0].ir_value.into_int_value();
    let usize_llvm = ctx.llvm_type(&usize_ty());
    let usize_ty_llvm = usize_llvm.into_int_type();
    let size = load_field(ctx, vector_id, receiver_ptr, SIZE_IDX, usize_llvm, "size").into_int_value();
    bounds_check(ctx, index, size, IntPredicate::ULT, "remove_bounds")?;

    let element_ty = element_type(ctx, vector_id);
    let element_llvm = ctx.llvm_type(&element_ty);
    let removed_ptr = element_ptr_at(ctx, vector_id, receiver_ptr, index);
    let removed_value = ctx.builder.build_load(element_llvm, removed_ptr, "removed").ok()?;

    let index_plus_one = ctx.builder.build_int_add(index, usize_ty_llvm.const_int(1, false), "index_plus_one").ok()?;
    let last_index = ctx.builder.build_int_sub(size, usize_ty_llvm.const_int(1, false), "last_index").ok()?;
    let has_trailing = ctx
        .builder
        .build_int_compare(IntPredicate::ULT, index, last_index, "has_trailing")
        .ok()?;

    let function = ctx.current_function()?;
    let shift_block = ctx.context.append_basic_block(function, "remove_shift");
    let after_block = ctx.context.append_basic_block(function, "remove_after");
    ctx.builder.build_conditional_branch(has_trailing, shift_block, after_block).ok()?;

    ctx.builder.position_at_end(shift_block);
    let element_size = element_llvm.size_of()?;
    let shift_count = ctx.builder.build_int_sub(size, index_plus_one, "shift_count").ok()?;
    let shift_bytes = ctx.builder.build_int_mul(element_size, shift_count, "shift_bytes").ok()?;
    let src_ptr = element_ptr_at(ctx, vector_id, receiver_ptr, index_plus_one);
    let dst_ptr = element_ptr_at(ctx, vector_id, receiver_ptr, index);
    ctx.builder.build_memmove(dst_ptr, 1, src_ptr, 1, shift_bytes).ok()?;
    ctx.builder.build_unconditional_branch(after_block).ok()?;

    ctx.builder.position_at_end(after_block);
    let new_size = ctx.builder.build_int_sub(size, usize_ty_llvm.const_int(1, false), "new_size").ok()?;
    store_field(ctx, vector_id, receiver_ptr, SIZE_IDX, new_size.into(), "size");

    Some(ConcreteResoValue::new(element_ty, removed_value, span))
}

fn emit_size<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver: &ConcreteResoValue<'ctx>,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let usize_llvm = ctx.llvm_type(&usize_ty());
    let value = load_field(ctx, vector_id, struct_ptr(receiver), SIZE_IDX, usize_llvm, "size");
    Some(ConcreteResoValue::new(usize_ty(), value, span))
}

fn emit_capacity<'ctx>(
    ctx: &CodegenContext<'ctx>,
    vector_id: ResourceTypeId,
    receiver: &ConcreteResoValue<'ctx>,
    span: Span,
) -> Option<ConcreteResoValue<'ctx>> {
    let usize_llvm = ctx.llvm_type(&usize_ty());
    let value = load_field(ctx, vector_id, struct_ptr(receiver), CAPACITY_IDX, usize_llvm, "capacity");
    Some(ConcreteResoValue::new(usize_ty(), value, span))
}

/// Register every `Vector<T>` method's [`CallBuilder`] against `vector_id`.
pub fn register_methods<'ctx>(
    registry: &crate::types::TypeRegistry<'ctx>,
    vector_id: ResourceTypeId,
    file: FileId,
) {
    let element_ty = element_type_from_registry(registry, vector_id);
    let usize_param = usize_ty();

    let indexer_path = vec![PathSegment::Indexer {
        name: "index".to_string(),
        ty: usize_param.clone(),
    }];

    add_method(
        registry,
        vector_id,
        indexer_path.clone(),
        "get",
        element_ty.clone(),
        vec![],
        file,
        builder(|ctx, receiver, args, span| {
            emit_get(ctx, vector_id, receiver.as_ref()?, args, span)
        }),
    );
    add_method(
        registry,
        vector_id,
        indexer_path,
        "set",
        ResoType::Unit,
        vec![element_ty.clone()],
        file,
        builder(|ctx, receiver, args, span| {
            emit_set(ctx, vector_id, receiver.as_ref()?, args, span)
        }),
    );
    add_method(
        registry,
        vector_id,
        vec![],
        "add",
        ResoType::Unit,
        vec![element_ty.clone()],
        file,
        builder(|ctx, receiver, args, span| {
            emit_add(ctx, vector_id, receiver.as_ref()?, args, span)
        }),
    );
    add_method(
        registry,
        vector_id,
        vec![],
        "insert",
        ResoType::Unit,
        vec![usize_param.clone(), element_ty.clone()],
        file,
        builder(|ctx, receiver, args, span| {
            emit_insert(ctx, vector_id, receiver.as_ref()?, args, span)
        }),
    );
    add_method(
        registry,
        vector_id,
        vec![],
        "remove",
        element_ty.clone(),
        vec![usize_param.clone()],
        file,
        builder(|ctx, receiver, args, span| {
            emit_remove(ctx, vector_id, receiver.as_ref()?, args, span)
        }),
    );
    add_method(
        registry,
        vector_id,
        vec![],
        "size",
        usize_param.clone(),
        vec![],
        file,
        builder(|ctx, receiver, _args, span| emit_size(ctx, vector_id, receiver.as_ref()?, span)),
    );
    add_method(
        registry,
        vector_id,
        vec![],
        "capacity",
        usize_param,
        vec![],
        file,
        builder(|ctx, receiver, _args, span| emit_capacity(ctx, vector_id, receiver.as_ref()?, span)),
    );
}

fn element_type_from_registry(registry: &crate::types::TypeRegistry<'_>, vector_id: ResourceTypeId) -> ResoType {
    registry.get(vector_id).generics[0].clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodegenOptions;
    use crate::types::TypeRegistry;
    use inkwell::context::Context;
    use std::rc::Rc;

    fn setup<'ctx>(context: &'ctx Context, registry: Rc<TypeRegistry<'ctx>>) -> (CodegenContext<'ctx>, ResourceTypeId) {
        let ctx = CodegenContext::new(context, "vector_test", registry, CodegenOptions::default());
        let fn_type = context.i32_type().fn_type(&[], false);
        let function = ctx.module.add_function("harness", fn_type, None);
        let entry = context.append_basic_block(function, "entry");
        ctx.builder.position_at_end(entry);
        ctx.enter_function(function);
        let vector_id = ctx
            .registry
            .get_or_create_vector_type(ResoType::Int(IntWidth::I32), usize_ty(), FileId(0));
        register_methods(&ctx.registry, vector_id, FileId(0));
        (ctx, vector_id)
    }

    #[test]
    fn get_and_set_take_only_the_indexer_contributed_param() {
        let context = Context::create();
        let registry = Rc::new(TypeRegistry::new());
        let (ctx, vector_id) = setup(&context, registry);

        let get = ctx
            .registry
            .find_method(vector_id, "{Indexer}", "get")
            .expect("get is registered under the indexer path");
        assert_eq!(get.params.len(), 2, "receiver + indexer usize, no explicit args");
        assert_eq!(get.params[1], usize_ty());

        let set = ctx
            .registry
            .find_method(vector_id, "{Indexer}", "set")
            .expect("set is registered under the indexer path");
        assert_eq!(set.params.len(), 3, "receiver + indexer usize + one explicit element");
        assert_eq!(set.params[2], ResoType::Int(IntWidth::I32));
    }

    #[test]
    fn arr_i_get_with_zero_explicit_args_does_not_hit_arg_count_mismatch() {
        // Regression for the arity bug: a correct `arr[i].get()` call site
        // supplies 0 explicit args, which must equal `params[2..].len()`.
        let context = Context::create();
        let registry = Rc::new(TypeRegistry::new());
        let (ctx, vector_id) = setup(&context, registry);
        let get = ctx.registry.find_method(vector_id, "{Indexer}", "get").unwrap();
        let explicit_param_types = &get.params[1 + 1..];
        assert_eq!(explicit_param_types.len(), 0);
    }

    #[test]
    fn arr_i_set_v_with_one_explicit_arg_does_not_hit_arg_count_mismatch() {
        let context = Context::create();
        let registry = Rc::new(TypeRegistry::new());
        let (ctx, vector_id) = setup(&context, registry);
        let set = ctx.registry.find_method(vector_id, "{Indexer}", "set").unwrap();
        let explicit_param_types = &set.params[1 + 1..];
        assert_eq!(explicit_param_types.len(), 1);
    }

    #[test]
    fn get_after_add_returns_the_element_type() {
        let context = Context::create();
        let registry = Rc::new(TypeRegistry::new());
        let (ctx, vector_id) = setup(&context, registry);
        let span = Span::default();

        let instance = emit_constructor(&ctx, vector_id, span).expect("constructor emits");
        let element = ConcreteResoValue::new(
            ResoType::Int(IntWidth::I32),
            ctx.context.i32_type().const_int(42, false).into(),
            span,
        );
        emit_add(&ctx, vector_id, &instance, &[element], span).expect("add emits");

        let index = ConcreteResoValue::new(usize_ty(), ctx.llvm_type(&usize_ty()).into_int_type().const_zero().into(), span);
        let got = emit_get(&ctx, vector_id, &instance, &[index], span).expect("get emits");
        assert_eq!(got.reso_type, ResoType::Int(IntWidth::I32));
    }

    #[test]
    fn insert_then_remove_round_trip_the_element_type() {
        let context = Context::create();
        let registry = Rc::new(TypeRegistry::new());
        let (ctx, vector_id) = setup(&context, registry);
        let span = Span::default();

        let instance = emit_constructor(&ctx, vector_id, span).expect("constructor emits");
        let usize_llvm = ctx.llvm_type(&usize_ty()).into_int_type();
        let zero = ConcreteResoValue::new(usize_ty(), usize_llvm.const_zero().into(), span);
        let element = ConcreteResoValue::new(
            ResoType::Int(IntWidth::I32),
            ctx.context.i32_type().const_int(7, false).into(),
            span,
        );
        emit_insert(&ctx, vector_id, &instance, &[zero.clone(), element], span).expect("insert emits");
        let removed = emit_remove(&ctx, vector_id, &instance, &[zero], span).expect("remove emits");
        assert_eq!(removed.reso_type, ResoType::Int(IntWidth::I32));
    }

    #[test]
    fn each_add_call_emits_its_own_runtime_growth_check() {
        let context = Context::create();
        let registry = Rc::new(TypeRegistry::new());
        let (ctx, vector_id) = setup(&context, registry);
        let span = Span::default();
        let function = ctx.current_function().unwrap();

        let instance = emit_constructor(&ctx, vector_id, span).expect("constructor emits");
        let before = function.get_basic_blocks().len();
        for i in 0..3u64 {
            let element = ConcreteResoValue::new(
                ResoType::Int(IntWidth::I32),
                ctx.context.i32_type().const_int(i, false).into(),
                span,
            );
            emit_add(&ctx, vector_id, &instance, &[element], span).expect("add emits");
        }
        let after = function.get_basic_blocks().len();
        // `ensure_capacity` branches into a `vec_grow`/`vec_after_grow` pair
        // every call, since the check is a runtime comparison, not a
        // compile-time one.
        assert_eq!(after - before, 3 * 2);
    }
}

fn builder<'ctx>(
    f: impl Fn(
            &CodegenContext<'ctx>,
            Option<ConcreteResoValue<'ctx>>,
            &[ConcreteResoValue<'ctx>],
            Span,
        ) -> Option<ConcreteResoValue<'ctx>>
        + 'ctx,
) -> CallBuilder<'ctx> {
    std::rc::Rc::new(move |ctx, receiver, args, span| f(ctx, receiver, args, span))
}

#[allow(clippy::too_many_arguments)]
fn add_method<'ctx>(
    registry: &crate::types::TypeRegistry<'ctx>,
    vector_id: ResourceTypeId,
    path: Vec<PathSegment>,
    name: &str,
    return_type: ResoType,
    explicit_params: Vec<ResoType>,
    file: FileId,
    call_builder: CallBuilder<'ctx>,
) {
    let mut params = vec![ResoType::Resource(vector_id)];
    for seg in &path {
        if let PathSegment::Indexer { ty, .. } = seg {
            params.push(ty.clone());
        }
    }
    params.extend(explicit_params);

    let path_str = crate::symbols::path_to_string(&path);
    registry.add_method(
        vector_id,
        path_str,
        name.to_string(),
        MethodSymbol {
            name: name.to_string(),
            return_type,
            params,
            ir_value: None,
            visibility: Visibility::Global,
            path,
            call_builder: Some(call_builder),
        },
    );
}
