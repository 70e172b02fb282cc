//! Lazy registration of the built-in `Vector<T>` and `String` resource types.
//! `Vector<T>` is a template instantiated once per distinct element type;
//! the first expression that needs a given instantiation registers its
//! methods, and every later use finds them already there.

use crate::codegen::{vector, CodegenContext};
use crate::symbols::Visibility;
use crate::types::{IntWidth, ResoType, ResourceTypeId};

/// Get-or-create the `Vector<element>` resource, registering its method set
/// the first time this exact element type is instantiated.
pub fn ensure_vector_type<'ctx>(ctx: &CodegenContext<'ctx>, element: ResoType) -> ResourceTypeId {
    let file = ctx.symbols.current_file();
    let usize_ty = ResoType::Int(IntWidth::USize);
    let id = ctx.registry.get_or_create_vector_type(element, usize_ty, file);
    let already_registered = !ctx.registry.get(id).methods.is_empty();
    if !already_registered {
        vector::register_methods(&ctx.registry, id, file);
    }
    id
}

/// Get-or-create the built-in `String` resource: a single `data: Vector<u8>`
/// field, no methods of its own.
pub fn ensure_string_type<'ctx>(ctx: &CodegenContext<'ctx>) -> ResourceTypeId {
    let file = ctx.symbols.current_file();
    let vector_u8 = ensure_vector_type(ctx, ResoType::Int(IntWidth::U8));
    let id = ctx
        .registry
        .get_or_create("String", Vec::new(), Visibility::Global, file);
    let needs_fields = ctx.registry.get(id).fields.is_empty();
    if needs_fields {
        ctx.registry
            .set_fields(id, vec![("data".to_string(), ResoType::Resource(vector_u8))]);
    }
    id
}
