//! Passes 1 and 2 of the pipeline: forward-declare every
//! function signature, then every resource's opaque struct, fields and
//! methods, before any body is emitted. Two passes (rather than one) let a
//! function call or field access reach a symbol declared later in the same
//! file, or in a file that hasn't been visited yet.
//!
//! Two-pass module handling (register every signature, then check bodies),
//! adapted so pass 2 also builds the actual LLVM function values for
//! methods, since this crate does type resolution and codegen in one pass.

use inkwell::types::BasicMetadataTypeEnum;

use crate::ast;
use crate::codegen::expression::resolve_type_ref;
use crate::codegen::CodegenContext;
use crate::diagnostics::ErrorKind;
use crate::symbols::{FunctionSymbol, MethodSymbol, PathSegment, Visibility};
use crate::types::ResoType;

fn visibility_of(is_public: bool) -> Visibility {
    if is_public {
        Visibility::Global
    } else {
        Visibility::FilePrivate
    }
}

fn llvm_param_types<'ctx>(ctx: &CodegenContext<'ctx>, params: &[ResoType]) -> Vec<BasicMetadataTypeEnum<'ctx>> {
    params.iter().map(|t| ctx.llvm_type(t).into()).collect()
}

/// Pass 1: declare every top-level function's LLVM signature and symbol
/// table entry. `main` must be explicitly declared
/// returning `i32` with no parameters; any other function defaults its
/// return type to `()` when omitted.
pub fn register_function_signatures<'ctx>(ctx: &CodegenContext<'ctx>, unit: &ast::CompilationUnit) {
    ctx.symbols.push_file(unit.file);
    for item in &unit.items {
        if let ast::TopLevelItem::Function(def) = item {
            register_one_function(ctx, def);
        }
    }
    ctx.symbols.pop_file();
}

fn register_one_function<'ctx>(ctx: &CodegenContext<'ctx>, def: &ast::FunctionDef) {
    let is_main = def.name == "main";
    let return_type = if is_main {
        match &def.return_type {
            Some(ty) if ty.name == "i32" => ResoType::Int(crate::types::IntWidth::I32),
            _ => {
                ctx.diagnostics.borrow_mut().report(
                    ErrorKind::TypeMismatch {
                        expected: "i32".to_string(),
                        actual: def
                            .return_type
                            .as_ref()
                            .map(|t| t.name.clone())
                            .unwrap_or_else(|| "()".to_string()),
                    },
                    def.span,
                );
                return;
            }
        }
    } else {
        match &def.return_type {
            Some(ty) => {
                let Some(resolved) = resolve_type_ref(ctx, ty) else {
                    return;
                };
                resolved
            }
            None => ResoType::Unit,
        }
    };
    if is_main && !def.params.is_empty() {
        ctx.diagnostics.borrow_mut().report(
            ErrorKind::ArgCountMismatch {
                expected: 0,
                actual: def.params.len(),
            },
            def.span,
        );
        return;
    }

    let mut params = Vec::with_capacity(def.params.len());
    for param in &def.params {
        let Some(ty) = resolve_type_ref(ctx, &param.ty) else {
            return;
        };
        params.push(ty);
    }

    let fn_llvm_ty = match return_type {
        ResoType::Unit => ctx
            .context
            .void_type()
            .fn_type(&llvm_param_types(ctx, &params), false),
        ref other => ctx.llvm_type(other).fn_type(&llvm_param_types(ctx, &params), false),
    };
    let ir_value = ctx.module.add_function(&def.name, fn_llvm_ty, None);
    log::trace!("registered function signature '{}'", def.name);

    let symbol = FunctionSymbol {
        name: def.name.clone(),
        return_type,
        params,
        ir_value: Some(ir_value),
        visibility: if is_main { Visibility::Global } else { visibility_of(def.is_public) },
        file: ctx.symbols.current_file(),
        call_builder: None,
    };
    if let Err(kind) = ctx.symbols.define_function(symbol) {
        ctx.diagnostics.borrow_mut().report(kind, def.span);
    }
}

/// Pass 2, step 1: register every resource's opaque struct (empty fields)
/// across every file first, so mutually recursive resources resolve their
/// field types against an existing handle.
pub fn register_opaque_resources<'ctx>(ctx: &CodegenContext<'ctx>, unit: &ast::CompilationUnit) {
    for item in &unit.items {
        if let ast::TopLevelItem::Resource(def) = item {
            ctx.registry
                .get_or_create(&def.name, Vec::new(), visibility_of(def.is_public), unit.file);
            log::trace!("registered opaque resource '{}'", def.name);
        }
    }
}

/// Pass 2, step 2: fill in each resource's fields and methods. Monomorphized user-resource generics are out of scope
/// (`DESIGN.md` Open Question); `def.generics` is validated for uniqueness
/// but field/method types that reference a generic parameter by name simply
/// fail to resolve as `UnknownType`, the same as any other undeclared name.
pub fn register_resource_bodies<'ctx>(ctx: &CodegenContext<'ctx>, unit: &ast::CompilationUnit) {
    ctx.symbols.push_file(unit.file);
    for item in &unit.items {
        if let ast::TopLevelItem::Resource(def) = item {
            register_one_resource(ctx, def);
        }
    }
    ctx.symbols.pop_file();
}

fn register_one_resource<'ctx>(ctx: &CodegenContext<'ctx>, def: &ast::ResourceDef) {
    let Some(resource_id) = ctx.registry.lookup_by_name(&def.name) else {
        return;
    };

    let mut fields = Vec::with_capacity(def.fields.len());
    for field in &def.fields {
        let Some(ty) = resolve_type_ref(ctx, &field.ty) else {
            continue;
        };
        fields.push((field.name.clone(), ty));
    }
    ctx.registry.set_fields(resource_id, fields);

    for group in &def.paths {
        register_path_group(ctx, resource_id, def, group);
    }
}

fn register_path_group<'ctx>(
    ctx: &CodegenContext<'ctx>,
    resource_id: crate::types::ResourceTypeId,
    resource_def: &ast::ResourceDef,
    group: &ast::PathGroup,
) {
    let mut path = Vec::with_capacity(group.segments.len());
    for seg in &group.segments {
        match seg {
            ast::PathSegmentDef::Ident(name) => path.push(PathSegment::Ident(name.clone())),
            ast::PathSegmentDef::Indexer { name, ty } => {
                let Some(resolved) = resolve_type_ref(ctx, ty) else {
                    return;
                };
                path.push(PathSegment::Indexer {
                    name: name.clone(),
                    ty: resolved,
                });
            }
        }
    }
    let path_str = crate::symbols::path_to_string(&path);

    for method in &group.methods {
        register_one_method(ctx, resource_id, resource_def, &path, &path_str, method);
    }
}

fn register_one_method<'ctx>(
    ctx: &CodegenContext<'ctx>,
    resource_id: crate::types::ResourceTypeId,
    resource_def: &ast::ResourceDef,
    path: &[PathSegment],
    path_str: &str,
    method: &ast::MethodDef,
) {
    let return_type = match &method.return_type {
        Some(ty) => {
            let Some(resolved) = resolve_type_ref(ctx, ty) else {
                return;
            };
            resolved
        }
        None => ResoType::Unit,
    };

    let mut params = vec![ResoType::Resource(resource_id)];
    for seg in path {
        if let PathSegment::Indexer { ty, .. } = seg {
            params.push(ty.clone());
        }
    }
    for param in &method.params {
        let Some(ty) = resolve_type_ref(ctx, &param.ty) else {
            return;
        };
        params.push(ty);
    }

    let mangled_name = format!("{}.{}.{}", resource_def.name, path_str, method.name);
    let fn_llvm_ty = match return_type {
        ResoType::Unit => ctx
            .context
            .void_type()
            .fn_type(&llvm_param_types(ctx, &params), false),
        ref other => ctx.llvm_type(other).fn_type(&llvm_param_types(ctx, &params), false),
    };
    let ir_value = ctx.module.add_function(&mangled_name, fn_llvm_ty, None);

    let symbol = MethodSymbol {
        name: method.name.clone(),
        return_type,
        params,
        ir_value: Some(ir_value),
        visibility: visibility_of(method.is_public),
        path: path.to_vec(),
        call_builder: None,
    };
    ctx.registry
        .add_method(resource_id, path_str.to_string(), method.name.clone(), symbol);
}
