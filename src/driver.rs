//! Orchestrates a full compilation run across one or more
//! [`ast::CompilationUnit`]s.
//!
//! Owns the `Context`/`Module`/`Builder` triple and walks every module
//! twice conceptually (once to register, once to check bodies), though this
//! crate folds type checking and IR emission into one pass, so the driver
//! runs three sub-passes instead: function signatures, then resource
//! declarations, then bodies — each sub-pass walking every unit before the
//! next one starts, so forward references across files resolve.

use std::rc::Rc;

use inkwell::context::Context;
use inkwell::module::Module;

use crate::ast::CompilationUnit;
use crate::codegen::{registration, function, CodegenContext, CodegenOptions};
use crate::diagnostics::Diagnostics;
use crate::types::TypeRegistry;

/// Owns the LLVM [`Context`] and drives [`CodegenContext`] across a whole
/// compilation run. One `Driver` corresponds to one emitted module.
pub struct Driver {
    context: Context,
    options: CodegenOptions,
}

impl Driver {
    pub fn new(options: CodegenOptions) -> Self {
        Driver {
            context: Context::create(),
            options,
        }
    }

    /// Install a colored `simple_logger` at the given level. Call sites
    /// (CLI entry points, integration tests) own whether logging runs at
    /// all; the driver itself only logs through the already-installed
    /// facade and never initializes one on its own.
    pub fn init_logging(level: log::LevelFilter) -> anyhow::Result<()> {
        simple_logger::SimpleLogger::new()
            .with_colors(true)
            .with_level(level)
            .init()
            .map_err(anyhow::Error::from)
    }

    /// Run the full pipeline over `units` and return the populated
    /// [`CodegenContext`] plus whether any errors were reported. `units`
    /// should be in a stable order (e.g. the order files were discovered);
    /// visibility is keyed on [`crate::types::FileId`], not on this order.
    pub fn compile<'ctx>(&'ctx self, module_name: &str, units: &[CompilationUnit]) -> (CodegenContext<'ctx>, bool) {
        log::debug!("compiling {} unit(s) into module '{module_name}'", units.len());
        let registry = Rc::new(TypeRegistry::new());
        let ctx = CodegenContext::new(&self.context, module_name, registry, self.options);

        log::trace!("pass 1: registering function signatures");
        for unit in units {
            registration::register_function_signatures(&ctx, unit);
        }
        log::trace!("pass 2a: registering opaque resource structs");
        for unit in units {
            registration::register_opaque_resources(&ctx, unit);
        }
        log::trace!("pass 2b: registering resource fields and methods");
        for unit in units {
            registration::register_resource_bodies(&ctx, unit);
        }
        log::trace!("pass 3: emitting bodies");
        for unit in units {
            function::emit_resource_method_bodies(&ctx, unit);
        }
        for unit in units {
            function::emit_function_bodies(&ctx, unit);
        }

        let had_errors = ctx.diagnostics.borrow().had_errors();
        if had_errors {
            log::error!("compilation of '{module_name}' finished with diagnostics");
        } else {
            log::debug!("compilation of '{module_name}' finished cleanly");
        }
        (ctx, had_errors)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

/// Render the diagnostics collected by a [`Driver::compile`] run, one per
/// line, matching `Diagnostic`'s own `Display` impl.
pub fn render_diagnostics(diagnostics: &Diagnostics) -> String {
    diagnostics
        .entries()
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Emit the finished module's LLVM IR as text, for tests and CLI dumping.
pub fn emit_ir(module: &Module) -> String {
    module.print_to_string().to_string()
}
