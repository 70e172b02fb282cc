//! The scope stack.
//!
//! A `Vec<Rc<RefCell<Frame>>>`-style stack that pushes/pops frames and walks
//! them back-to-front on lookup. Functions/resources live in one flat
//! global map (they never nest), while variables get their own stack of
//! frames: resource/function/type symbols live in global scope, variables
//! only in function/inner scopes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::diagnostics::ErrorKind;
use crate::types::FileId;

use super::{FunctionSymbol, VariableSymbol};

enum VarFrame<'ctx> {
    Function {
        vars: HashMap<String, Rc<VariableSymbol<'ctx>>>,
    },
    Block {
        vars: HashMap<String, Rc<VariableSymbol<'ctx>>>,
    },
}

impl<'ctx> VarFrame<'ctx> {
    fn vars(&self) -> &HashMap<String, Rc<VariableSymbol<'ctx>>> {
        match self {
            VarFrame::Function { vars } | VarFrame::Block { vars } => vars,
        }
    }

    fn vars_mut(&mut self) -> &mut HashMap<String, Rc<VariableSymbol<'ctx>>> {
        match self {
            VarFrame::Function { vars } | VarFrame::Block { vars } => vars,
        }
    }
}

/// Owns the variable-scope stack, the global function table, the
/// function-return-type stack and the "what file am I lowering right now"
/// access context, all scoped to one compilation run.
pub struct SymbolTable<'ctx> {
    functions: RefCell<HashMap<String, FunctionSymbol<'ctx>>>,
    var_scopes: RefCell<Vec<VarFrame<'ctx>>>,
    return_type_stack: RefCell<Vec<crate::types::ResoType>>,
    /// Stack of "current file" identifiers, a pushable/poppable access
    /// context rather than a single field, so nested compilation units
    /// restore their caller's file on return.
    access_stack: RefCell<Vec<FileId>>,
}

impl<'ctx> Default for SymbolTable<'ctx> {
    fn default() -> Self {
        SymbolTable {
            functions: RefCell::new(HashMap::new()),
            var_scopes: RefCell::new(Vec::new()),
            return_type_stack: RefCell::new(Vec::new()),
            access_stack: RefCell::new(vec![FileId(0)]),
        }
    }
}

impl<'ctx> SymbolTable<'ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    // -- access context ----------------------------------------------------

    pub fn current_file(&self) -> FileId {
        *self
            .access_stack
            .borrow()
            .last()
            .expect("access context stack is never empty")
    }

    pub fn push_file(&self, file: FileId) {
        self.access_stack.borrow_mut().push(file);
    }

    pub fn pop_file(&self) {
        let mut stack = self.access_stack.borrow_mut();
        if stack.len() > 1 {
            stack.pop();
        }
    }

    // -- global: functions --------------------------------------------------

    pub fn define_function(&self, symbol: FunctionSymbol<'ctx>) -> Result<(), ErrorKind> {
        let mut functions = self.functions.borrow_mut();
        if functions.contains_key(&symbol.name) {
            return Err(ErrorKind::DuplicateDefinition {
                name: symbol.name.clone(),
            });
        }
        functions.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    pub fn lookup_function(&self, name: &str) -> Option<FunctionSymbol<'ctx>> {
        self.functions.borrow().get(name).cloned()
    }

    // -- scope stack ---------------------------------------------------------

    /// Enter a function body scope, pushing `return_type` onto the
    /// function-return-type stack.
    pub fn enter_function_scope(&self, return_type: crate::types::ResoType) {
        self.var_scopes
            .borrow_mut()
            .push(VarFrame::Function {
                vars: HashMap::new(),
            });
        self.return_type_stack.borrow_mut().push(return_type);
    }

    /// Enter a nested block scope (`if`/`while`/plain block bodies).
    pub fn enter_block_scope(&self) {
        self.var_scopes.borrow_mut().push(VarFrame::Block {
            vars: HashMap::new(),
        });
    }

    /// Exit the innermost scope. "Exiting global scope is an error" and
    /// "exiting a function scope requires the function-return-type stack to
    /// be non-empty" are both enforced here.
    pub fn exit_scope(&self) -> Result<(), ErrorKind> {
        let mut scopes = self.var_scopes.borrow_mut();
        let top = scopes.pop().ok_or(ErrorKind::OutOfContext {
            description: "cannot exit global scope".to_string(),
        })?;
        if matches!(top, VarFrame::Function { .. })
            && self.return_type_stack.borrow_mut().pop().is_none()
        {
            return Err(ErrorKind::OutOfContext {
                description: "function scope exited with an empty return-type stack".to_string(),
            });
        }
        Ok(())
    }

    pub fn current_return_type(&self) -> Option<crate::types::ResoType> {
        self.return_type_stack.borrow().last().cloned()
    }

    pub fn in_function(&self) -> bool {
        !self.return_type_stack.borrow().is_empty()
    }

    /// Define a variable in the innermost scope. Defining at global scope
    /// (no open var scope) is a `GlobalVariableDefinition` error; redefining
    /// an already-bound name in the *same* scope is a `DuplicateDefinition`
    /// error (shadowing an outer scope is fine).
    pub fn define_variable(&self, symbol: VariableSymbol<'ctx>) -> Result<(), ErrorKind> {
        let mut scopes = self.var_scopes.borrow_mut();
        let Some(top) = scopes.last_mut() else {
            return Err(ErrorKind::GlobalVariableDefinition);
        };
        if top.vars().contains_key(&symbol.name) {
            return Err(ErrorKind::DuplicateDefinition {
                name: symbol.name.clone(),
            });
        }
        top.vars_mut().insert(symbol.name.clone(), Rc::new(symbol));
        Ok(())
    }

    /// `findReadableVariable`: distinguishes "not defined"
    /// from "defined but not yet initialized" as separate error kinds.
    pub fn find_readable_variable(&self, name: &str) -> Result<Rc<VariableSymbol<'ctx>>, ErrorKind> {
        let scopes = self.var_scopes.borrow();
        for frame in scopes.iter().rev() {
            if let Some(sym) = frame.vars().get(name) {
                return if sym.is_initialized() {
                    Ok(Rc::clone(sym))
                } else {
                    Err(ErrorKind::UninitializedRead {
                        name: name.to_string(),
                    })
                };
            }
        }
        Err(ErrorKind::UndefinedVariable {
            name: name.to_string(),
        })
    }

    /// Look a variable up regardless of initialization state, e.g. for
    /// assignment targets.
    pub fn find_variable(&self, name: &str) -> Option<Rc<VariableSymbol<'ctx>>> {
        let scopes = self.var_scopes.borrow();
        scopes
            .iter()
            .rev()
            .find_map(|frame| frame.vars().get(name).cloned())
    }

    /// `initializeVariable`: walk from the current scope
    /// upward and mark the first match as initialized. Reassigning a
    /// constant that is already initialized is a `ConstReassignment` error.
    pub fn initialize_variable(&self, name: &str) -> Result<(), ErrorKind> {
        let scopes = self.var_scopes.borrow();
        for frame in scopes.iter().rev() {
            if let Some(sym) = frame.vars().get(name) {
                if sym.is_constant && sym.is_initialized() {
                    return Err(ErrorKind::ConstReassignment {
                        name: name.to_string(),
                    });
                }
                sym.mark_initialized();
                return Ok(());
            }
        }
        Err(ErrorKind::UndefinedVariable {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntWidth, ResoType};
    use inkwell::context::Context;

    fn dummy_pointer<'ctx>(ctx: &'ctx Context) -> inkwell::values::PointerValue<'ctx> {
        let module = ctx.create_module("t");
        let builder = ctx.create_builder();
        let fn_type = ctx.void_type().fn_type(&[], false);
        let function = module.add_function("f", fn_type, None);
        let block = ctx.append_basic_block(function, "entry");
        builder.position_at_end(block);
        builder
            .build_alloca(ctx.i32_type(), "v")
            .expect("alloca")
    }

    #[test]
    fn defining_a_variable_outside_any_scope_is_an_error() {
        let table: SymbolTable = SymbolTable::new();
        let ctx = Context::create();
        let ptr = dummy_pointer(&ctx);
        let sym = VariableSymbol::new("x", ResoType::Int(IntWidth::I32), ptr, false, false);
        assert_eq!(
            table.define_variable(sym),
            Err(ErrorKind::GlobalVariableDefinition)
        );
    }

    #[test]
    fn uninitialized_read_is_distinct_from_undefined() {
        let table: SymbolTable = SymbolTable::new();
        let ctx = Context::create();
        let ptr = dummy_pointer(&ctx);
        table.enter_function_scope(ResoType::Unit);
        let sym = VariableSymbol::new("x", ResoType::Int(IntWidth::I32), ptr, false, false);
        table.define_variable(sym).unwrap();

        assert_eq!(
            table.find_readable_variable("x"),
            Err(ErrorKind::UninitializedRead {
                name: "x".to_string()
            })
        );
        assert_eq!(
            table.find_readable_variable("y"),
            Err(ErrorKind::UndefinedVariable {
                name: "y".to_string()
            })
        );

        table.initialize_variable("x").unwrap();
        assert!(table.find_readable_variable("x").is_ok());
    }

    #[test]
    fn reassigning_an_initialized_constant_fails() {
        let table: SymbolTable = SymbolTable::new();
        let ctx = Context::create();
        let ptr = dummy_pointer(&ctx);
        table.enter_function_scope(ResoType::Unit);
        let sym = VariableSymbol::new("x", ResoType::Int(IntWidth::I32), ptr, true, true);
        table.define_variable(sym).unwrap();
        assert_eq!(
            table.initialize_variable("x"),
            Err(ErrorKind::ConstReassignment {
                name: "x".to_string()
            })
        );
    }

    #[test]
    fn exiting_global_scope_is_an_error() {
        let table: SymbolTable = SymbolTable::new();
        assert!(table.exit_scope().is_err());
    }

    #[test]
    fn exiting_function_scope_pops_the_return_type_stack() {
        let table: SymbolTable = SymbolTable::new();
        table.enter_function_scope(ResoType::Bool);
        assert_eq!(table.current_return_type(), Some(ResoType::Bool));
        table.exit_scope().unwrap();
        assert_eq!(table.current_return_type(), None);
    }

    #[test]
    fn shadowing_in_a_nested_block_does_not_error() {
        let table: SymbolTable = SymbolTable::new();
        let ctx = Context::create();
        table.enter_function_scope(ResoType::Unit);
        let sym = VariableSymbol::new(
            "x",
            ResoType::Int(IntWidth::I32),
            dummy_pointer(&ctx),
            false,
            true,
        );
        table.define_variable(sym).unwrap();
        table.enter_block_scope();
        let shadow = VariableSymbol::new(
            "x",
            ResoType::Int(IntWidth::I32),
            dummy_pointer(&ctx),
            false,
            true,
        );
        assert!(table.define_variable(shadow).is_ok());
    }
}
