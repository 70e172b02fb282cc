//! Resource type registry.
//!
//! Grounded on `typechecker/scope.rs`'s `Scope` (`Rc<RefCell<Frame>>` stack)
//! for the "interior-mutability behind a plain struct" style, generalized so
//! that two resource types with the same name and generic arguments always
//! resolve to the same [`ResourceTypeId`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::symbols::Visibility;
use crate::types::ResoType;

/// Stable handle into a [`TypeRegistry`]. Two handles compare equal iff they
/// were produced for the same (name, generics) key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ResourceTypeId(pub(crate) usize);

impl fmt::Debug for ResourceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceTypeId({})", self.0)
    }
}

impl ResourceTypeId {
    /// The raw registry slot index, for building distinct LLVM struct names
    /// (`codegen::CodegenContext::resource_struct_type`).
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Registered data for one resource type: ordered fields, methods keyed by
/// `(path, method name)`, and the visibility/file-identity pair used by the
/// access check.
///
/// This doubles as the resource's own symbol-table entry — there is no
/// separate symbol-table entity for it, since a resource's identity *is*
/// its registry entry. Carries the `'ctx` lifetime because its method
/// table holds `MethodSymbol<'ctx>` values (IR function handles and call
/// builders tied to the LLVM context).
#[derive(Clone)]
pub struct ResourceTypeData<'ctx> {
    pub name: String,
    pub generics: Vec<ResoType>,
    /// Ordered field list; empty until the resource-registration pass fills
    /// it in (opaque struct types are registered before fields, enabling
    /// recursive/mutually recursive resources).
    pub fields: Vec<(String, ResoType)>,
    pub visibility: Visibility,
    pub file: FileId,
    pub methods: HashMap<(String, String), crate::symbols::MethodSymbol<'ctx>>,
}

impl<'ctx> ResourceTypeData<'ctx> {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    pub fn field_type(&self, name: &str) -> Option<&ResoType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

/// Identifies the compilation unit a symbol was declared in, for the
/// visibility check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FileId(pub usize);

pub struct TypeRegistry<'ctx> {
    resources: RefCell<Vec<ResourceTypeData<'ctx>>>,
    by_key: RefCell<HashMap<(String, Vec<ResoType>), ResourceTypeId>>,
}

impl<'ctx> Default for TypeRegistry<'ctx> {
    fn default() -> Self {
        TypeRegistry {
            resources: RefCell::new(Vec::new()),
            by_key: RefCell::new(HashMap::new()),
        }
    }
}

impl<'ctx> TypeRegistry<'ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, empty (opaque) resource type, or return the existing
    /// handle if one with this name+generics already exists: two resource
    /// types with the same name+generics are always the same instance.
    pub fn get_or_create(
        &self,
        name: &str,
        generics: Vec<ResoType>,
        visibility: Visibility,
        file: FileId,
    ) -> ResourceTypeId {
        let key = (name.to_string(), generics.clone());
        if let Some(id) = self.by_key.borrow().get(&key) {
            return *id;
        }
        let mut resources = self.resources.borrow_mut();
        let id = ResourceTypeId(resources.len());
        resources.push(ResourceTypeData {
            name: name.to_string(),
            generics,
            fields: Vec::new(),
            visibility,
            file,
            methods: HashMap::new(),
        });
        drop(resources);
        self.by_key.borrow_mut().insert(key, id);
        id
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<ResourceTypeId> {
        self.by_key
            .borrow()
            .iter()
            .find(|((n, generics), _)| n == name && generics.is_empty())
            .map(|(_, id)| *id)
    }

    /// Total on registered handles, returns the same instance (same backing
    /// index) every call.
    pub fn get(&self, id: ResourceTypeId) -> std::cell::Ref<'_, ResourceTypeData<'ctx>> {
        std::cell::Ref::map(self.resources.borrow(), |v| &v[id.0])
    }

    pub fn set_fields(&self, id: ResourceTypeId, fields: Vec<(String, ResoType)>) {
        self.resources.borrow_mut()[id.0].fields = fields;
    }

    pub fn add_method(
        &self,
        id: ResourceTypeId,
        path: String,
        name: String,
        method: crate::symbols::MethodSymbol<'ctx>,
    ) {
        self.resources.borrow_mut()[id.0]
            .methods
            .insert((path, name), method);
    }

    pub fn find_method(
        &self,
        id: ResourceTypeId,
        path: &str,
        name: &str,
    ) -> Option<crate::symbols::MethodSymbol<'ctx>> {
        self.resources
            .borrow()
            .get(id.0)
            .and_then(|r| r.methods.get(&(path.to_string(), name.to_string())).cloned())
    }

    /// Get-or-create a `Vector<element>` resource type. Field layout is
    /// `{ T* elements, usize size, usize capacity }`. The element pointer is
    /// modeled with `ResoType::Generic`
    /// style reuse of a resource field rather than inventing a pointer type:
    /// it is never read through the semantic type system, only through
    /// `codegen::vector`'s direct LLVM struct-GEP, so its registered field
    /// type is informational only.
    pub fn get_or_create_vector_type(
        &self,
        element: ResoType,
        usize_ty: ResoType,
        file: FileId,
    ) -> ResourceTypeId {
        let id = self.get_or_create(
            "Vector",
            vec![element.clone()],
            Visibility::Global,
            file,
        );
        if self.get(id).fields.is_empty() {
            self.set_fields(
                id,
                vec![
                    ("elements".to_string(), element),
                    ("size".to_string(), usize_ty.clone()),
                    ("capacity".to_string(), usize_ty),
                ],
            );
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntWidth;

    #[test]
    fn same_name_and_generics_yield_same_handle() {
        let registry = TypeRegistry::new();
        let a = registry.get_or_create(
            "Vector",
            vec![ResoType::Int(IntWidth::U8)],
            Visibility::Global,
            FileId(0),
        );
        let b = registry.get_or_create(
            "Vector",
            vec![ResoType::Int(IntWidth::U8)],
            Visibility::Global,
            FileId(0),
        );
        assert_eq!(a, b);

        let c = registry.get_or_create(
            "Vector",
            vec![ResoType::Int(IntWidth::I32)],
            Visibility::Global,
            FileId(0),
        );
        assert_ne!(a, c);
    }

    #[test]
    fn vector_layout_matches_spec() {
        let registry = TypeRegistry::new();
        let usize_ty = ResoType::Int(IntWidth::USize);
        let id = registry.get_or_create_vector_type(
            ResoType::Int(IntWidth::U8),
            usize_ty.clone(),
            FileId(0),
        );
        let data = registry.get(id);
        assert_eq!(data.fields.len(), 3);
        assert_eq!(data.fields[1], ("size".to_string(), usize_ty.clone()));
        assert_eq!(data.fields[2], ("capacity".to_string(), usize_ty));
    }
}
