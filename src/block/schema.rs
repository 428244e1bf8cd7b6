//! Record schemas: the statically declared field list of a block record.

use crate::block::RecordId;
use crate::error::SchemaError;
use crate::float::Float;
use crate::mat::{Mat2, Mat3};
use crate::vec::{Vec2, Vec3};
use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec as AllocVec;
use core::any::TypeId;

/// Per-block fields every schema carries implicitly.
pub const RESERVED_FIELDS: [&str; 2] = ["num_elements", "active"];

const KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn",
    "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe",
    "use", "where", "while", "async", "await", "dyn", "abstract", "become", "box", "do",
    "final", "macro", "override", "priv", "typeof", "unsized", "virtual", "yield", "try",
    "gen",
];

/// Element type of a field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    F32,
    F64,
    I32,
    U32,
    Bool,
    /// Identity column element.
    Id,
}

/// Scalar type plus fixed shape. An empty shape is a plain scalar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldKind {
    pub scalar: ScalarKind,
    pub shape: AllocVec<usize>,
}

impl FieldKind {
    /// A single scalar of `scalar` kind.
    pub fn scalar(scalar: ScalarKind) -> Self {
        FieldKind { scalar, shape: AllocVec::new() }
    }

    /// Prepend an outer dimension.
    pub fn array(inner: FieldKind, len: usize) -> Self {
        let mut shape = vec![len];
        shape.extend(inner.shape);
        FieldKind { scalar: inner.scalar, shape }
    }

    /// Number of scalars per record.
    pub fn scalar_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Types that can be stored as a block column.
pub trait FieldType: Clone + Send + Sync + 'static {
    fn kind() -> FieldKind;
}

macro_rules! scalar_field {
    ($($ty:ty => $kind:ident),+) => {
        $(impl FieldType for $ty {
            fn kind() -> FieldKind { FieldKind::scalar(ScalarKind::$kind) }
        })+
    };
}

scalar_field!(f32 => F32, f64 => F64, i32 => I32, u32 => U32, bool => Bool, RecordId => Id);

impl<F: Float + FieldType> FieldType for Vec2<F> {
    fn kind() -> FieldKind { FieldKind::array(F::kind(), 2) }
}

impl<F: Float + FieldType> FieldType for Vec3<F> {
    fn kind() -> FieldKind { FieldKind::array(F::kind(), 3) }
}

impl<F: Float + FieldType> FieldType for Mat2<F> {
    fn kind() -> FieldKind { FieldKind::array(FieldKind::array(F::kind(), 2), 2) }
}

impl<F: Float + FieldType> FieldType for Mat3<F> {
    fn kind() -> FieldKind { FieldKind::array(FieldKind::array(F::kind(), 3), 3) }
}

impl<T: FieldType, const N: usize> FieldType for [T; N] {
    fn kind() -> FieldKind { FieldKind::array(T::kind(), N) }
}

/// One named column of a schema.
#[derive(Clone, Debug)]
pub struct FieldDesc {
    pub name: &'static str,
    pub kind: FieldKind,
    pub type_name: &'static str,
    type_id: TypeId,
}

impl FieldDesc {
    /// Descriptor of a field `name` holding `T`.
    pub fn of<T: FieldType>(name: &'static str) -> Self {
        FieldDesc {
            name,
            kind: T::kind(),
            type_name: core::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Whether the column stores values of type `T`.
    pub fn holds<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Identity columns are scalar `RecordId`s.
    pub fn is_identity(&self) -> bool {
        self.kind.scalar == ScalarKind::Id && self.kind.shape.is_empty()
    }
}

/// Validated field list of a record type.
#[derive(Clone, Debug)]
pub struct Schema {
    fields: AllocVec<FieldDesc>,
    identity: Option<usize>,
}

impl Schema {
    /// Validate a field list.
    pub fn new(fields: AllocVec<FieldDesc>) -> Result<Self, SchemaError> {
        let mut identity: Option<usize> = None;

        for (index, field) in fields.iter().enumerate() {
            let name = field.name;
            if name.is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if RESERVED_FIELDS.contains(&name) {
                return Err(SchemaError::ReservedName(name.to_string()));
            }
            if KEYWORDS.contains(&name) || name.starts_with("r#") {
                return Err(SchemaError::KeywordName(name.to_string()));
            }
            if fields[..index].iter().any(|f| f.name == name) {
                return Err(SchemaError::DuplicateField(name.to_string()));
            }
            if field.is_identity() {
                if let Some(first) = identity {
                    return Err(SchemaError::MultipleIdentity {
                        first: fields[first].name.to_string(),
                        second: name.to_string(),
                    });
                }
                identity = Some(index);
            }
        }

        Ok(Schema { fields, identity })
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True for a schema without fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the field called `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Descriptor of the field called `name`.
    pub fn field(&self, name: &str) -> Option<&FieldDesc> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Index of the identity column, if any.
    pub fn identity(&self) -> Option<usize> {
        self.identity
    }

    /// Records of identity-bearing schemas are never relocated or deleted.
    pub fn is_identity_bearing(&self) -> bool {
        self.identity.is_some()
    }
}
