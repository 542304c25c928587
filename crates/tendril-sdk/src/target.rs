//! Interceptable targets and their metadata
//!
//! A [`Target`] pairs the process-stable native handle of a callable with the
//! declared metadata the installer needs: declaring type, modifiers,
//! parameter kinds and return kind.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

// ============================================================================
// Identity
// ============================================================================

/// Opaque, process-stable handle identifying one callable.
///
/// Equality is by handle value only; two targets with identical metadata but
/// different handles are different targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Create a handle from its raw value
    pub const fn from_raw(raw: u64) -> Self {
        TargetId(raw)
    }

    /// Get the raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ============================================================================
// Type kinds
// ============================================================================

/// Category of a declared parameter or return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// No value (return kind only)
    Void,
    /// boolean
    Boolean,
    /// byte
    Byte,
    /// char
    Char,
    /// short
    Short,
    /// int
    Int,
    /// long
    Long,
    /// float
    Float,
    /// double
    Double,
    /// Any reference type
    Object,
}

impl TypeKind {
    /// Whether this kind is a primitive (void counts as primitive)
    pub fn is_primitive(&self) -> bool {
        !matches!(self, TypeKind::Object)
    }

    /// Source-level name of the kind
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Void => "void",
            TypeKind::Boolean => "boolean",
            TypeKind::Byte => "byte",
            TypeKind::Char => "char",
            TypeKind::Short => "short",
            TypeKind::Int => "int",
            TypeKind::Long => "long",
            TypeKind::Float => "float",
            TypeKind::Double => "double",
            TypeKind::Object => "Object",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Modifiers
// ============================================================================

/// Access and implementation flags of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u32);

impl Modifiers {
    /// No flags
    pub const NONE: Modifiers = Modifiers(0);
    /// public
    pub const PUBLIC: Modifiers = Modifiers(0x0001);
    /// private
    pub const PRIVATE: Modifiers = Modifiers(0x0002);
    /// static
    pub const STATIC: Modifiers = Modifiers(0x0008);
    /// final
    pub const FINAL: Modifiers = Modifiers(0x0010);
    /// Implemented outside the managed runtime
    pub const NATIVE: Modifiers = Modifiers(0x0100);
    /// Declared without a body
    pub const ABSTRACT: Modifiers = Modifiers(0x0400);

    /// Raw flag bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether every flag in `other` is set
    pub fn contains(&self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

// ============================================================================
// Declaring type
// ============================================================================

/// The type that declares a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaringType {
    name: Arc<str>,
    interface: bool,
    proxy: bool,
}

impl DeclaringType {
    /// An ordinary class
    pub fn class(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            interface: false,
            proxy: false,
        }
    }

    /// An interface; its members cannot be intercepted
    pub fn interface(name: impl Into<Arc<str>>) -> Self {
        Self {
            interface: true,
            ..Self::class(name)
        }
    }

    /// A synthetic dynamic-proxy class; its members have no patchable body
    pub fn proxy(name: impl Into<Arc<str>>) -> Self {
        Self {
            proxy: true,
            ..Self::class(name)
        }
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is an interface
    pub fn is_interface(&self) -> bool {
        self.interface
    }

    /// Whether this is a synthetic dynamic-proxy class
    pub fn is_proxy(&self) -> bool {
        self.proxy
    }
}

// ============================================================================
// Member
// ============================================================================

/// Whether a member is a method or a constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Regular method
    Method,
    /// Instance constructor (or, if static, a type initialiser)
    Constructor,
}

/// Declared metadata of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    declaring: DeclaringType,
    name: String,
    kind: MemberKind,
    modifiers: Modifiers,
    params: Vec<TypeKind>,
    return_kind: TypeKind,
}

impl Member {
    /// Describe a method
    pub fn method(
        declaring: DeclaringType,
        name: impl Into<String>,
        params: Vec<TypeKind>,
        return_kind: TypeKind,
    ) -> Self {
        Self {
            declaring,
            name: name.into(),
            kind: MemberKind::Method,
            modifiers: Modifiers::PUBLIC,
            params,
            return_kind,
        }
    }

    /// Describe a constructor. Constructors always return void.
    pub fn constructor(declaring: DeclaringType, params: Vec<TypeKind>) -> Self {
        Self {
            declaring,
            name: "<init>".to_string(),
            kind: MemberKind::Constructor,
            modifiers: Modifiers::PUBLIC,
            params,
            return_kind: TypeKind::Void,
        }
    }

    /// Replace the modifier flags
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Declaring type
    pub fn declaring(&self) -> &DeclaringType {
        &self.declaring
    }

    /// Member name (`<init>` for constructors)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method or constructor
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Modifier flags
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Declared parameter kinds
    pub fn params(&self) -> &[TypeKind] {
        &self.params
    }

    /// Number of declared parameters
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Declared return kind
    pub fn return_kind(&self) -> TypeKind {
        self.return_kind
    }

    /// Whether this is a constructor
    pub fn is_constructor(&self) -> bool {
        self.kind == MemberKind::Constructor
    }

    /// Whether the member is static
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(Modifiers::STATIC)
    }

    /// Whether the member is abstract
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(Modifiers::ABSTRACT)
    }

    /// Whether the member is implemented natively
    pub fn is_native(&self) -> bool {
        self.modifiers.contains(Modifiers::NATIVE)
    }

    /// Native members and proxy members have no managed body to patch
    pub fn is_native_or_proxy(&self) -> bool {
        self.is_native() || self.declaring.is_proxy()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static() {
            f.write_str("static ")?;
        }
        if !self.is_constructor() {
            write!(f, "{} ", self.return_kind)?;
        }
        write!(f, "{}.{}(", self.declaring.name(), self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p)?;
        }
        f.write_str(")")
    }
}

// ============================================================================
// Target
// ============================================================================

/// A callable eligible for interception: native handle plus metadata.
///
/// Cloning is cheap; the metadata is shared.
#[derive(Debug, Clone)]
pub struct Target {
    id: TargetId,
    member: Arc<Member>,
}

impl Target {
    /// Bind a handle to its metadata
    pub fn new(id: TargetId, member: Member) -> Self {
        Self {
            id,
            member: Arc::new(member),
        }
    }

    /// Native identity
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Declared metadata
    pub fn member(&self) -> &Member {
        &self.member
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Target {}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.member)
    }
}
