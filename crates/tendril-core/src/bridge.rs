//! Typed bridge catalog
//!
//! One bridge per return category: void, the eight primitives, and object.
//! A bridge only adapts the dispatcher's result to what a caller of that
//! return kind can receive; selection is a fixed table lookup.

use tendril_sdk::{Member, Throwable, TypeKind, Value};

/// Adapts a dispatch result to the target's declared return kind
pub type AdaptFn = fn(Value) -> Result<Value, Throwable>;

/// One entry of the catalog
#[derive(Debug)]
pub struct Bridge {
    /// Bridge name, e.g. `intBridge`
    pub name: &'static str,
    /// Return kind it serves
    pub kind: TypeKind,
    adapt: AdaptFn,
}

impl Bridge {
    /// Adapt a dispatch result
    pub fn adapt(&self, value: Value) -> Result<Value, Throwable> {
        (self.adapt)(value)
    }
}

fn adapt_void(_value: Value) -> Result<Value, Throwable> {
    Ok(Value::Null)
}

fn adapt_object(value: Value) -> Result<Value, Throwable> {
    if value.kind().is_primitive() {
        return Err(Throwable::class_cast(format!(
            "{} cannot be returned as an object",
            value.type_name()
        )));
    }
    Ok(value)
}

fn adapt_primitive(kind: TypeKind, value: Value) -> Result<Value, Throwable> {
    if value.is_null() {
        return Err(Throwable::null_pointer(format!(
            "null returned where {} was expected",
            kind
        )));
    }
    if value.kind() != kind {
        return Err(Throwable::class_cast(format!(
            "{} cannot be returned as {}",
            value.type_name(),
            kind
        )));
    }
    Ok(value)
}

macro_rules! primitive_adapter {
    ($name:ident, $kind:ident) => {
        fn $name(value: Value) -> Result<Value, Throwable> {
            adapt_primitive(TypeKind::$kind, value)
        }
    };
}

primitive_adapter!(adapt_boolean, Boolean);
primitive_adapter!(adapt_byte, Byte);
primitive_adapter!(adapt_char, Char);
primitive_adapter!(adapt_short, Short);
primitive_adapter!(adapt_int, Int);
primitive_adapter!(adapt_long, Long);
primitive_adapter!(adapt_float, Float);
primitive_adapter!(adapt_double, Double);

/// The closed catalog, indexed by [`slot`]
static BRIDGES: [Bridge; 10] = [
    Bridge { name: "voidBridge", kind: TypeKind::Void, adapt: adapt_void },
    Bridge { name: "booleanBridge", kind: TypeKind::Boolean, adapt: adapt_boolean },
    Bridge { name: "byteBridge", kind: TypeKind::Byte, adapt: adapt_byte },
    Bridge { name: "charBridge", kind: TypeKind::Char, adapt: adapt_char },
    Bridge { name: "shortBridge", kind: TypeKind::Short, adapt: adapt_short },
    Bridge { name: "intBridge", kind: TypeKind::Int, adapt: adapt_int },
    Bridge { name: "longBridge", kind: TypeKind::Long, adapt: adapt_long },
    Bridge { name: "floatBridge", kind: TypeKind::Float, adapt: adapt_float },
    Bridge { name: "doubleBridge", kind: TypeKind::Double, adapt: adapt_double },
    Bridge { name: "objectBridge", kind: TypeKind::Object, adapt: adapt_object },
];

fn slot(kind: TypeKind) -> usize {
    match kind {
        TypeKind::Void => 0,
        TypeKind::Boolean => 1,
        TypeKind::Byte => 2,
        TypeKind::Char => 3,
        TypeKind::Short => 4,
        TypeKind::Int => 5,
        TypeKind::Long => 6,
        TypeKind::Float => 7,
        TypeKind::Double => 8,
        TypeKind::Object => 9,
    }
}

/// Bridge for a return kind
pub fn bridge_for_kind(kind: TypeKind) -> &'static Bridge {
    &BRIDGES[slot(kind)]
}

/// Bridge for a member. Constructors always use the void bridge.
pub fn bridge_for(member: &Member) -> &'static Bridge {
    if member.is_constructor() {
        return bridge_for_kind(TypeKind::Void);
    }
    bridge_for_kind(member.return_kind())
}

/// All bridges in catalog order
pub fn catalog() -> &'static [Bridge] {
    &BRIDGES
}

#[cfg(test)]
mod tests {
    use super::*;
    use tendril_sdk::DeclaringType;

    #[test]
    fn test_catalog_is_keyed_by_kind() {
        for bridge in catalog() {
            assert_eq!(bridge_for_kind(bridge.kind).name, bridge.name);
        }
        assert_eq!(catalog().len(), 10);
    }

    #[test]
    fn test_constructor_uses_void() {
        let ctor = Member::constructor(DeclaringType::class("P"), vec![TypeKind::Int]);
        assert_eq!(bridge_for(&ctor).name, "voidBridge");

        let m = Member::method(DeclaringType::class("P"), "x", vec![], TypeKind::Long);
        assert_eq!(bridge_for(&m).name, "longBridge");
    }

    #[test]
    fn test_void_discards_result() {
        assert_eq!(bridge_for_kind(TypeKind::Void).adapt(Value::Int(3)), Ok(Value::Null));
    }

    #[test]
    fn test_primitive_rejects_null_and_wrong_kind() {
        let int = bridge_for_kind(TypeKind::Int);
        assert_eq!(int.adapt(Value::Int(3)), Ok(Value::Int(3)));
        assert_eq!(int.adapt(Value::Null).unwrap_err().class(), "NullPointerException");
        assert_eq!(int.adapt(Value::Long(3)).unwrap_err().class(), "ClassCastException");
    }

    #[test]
    fn test_object_accepts_null_and_references() {
        let obj = bridge_for_kind(TypeKind::Object);
        assert_eq!(obj.adapt(Value::Null), Ok(Value::Null));
        assert_eq!(obj.adapt(Value::str("s")), Ok(Value::str("s")));
        assert!(obj.adapt(Value::Int(1)).is_err());
    }
}
