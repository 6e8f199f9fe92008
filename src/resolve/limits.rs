//! Binary-format ceilings checked before emission

use crate::codegen::mutf8;
use crate::consts::{MAX_IDENTIFIER_BYTES, MAX_MEMBER_COUNT, MAX_PARAMETER_SLOTS};
use crate::error::LimitError;
use crate::symbol::{ClassId, SymbolTree};

const PREFIX_CHARS: usize = 32;

pub fn check_class(tree: &SymbolTree, class: ClassId) -> Result<(), LimitError> {
    let symbol = tree.class(class);
    if symbol.fields.len() >= MAX_MEMBER_COUNT {
        return Err(LimitError::TooManyFields { count: symbol.fields.len() });
    }
    if symbol.methods.len() >= MAX_MEMBER_COUNT {
        return Err(LimitError::TooManyMethods { count: symbol.methods.len() });
    }
    if symbol.interfaces.len() >= MAX_MEMBER_COUNT {
        return Err(LimitError::TooManyInterfaces { count: symbol.interfaces.len() });
    }

    check_identifier(&symbol.binary_name)?;
    for (_, field) in tree.fields_of(class) {
        check_identifier(&field.name)?;
    }
    for (_, method) in tree.methods_of(class) {
        check_identifier(&method.name)?;
        let slots = method.parameter_slots();
        if slots > MAX_PARAMETER_SLOTS {
            return Err(LimitError::TooManyParameterSlots { method: method.key().to_string(), slots });
        }
    }
    Ok(())
}

fn check_identifier(name: &str) -> Result<(), LimitError> {
    let length = mutf8::encoded_len(name);
    if length >= MAX_IDENTIFIER_BYTES {
        return Err(LimitError::IdentifierTooLong { prefix: name.chars().take(PREFIX_CHARS).collect(), length });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassKind, PrimitiveType, Visibility};
    use crate::symbol::{ClassOwner, FieldSymbol, MethodFlags, MethodSymbol, Synthesized, Type};

    fn class(tree: &mut SymbolTree) -> ClassId {
        let pkg = tree.root_package();
        let symbol = crate::symbol::ClassSymbol::placeholder("L", "L", ClassKind::Class, ClassOwner::Package(pkg));
        let id = tree.alloc_class(symbol);
        tree.add_symbol(pkg.into(), id.into());
        id
    }

    fn method(params: Vec<Type>, is_static: bool, owner: ClassId) -> MethodSymbol {
        MethodSymbol {
            name: "f".into(),
            params,
            return_type: None,
            visibility: Visibility::Public,
            flags: MethodFlags { is_static, ..MethodFlags::default() },
            synthesized: Synthesized::None,
            owner,
            span: Default::default(),
        }
    }

    #[test]
    fn parameter_slots_count_receiver_and_wide_types() {
        let mut tree = SymbolTree::new();
        let id = class(&mut tree);
        // 127 longs plus the receiver is exactly 255
        let longs = vec![Type::Primitive(PrimitiveType::Long); 127];
        let m = tree.alloc_method(method(longs.clone(), false, id));
        tree.add_symbol(id.into(), m.into());
        assert!(check_class(&tree, id).is_ok());

        let mut tree = SymbolTree::new();
        let id = class(&mut tree);
        let mut params = longs;
        params.push(Type::int());
        let m = tree.alloc_method(method(params, false, id));
        tree.add_symbol(id.into(), m.into());
        let result = check_class(&tree, id);
        assert!(matches!(result, Err(LimitError::TooManyParameterSlots { slots: 256, .. })));
    }

    #[test]
    fn receiver_slot_decides_the_limit() {
        let ints = vec![Type::int(); MAX_PARAMETER_SLOTS];

        let mut tree = SymbolTree::new();
        let id = class(&mut tree);
        let m = tree.alloc_method(method(ints.clone(), true, id));
        tree.add_symbol(id.into(), m.into());
        assert!(check_class(&tree, id).is_ok());

        let mut tree = SymbolTree::new();
        let id = class(&mut tree);
        let m = tree.alloc_method(method(ints, false, id));
        tree.add_symbol(id.into(), m.into());
        let err = check_class(&tree, id).unwrap_err();
        assert!(matches!(err, LimitError::TooManyParameterSlots { slots: 256, .. }));
        assert!(err.to_string().contains("256 parameter slots"));
    }

    #[test]
    fn long_identifier_is_rejected() {
        let mut tree = SymbolTree::new();
        let id = class(&mut tree);
        let f = tree.alloc_field(FieldSymbol {
            name: "x".repeat(MAX_IDENTIFIER_BYTES),
            ty: Type::int(),
            visibility: Visibility::Package,
            is_static: false,
            is_immutable: false,
            is_synthetic: false,
            owner: id,
        });
        tree.add_symbol(id.into(), f.into());
        match check_class(&tree, id) {
            Err(LimitError::IdentifierTooLong { prefix, length }) => {
                assert_eq!(length, MAX_IDENTIFIER_BYTES);
                assert_eq!(prefix.len(), PREFIX_CHARS);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
