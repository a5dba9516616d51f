//! The built-in shape-function table (spec §4.4), shared between the parser
//! adapter (arity/type validation, spec §4.2) and the evaluator (semantics).
//! Names, arity, argument order and element types are a compatibility surface
//! (spec §6 "Stable built-in function signatures").

use crate::expr::RefinementType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinSignature {
    pub name: &'static str,
    pub params: &'static [RefinementType],
    pub return_type: RefinementType,
}

pub const LEN: BuiltinSignature = BuiltinSignature {
    name: "len",
    params: &[RefinementType::IntTuple],
    return_type: RefinementType::Int,
};
pub const INDEX: BuiltinSignature = BuiltinSignature {
    name: "index",
    params: &[RefinementType::IntTuple, RefinementType::Int],
    return_type: RefinementType::Int,
};
pub const SWAP: BuiltinSignature = BuiltinSignature {
    name: "swap",
    params: &[RefinementType::IntTuple, RefinementType::Int, RefinementType::Int],
    return_type: RefinementType::IntTuple,
};
pub const PERMUTE: BuiltinSignature = BuiltinSignature {
    name: "permute",
    params: &[RefinementType::IntTuple, RefinementType::IntTuple],
    return_type: RefinementType::IntTuple,
};
pub const CONCAT: BuiltinSignature = BuiltinSignature {
    name: "concat",
    params: &[RefinementType::IntTuple, RefinementType::IntTuple, RefinementType::Int],
    return_type: RefinementType::IntTuple,
};
pub const SPLICE: BuiltinSignature = BuiltinSignature {
    name: "splice",
    params: &[
        RefinementType::IntTuple,
        RefinementType::Int,
        RefinementType::Int,
        RefinementType::IntTuple,
    ],
    return_type: RefinementType::IntTuple,
};
pub const BROADCAST: BuiltinSignature = BuiltinSignature {
    name: "broadcast",
    params: &[RefinementType::IntTuple, RefinementType::IntTuple],
    return_type: RefinementType::IntTuple,
};
pub const RESHAPE: BuiltinSignature = BuiltinSignature {
    name: "reshape",
    params: &[RefinementType::IntTuple, RefinementType::IntTuple],
    return_type: RefinementType::IntTuple,
};

pub const ALL: &[BuiltinSignature] = &[LEN, INDEX, SWAP, PERMUTE, CONCAT, SPLICE, BROADCAST, RESHAPE];

pub fn lookup(name: &str) -> Option<BuiltinSignature> {
    ALL.iter().copied().find(|sig| sig.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("len", 1; "len takes one tuple")]
    #[test_case("index", 2; "index takes tuple and position")]
    #[test_case("swap", 3; "swap takes tuple and two positions")]
    #[test_case("permute", 2; "permute takes tuple and index tuple")]
    #[test_case("concat", 3; "concat takes two tuples and a dim")]
    #[test_case("splice", 4; "splice takes tuple, start, count, replacement")]
    #[test_case("broadcast", 2; "broadcast takes two tuples")]
    #[test_case("reshape", 2; "reshape takes source and destination shape")]
    fn arity_matches_table(name: &str, arity: usize) {
        let sig = lookup(name).expect("builtin should be registered");
        assert_eq!(sig.params.len(), arity);
    }

    #[test]
    fn unknown_name_is_absent() {
        assert!(lookup("not_a_builtin").is_none());
    }
}
