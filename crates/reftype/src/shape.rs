//! Built-in shape functions (spec §4.4 "Built-in shape functions", "Index resolution").
//!
//! Each function assumes its arguments have already been simplified (spec:
//! "All arguments evaluated first"). Errors are accumulated into the supplied
//! [`Diagnostics`] sink and the call collapses to [`Expr::Wildcard`] rather
//! than aborting evaluation (spec §7).

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};

use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::eval::fold_add_entries;
use crate::expr::{Expr, ExprRef, TupleEntry};

/// Outcome of resolving an index against a tuple of known or partially-known length.
pub enum ResolvedIndex {
    Known(usize),
    /// The tuple has an unpacked entry that could make the index valid.
    Unknown,
    OutOfRange,
}

/// Resolves `i` (which may be negative) against a tuple of length `len`.
/// `inclusive_upper` widens the valid range to `[0, len]`, used for insertion
/// indices (spec §4.4 "Index resolution").
pub fn resolve_index(i: &BigInt, len: usize, has_unpacked: bool, inclusive_upper: bool) -> ResolvedIndex {
    let len_i = BigInt::from(len);
    if i.sign() == num_bigint::Sign::Minus {
        let resolved = &len_i + i;
        return if resolved.sign() == num_bigint::Sign::Minus {
            if has_unpacked { ResolvedIndex::Unknown } else { ResolvedIndex::OutOfRange }
        } else {
            ResolvedIndex::Known(resolved.to_usize().unwrap_or(0))
        };
    }
    let valid = if inclusive_upper { *i <= len_i } else { *i < len_i };
    if valid {
        ResolvedIndex::Known(i.to_usize().unwrap_or(0))
    } else if has_unpacked {
        ResolvedIndex::Unknown
    } else {
        ResolvedIndex::OutOfRange
    }
}

enum IndexOutcome {
    Known(usize),
    /// Couldn't be resolved to a concrete position but isn't an error either
    /// (symbolic index, or an unpacked entry could make it valid): keep the
    /// call symbolic.
    Passthrough,
    Wildcard,
}

fn resolve_for_shape(i: &ExprRef, len: usize, has_unpacked: bool, inclusive_upper: bool, diags: &mut Diagnostics, context: &'static str) -> IndexOutcome {
    let Some(n) = i.as_number() else {
        return IndexOutcome::Passthrough;
    };
    match resolve_index(n, len, has_unpacked, inclusive_upper) {
        ResolvedIndex::Known(pos) => IndexOutcome::Known(pos),
        ResolvedIndex::Unknown => IndexOutcome::Passthrough,
        ResolvedIndex::OutOfRange => {
            diags.report_error(Diagnostic::error(
                "shape-index-out-of-range",
                format!("{context}: index {n} is out of range for a tuple of length {len}"),
            ));
            IndexOutcome::Wildcard
        }
    }
}

fn passthrough_call(name: &str, args: Vec<ExprRef>) -> ExprRef {
    Rc::new(Expr::Call {
        name: name.to_string(),
        args,
    })
}

/// `len(t)` (spec §4.4).
pub fn len(t: &ExprRef) -> ExprRef {
    if t.is_wildcard() {
        return Expr::wildcard();
    }
    if let Some(entries) = t.as_tuple() {
        if !entries.iter().any(|e| e.is_unpacked) {
            return Expr::number(entries.len());
        }
    }
    passthrough_call("len", vec![t.clone()])
}

/// `index(t, i)` (spec §4.4).
pub fn index(t: &ExprRef, i: &ExprRef, diags: &mut Diagnostics) -> ExprRef {
    if t.is_wildcard() || i.is_wildcard() {
        return Expr::wildcard();
    }
    let Some(entries) = t.as_tuple() else {
        return passthrough_call("index", vec![t.clone(), i.clone()]);
    };
    let has_unpacked = entries.iter().any(|e| e.is_unpacked);
    match resolve_for_shape(i, entries.len(), has_unpacked, false, diags, "index") {
        IndexOutcome::Known(pos) if !entries[pos].is_unpacked => entries[pos].value.clone(),
        IndexOutcome::Known(_) => passthrough_call("index", vec![t.clone(), i.clone()]),
        IndexOutcome::Passthrough => passthrough_call("index", vec![t.clone(), i.clone()]),
        IndexOutcome::Wildcard => Expr::wildcard(),
    }
}

/// `swap(t, i, j)` (spec §4.4).
pub fn swap(t: &ExprRef, i: &ExprRef, j: &ExprRef, diags: &mut Diagnostics) -> ExprRef {
    if t.is_wildcard() || i.is_wildcard() || j.is_wildcard() {
        return Expr::wildcard();
    }
    let Some(entries) = t.as_tuple() else {
        return passthrough_call("swap", vec![t.clone(), i.clone(), j.clone()]);
    };
    let has_unpacked = entries.iter().any(|e| e.is_unpacked);
    let pi = match resolve_for_shape(i, entries.len(), has_unpacked, false, diags, "swap") {
        IndexOutcome::Known(p) => p,
        IndexOutcome::Passthrough => return passthrough_call("swap", vec![t.clone(), i.clone(), j.clone()]),
        IndexOutcome::Wildcard => return Expr::wildcard(),
    };
    let pj = match resolve_for_shape(j, entries.len(), has_unpacked, false, diags, "swap") {
        IndexOutcome::Known(p) => p,
        IndexOutcome::Passthrough => return passthrough_call("swap", vec![t.clone(), i.clone(), j.clone()]),
        IndexOutcome::Wildcard => return Expr::wildcard(),
    };
    let mut new_entries = entries.to_vec();
    new_entries.swap(pi, pj);
    Rc::new(Expr::Tuple(new_entries))
}

/// `permute(t, idx)` (spec §4.4). `idx` must be a literal integer tuple the same length as `t`.
pub fn permute(t: &ExprRef, idx: &ExprRef, diags: &mut Diagnostics) -> ExprRef {
    if t.is_wildcard() || idx.is_wildcard() {
        return Expr::wildcard();
    }
    let (Some(entries), Some(idx_entries)) = (t.as_tuple(), idx.as_tuple()) else {
        return passthrough_call("permute", vec![t.clone(), idx.clone()]);
    };
    if entries.iter().any(|e| e.is_unpacked) || idx_entries.iter().any(|e| e.is_unpacked) {
        return passthrough_call("permute", vec![t.clone(), idx.clone()]);
    }
    if idx_entries.len() != entries.len() {
        diags.report_error(Diagnostic::error(
            "shape-permute-length-mismatch",
            format!("permute: index tuple length {} does not match tuple length {}", idx_entries.len(), entries.len()),
        ));
        return Expr::wildcard();
    }
    let mut seen = std::collections::HashSet::new();
    let mut positions = Vec::with_capacity(idx_entries.len());
    for entry in idx_entries {
        let Some(n) = entry.value.as_number() else {
            return passthrough_call("permute", vec![t.clone(), idx.clone()]);
        };
        match resolve_index(n, entries.len(), false, false) {
            ResolvedIndex::Known(pos) => {
                if !seen.insert(pos) {
                    diags.report_error(Diagnostic::error(
                        "shape-permute-duplicate-index",
                        format!("permute: duplicate index {pos}"),
                    ));
                    return Expr::wildcard();
                }
                positions.push(pos);
            }
            _ => {
                diags.report_error(Diagnostic::error(
                    "shape-permute-out-of-range",
                    format!("permute: index {n} is out of range for a tuple of length {}", entries.len()),
                ));
                return Expr::wildcard();
            }
        }
    }
    Rc::new(Expr::Tuple(positions.into_iter().map(|p| entries[p].clone()).collect()))
}

/// `concat(t1, t2, d)` (spec §4.4).
pub fn concat(t1: &ExprRef, t2: &ExprRef, d: &ExprRef, diags: &mut Diagnostics) -> ExprRef {
    if t1.is_wildcard() || t2.is_wildcard() || d.is_wildcard() {
        return Expr::wildcard();
    }
    let (Some(e1), Some(e2)) = (t1.as_tuple(), t2.as_tuple()) else {
        return passthrough_call("concat", vec![t1.clone(), t2.clone(), d.clone()]);
    };
    if e1.len() != e2.len() {
        diags.report_error(Diagnostic::error(
            "shape-concat-length-mismatch",
            format!("concat: tuples have different lengths ({} vs {})", e1.len(), e2.len()),
        ));
        return Expr::wildcard();
    }
    let has_unpacked = e1.iter().any(|e| e.is_unpacked) || e2.iter().any(|e| e.is_unpacked);
    let dim = match resolve_for_shape(d, e1.len(), has_unpacked, false, diags, "concat") {
        IndexOutcome::Known(p) => p,
        IndexOutcome::Passthrough => return passthrough_call("concat", vec![t1.clone(), t2.clone(), d.clone()]),
        IndexOutcome::Wildcard => return Expr::wildcard(),
    };
    let mut result = Vec::with_capacity(e1.len());
    for idx in 0..e1.len() {
        if idx == dim {
            result.push(TupleEntry::plain(fold_add_entries(&e1[idx].value, &e2[idx].value)));
        } else if e1[idx].value == e2[idx].value {
            result.push(e1[idx].clone());
        } else {
            diags.report_error(Diagnostic::error(
                "shape-concat-entry-mismatch",
                format!("concat: entries differ at position {idx}"),
            ));
            return Expr::wildcard();
        }
    }
    Rc::new(Expr::Tuple(result))
}

/// `splice(t1, i, n, t2)` (spec §4.4).
pub fn splice(t1: &ExprRef, i: &ExprRef, n: &ExprRef, t2: &ExprRef, diags: &mut Diagnostics) -> ExprRef {
    if t1.is_wildcard() || i.is_wildcard() || n.is_wildcard() || t2.is_wildcard() {
        return Expr::wildcard();
    }
    let (Some(e1), Some(e2)) = (t1.as_tuple(), t2.as_tuple()) else {
        return passthrough_call("splice", vec![t1.clone(), i.clone(), n.clone(), t2.clone()]);
    };
    let has_unpacked = e1.iter().any(|e| e.is_unpacked);
    let start = match resolve_for_shape(i, e1.len(), has_unpacked, true, diags, "splice") {
        IndexOutcome::Known(p) => p,
        IndexOutcome::Passthrough => return passthrough_call("splice", vec![t1.clone(), i.clone(), n.clone(), t2.clone()]),
        IndexOutcome::Wildcard => return Expr::wildcard(),
    };
    let Some(count) = n.as_number().and_then(num_traits::ToPrimitive::to_usize) else {
        return passthrough_call("splice", vec![t1.clone(), i.clone(), n.clone(), t2.clone()]);
    };
    if start + count > e1.len() {
        diags.report_error(Diagnostic::error(
            "shape-splice-out-of-range",
            format!("splice: dropping {count} entries starting at {start} exceeds tuple length {}", e1.len()),
        ));
        return Expr::wildcard();
    }
    let mut result = e1[..start].to_vec();
    result.extend_from_slice(e2);
    result.extend_from_slice(&e1[start + count..]);
    Rc::new(Expr::Tuple(result))
}

/// `broadcast(t1, t2)` (spec §4.4), NumPy-style, aligned from the right.
pub fn broadcast(t1: &ExprRef, t2: &ExprRef, diags: &mut Diagnostics) -> ExprRef {
    if t1.is_wildcard() || t2.is_wildcard() {
        return Expr::wildcard();
    }
    let (Some(e1), Some(e2)) = (t1.as_tuple(), t2.as_tuple()) else {
        return passthrough_call("broadcast", vec![t1.clone(), t2.clone()]);
    };
    if e1.iter().any(|e| e.is_unpacked) || e2.iter().any(|e| e.is_unpacked) {
        return passthrough_call("broadcast", vec![t1.clone(), t2.clone()]);
    }
    let rev1: Vec<&TupleEntry> = e1.iter().rev().collect();
    let rev2: Vec<&TupleEntry> = e2.iter().rev().collect();
    let len = rev1.len().max(rev2.len());
    let one = BigInt::one();
    let mut rev_result = Vec::with_capacity(len);
    for k in 0..len {
        let a = rev1.get(k).map(|e| &e.value);
        let b = rev2.get(k).map(|e| &e.value);
        let entry = match (a, b) {
            (Some(av), Some(bv)) => {
                if av.as_number() == Some(&one) {
                    bv.clone()
                } else if bv.as_number() == Some(&one) {
                    av.clone()
                } else if av == bv {
                    av.clone()
                } else if let (Some(na), Some(nb)) = (av.as_number(), bv.as_number()) {
                    diags.report_error(Diagnostic::error(
                        "shape-broadcast-mismatch",
                        format!("broadcast: incompatible dimensions {na} and {nb} at aligned position {k}"),
                    ));
                    return Expr::wildcard();
                } else {
                    av.clone()
                }
            }
            (Some(av), None) => av.clone(),
            (None, Some(bv)) => bv.clone(),
            (None, None) => unreachable!("k < len implies at least one side has an entry"),
        };
        rev_result.push(TupleEntry::plain(entry));
    }
    rev_result.reverse();
    Rc::new(Expr::Tuple(rev_result))
}

/// `reshape(t_src, t_dst)` (spec §4.4).
pub fn reshape(src: &ExprRef, dst: &ExprRef, diags: &mut Diagnostics) -> ExprRef {
    if src.is_wildcard() || dst.is_wildcard() {
        // "W in either side short-circuits to t_dst"
        return dst.clone();
    }
    let (Some(se), Some(de)) = (src.as_tuple(), dst.as_tuple()) else {
        return passthrough_call("reshape", vec![src.clone(), dst.clone()]);
    };
    if se.iter().any(|e| e.is_unpacked) || de.iter().any(|e| e.is_unpacked) {
        return passthrough_call("reshape", vec![src.clone(), dst.clone()]);
    }
    let mut src_product = BigInt::one();
    for entry in se {
        let Some(n) = entry.value.as_number() else {
            return passthrough_call("reshape", vec![src.clone(), dst.clone()]);
        };
        src_product *= n;
    }
    let neg_one = BigInt::from(-1);
    let mut free_slot = None;
    let mut dst_product = BigInt::one();
    for (idx, entry) in de.iter().enumerate() {
        let Some(n) = entry.value.as_number() else {
            return passthrough_call("reshape", vec![src.clone(), dst.clone()]);
        };
        if *n == neg_one {
            if free_slot.is_some() {
                diags.report_error(Diagnostic::error(
                    "shape-reshape-multiple-inferred-slots",
                    "reshape: destination shape has more than one inferred (-1) dimension",
                ));
                return Expr::wildcard();
            }
            free_slot = Some(idx);
        } else {
            dst_product *= n;
        }
    }
    match free_slot {
        None => {
            if src_product != dst_product {
                diags.report_error(Diagnostic::error(
                    "shape-reshape-product-mismatch",
                    format!("reshape: source product {src_product} does not match destination product {dst_product}"),
                ));
                return Expr::wildcard();
            }
            dst.clone()
        }
        Some(idx) => {
            if dst_product.is_zero() || !(&src_product % &dst_product).is_zero() {
                diags.report_error(Diagnostic::error(
                    "shape-reshape-product-mismatch",
                    format!("reshape: cannot infer free dimension from source product {src_product} and destination product {dst_product}"),
                ));
                return Expr::wildcard();
            }
            let inferred = &src_product / &dst_product;
            let mut result = de.to_vec();
            result[idx] = TupleEntry::plain(Expr::number(inferred));
            Rc::new(Expr::Tuple(result))
        }
    }
}
