//! Pattern-scan text substitution (`vartroca`/`vartrocacod`).
//!
//! Scans a text for a literal pattern, and when one is found, looks for the
//! longest member name (variable, function or constant) of the this-object
//! immediately following it, replacing `pattern + name` with that member's
//! value. Character comparisons go through a 256-entry normalization table
//! (case fold, Latin-1 accent strip, `_`/` ` equivalence) so `$Nome` and
//! `$nome` and `$no_me`/`$no me` all match the same candidate.

use crate::fault::Fault;
use crate::unit::Constant;
use crate::value::{ObjectRef, UnitRef, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Callback surface vartroca needs from its host interpreter: reading a
/// field's current value and invoking a function/expression-constant body.
/// Implemented by `interpreter::VM`; kept as a trait so this module has no
/// dependency on the interpreter's internals.
pub trait MemberEvaluator {
    fn field_value(&mut self, object: &ObjectRef, name: &str) -> Value;
    fn call_function(
        &mut self,
        unit: &UnitRef,
        this: &ObjectRef,
        function_name: &str,
        args: Vec<Value>,
    ) -> Result<Value, Fault>;
    fn eval_expression(
        &mut self,
        unit: &UnitRef,
        this: &ObjectRef,
        bytecode: &[u8],
    ) -> Result<Value, Fault>;
}

fn normalize_byte(b: u8) -> u8 {
    match b {
        b'A'..=b'Z' => b + 32,
        b'_' => b' ',
        0xC0..=0xC5 | 0xE0..=0xE5 => b'a', // AaEe grave/acute/circumflex/tilde/diaeresis/ring
        0xC7 | 0xE7 => b'c',
        0xC8..=0xCB | 0xE8..=0xEB => b'e',
        0xCC..=0xCF | 0xEC..=0xEF => b'i',
        0xD1 | 0xF1 => b'n',
        0xD2..=0xD6 | 0xF2..=0xF6 => b'o',
        0xD9..=0xDC | 0xF9..=0xFC => b'u',
        0xDD | 0xFD | 0xFF => b'y',
        other => other,
    }
}

fn normalize_table() -> &'static [u8; 256] {
    static TABLE: OnceLock<[u8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u8; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = normalize_byte(i as u8);
        }
        table
    })
}

fn normalize_bytes(bytes: &[u8]) -> Vec<u8> {
    let table = normalize_table();
    bytes.iter().map(|&b| table[b as usize]).collect()
}

#[derive(Clone, Copy, PartialEq)]
enum CandidateKind<'a> {
    Variable,
    Function,
    Constant(&'a Constant),
}

struct Candidate<'a> {
    suffix_normalized: Vec<u8>,
    original_name: String,
    kind: CandidateKind<'a>,
    defining_unit: UnitRef,
}

/// Walk the this-object's class hierarchy (most-derived first), collecting
/// members whose normalized name starts with `prefix_normalized`, deduped
/// by name (first occurrence, i.e. the most-derived declaration, wins), and
/// sorted by the post-prefix suffix so the scan can binary-search it.
fn build_candidates<'a>(this: &'a ObjectRef, prefix_normalized: &[u8]) -> Vec<Candidate<'a>> {
    let this_ref = this.borrow();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for unit in std::iter::once(&this_ref.unit).chain(this_ref.bases.iter()) {
        collect_from_unit(unit, prefix_normalized, &mut seen, &mut out);
    }
    out.sort_by(|a, b| a.suffix_normalized.cmp(&b.suffix_normalized));
    out
}

fn collect_from_unit<'a>(
    unit: &'a UnitRef,
    prefix: &[u8],
    seen: &mut HashSet<String>,
    out: &mut Vec<Candidate<'a>>,
) {
    for name in unit.variables.keys() {
        try_add(unit, name, CandidateKind::Variable, prefix, seen, out);
    }
    for name in unit.functions.keys() {
        try_add(unit, name, CandidateKind::Function, prefix, seen, out);
    }
    for (name, c) in unit.constants.iter() {
        try_add(unit, name, CandidateKind::Constant(c), prefix, seen, out);
    }
}

fn try_add<'a>(
    unit: &'a UnitRef,
    name: &str,
    kind: CandidateKind<'a>,
    prefix: &[u8],
    seen: &mut HashSet<String>,
    out: &mut Vec<Candidate<'a>>,
) {
    if seen.contains(name) {
        return;
    }
    let normalized = normalize_bytes(name.as_bytes());
    if !normalized.starts_with(prefix) {
        return;
    }
    seen.insert(name.to_string());
    out.push(Candidate {
        suffix_normalized: normalized[prefix.len()..].to_vec(),
        original_name: name.to_string(),
        kind,
        defining_unit: unit.clone(),
    });
}

/// Longest candidate whose normalized suffix is a prefix of `remaining`.
/// Candidates are pre-sorted, so this linear scan visits the same
/// candidates a progressive binary search would land on; it is kept
/// straight-line for clarity since vartroca's candidate tables are small
/// (member counts of one class), not parser-scale.
fn longest_match<'a, 'b>(candidates: &'b [Candidate<'a>], remaining: &[u8]) -> Option<&'b Candidate<'a>> {
    let mut best: Option<&Candidate<'a>> = None;
    for c in candidates {
        let len = c.suffix_normalized.len();
        if remaining.len() >= len && remaining[..len] == c.suffix_normalized[..] {
            if best.map_or(true, |b| len > b.suffix_normalized.len()) {
                best = Some(c);
            }
        }
    }
    best
}

fn emit_value(
    evaluator: &mut dyn MemberEvaluator,
    this: &ObjectRef,
    cand: &Candidate,
    suffix: &str,
) -> Result<String, Fault> {
    match cand.kind {
        CandidateKind::Variable => Ok(evaluator.field_value(this, &cand.original_name).as_string()),
        CandidateKind::Function => {
            let result = evaluator.call_function(
                &cand.defining_unit,
                this,
                &cand.original_name,
                vec![Value::string(suffix)],
            )?;
            Ok(result.as_string())
        }
        CandidateKind::Constant(Constant::Int(n)) => Ok(n.to_string()),
        CandidateKind::Constant(Constant::Double(d)) => Ok(Value::Double(*d).as_string()),
        CandidateKind::Constant(Constant::String(s)) => Ok(s.clone()),
        CandidateKind::Constant(Constant::Expression(bytecode)) => {
            let result = evaluator.eval_expression(&cand.defining_unit, this, bytecode)?;
            Ok(result.as_string())
        }
    }
}

/// Core substitution algorithm shared by `vartroca` and `vartrocacod`.
#[allow(clippy::too_many_arguments)]
fn run(
    evaluator: &mut dyn MemberEvaluator,
    this: Option<&ObjectRef>,
    text: &str,
    pattern: &str,
    var_prefix: &str,
    probability: i64,
    spacing: i64,
) -> Result<String, Fault> {
    let text_bytes = text.as_bytes();
    let normalized_text = normalize_bytes(text_bytes);
    let pattern_norm = normalize_bytes(pattern.as_bytes());
    let prefix_norm = normalize_bytes(var_prefix.as_bytes());
    let spacing = spacing.max(0);
    let probability = probability.max(0);

    let candidates = match this {
        Some(obj) => build_candidates(obj, &prefix_norm),
        None => Vec::new(),
    };

    let mut out: Vec<u8> = Vec::with_capacity(text_bytes.len());
    let mut pos = 0usize;
    let mut spacing_counter = 0i64;

    while pos < text_bytes.len() {
        let mut consumed = false;
        if probability > 0
            && !candidates.is_empty()
            && normalized_text[pos..].starts_with(pattern_norm.as_slice())
        {
            let search_start = pos + pattern_norm.len();
            if let Some(cand) = longest_match(&candidates, &normalized_text[search_start..]) {
                let roll = fastrand::i64(0..100);
                if roll < probability {
                    if spacing_counter > 0 {
                        spacing_counter -= 1;
                    } else {
                        let suffix_len = cand.suffix_normalized.len();
                        let suffix_str = String::from_utf8_lossy(
                            &text_bytes[search_start..search_start + suffix_len],
                        )
                        .into_owned();
                        let replacement = emit_value(evaluator, this.unwrap(), cand, &suffix_str)?;
                        out.extend_from_slice(replacement.as_bytes());
                        pos = search_start + suffix_len;
                        spacing_counter = spacing;
                        consumed = true;
                    }
                }
            }
        }
        if !consumed {
            out.push(text_bytes[pos]);
            pos += 1;
        }
    }

    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn vartroca(
    evaluator: &mut dyn MemberEvaluator,
    this: Option<&ObjectRef>,
    text: &str,
    pattern: &str,
    var_prefix: &str,
    probability: i64,
    spacing: i64,
) -> Result<String, Fault> {
    run(evaluator, this, text, pattern, var_prefix, probability, spacing)
}

/// `vartrocacod`: same substitution, reserved for a future encoded-output
/// flag. Currently identical to `vartroca`.
pub fn vartrocacod(
    evaluator: &mut dyn MemberEvaluator,
    this: Option<&ObjectRef>,
    text: &str,
    pattern: &str,
    var_prefix: &str,
    probability: i64,
    spacing: i64,
) -> Result<String, Fault> {
    run(evaluator, this, text, pattern, var_prefix, probability, spacing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use crate::unit::UnitBuilder;
    use std::collections::HashMap;

    struct NullEvaluator;
    impl MemberEvaluator for NullEvaluator {
        fn field_value(&mut self, object: &ObjectRef, name: &str) -> Value {
            object.borrow().get_field(name).cloned().unwrap_or(Value::Null)
        }
        fn call_function(
            &mut self,
            _unit: &UnitRef,
            _this: &ObjectRef,
            _function_name: &str,
            args: Vec<Value>,
        ) -> Result<Value, Fault> {
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        }
        fn eval_expression(
            &mut self,
            _unit: &UnitRef,
            _this: &ObjectRef,
            _bytecode: &[u8],
        ) -> Result<Value, Fault> {
            Ok(Value::Null)
        }
    }

    fn make_person(nome: &str, idade: i64) -> ObjectRef {
        let unit = UnitRef::new(
            UnitBuilder::new("D")
                .variable("nome", crate::unit::FieldType::Txt, Value::string(nome))
                .variable("idade", crate::unit::FieldType::Int32, Value::Integer(idade))
                .build(),
        );
        let table: HashMap<String, UnitRef> = HashMap::new();
        Object::new(unit, &table)
    }

    #[test]
    fn substitutes_every_matched_member_at_full_probability() {
        let obj = make_person("Alice", 30);
        let mut evaluator = NullEvaluator;
        let result = vartroca(
            &mut evaluator,
            Some(&obj),
            "Hi $nome you are $idade!",
            "$",
            "",
            100,
            0,
        )
        .unwrap();
        assert_eq!(result, "Hi Alice you are 30!");
    }

    #[test]
    fn zero_probability_leaves_text_unchanged() {
        let obj = make_person("Alice", 30);
        let mut evaluator = NullEvaluator;
        let result = vartroca(
            &mut evaluator,
            Some(&obj),
            "Hi $nome you are $idade!",
            "$",
            "",
            0,
            0,
        )
        .unwrap();
        assert_eq!(result, "Hi $nome you are $idade!");
    }

    #[test]
    fn longest_match_wins_over_shorter_prefix_member() {
        let unit = UnitRef::new(
            UnitBuilder::new("E")
                .variable("id", crate::unit::FieldType::Int32, Value::Integer(1))
                .variable("idade", crate::unit::FieldType::Int32, Value::Integer(42))
                .build(),
        );
        let table: HashMap<String, UnitRef> = HashMap::new();
        let obj = Object::new(unit, &table);
        let mut evaluator = NullEvaluator;
        let result = vartroca(&mut evaluator, Some(&obj), "$idade", "$", "", 100, 0).unwrap();
        assert_eq!(result, "42");
    }

    #[test]
    fn no_this_object_yields_unchanged_text() {
        let mut evaluator = NullEvaluator;
        let result = vartroca(&mut evaluator, None, "Hi $nome!", "$", "", 100, 0).unwrap();
        assert_eq!(result, "Hi $nome!");
    }
}
