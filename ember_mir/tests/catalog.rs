//! Instruction catalog behavior seen through the public graph API.

use ember_mir::ir::{
    AliasFlags, AliasSet, BlockKind, ConstValue, MirGraph, MirType, Opcode, ResumeMode,
    StartType,
};

// =============================================================================
// Control flow
// =============================================================================

#[test]
fn test_table_switch_successors_follow_case_order() {
    let mut g = MirGraph::default();
    let entry = g.new_block(BlockKind::Normal, 0, 0);
    let targets: Vec<_> = (1..=4)
        .map(|pc| g.new_block(BlockKind::Normal, pc, 0))
        .collect();

    let input = g.new_parameter(0, None);
    g.append(entry, input);
    let ts = g.new_table_switch(input, -1, 1).unwrap();
    g.add_default(ts, targets[0]).unwrap();
    for &case in &targets[1..] {
        g.add_case(ts, case).unwrap();
    }
    g.end(entry, ts);

    assert_eq!(g.successors(entry), targets.as_slice());
    let info = g.table_switch(ts).unwrap();
    assert_eq!(info.target_for(-1), Some(targets[1]));
    assert_eq!(info.target_for(1), Some(targets[3]));
    assert_eq!(info.target_for(2), Some(targets[0]));
    for &target in &targets {
        assert_eq!(g.block(target).predecessors(), &[entry]);
    }
}

// =============================================================================
// Alias sets
// =============================================================================

#[test]
fn test_slot_store_does_not_interfere_with_element_load() {
    let mut g = MirGraph::default();
    let b = g.new_block(BlockKind::Normal, 0, 0);
    let obj = g.new_parameter(0, None);
    g.append(b, obj);
    let slots = g.new_slots(obj);
    g.append(b, slots);
    let elements = g.new_elements(obj);
    g.append(b, elements);
    let index = g.new_constant(ConstValue::Int32(0));
    g.append(b, index);

    let store = g.new_store_slot(slots, 1, obj);
    let load = g.new_load_element(elements, index, false);
    let store_set = g.alias_set(store);
    let load_set = g.alias_set(load);
    assert!(store_set.is_store());
    assert!(load_set.is_load());
    assert!(!store_set.intersects(load_set));
    assert!(g.alias_set(elements).intersects(AliasSet::store(AliasFlags::OBJECT_FIELDS)));
}

#[test]
fn test_unspecialized_instructions_store_everything() {
    let mut g = MirGraph::default();
    let start = g.new_start(StartType::Default);
    let any = AliasSet::store(AliasFlags::ANY);
    assert_eq!(g.alias_set(start), any);
    assert!(any.intersects(any));

    let p1 = g.new_parameter(0, None);
    let p2 = g.new_parameter(1, None);
    let add = g.new_add(p1, p2);
    assert!(g.is_effectful(add));
    g.specialize_arith(add, MirType::Int32);
    assert!(g.alias_set(add).is_none());
}

// =============================================================================
// Resume points
// =============================================================================

#[test]
fn test_three_frame_resume_chain() {
    let mut g = MirGraph::default();
    let b = g.new_block(BlockKind::Normal, 0, 2);
    let c0 = g.new_constant(ConstValue::Int32(0));
    g.append(b, c0);
    let c1 = g.new_constant(ConstValue::Int32(1));
    g.append(b, c1);
    g.block_mut(b).push(c0).unwrap();
    g.block_mut(b).push(c1).unwrap();

    let outer = g.new_resume_point(b, 3, None, ResumeMode::Outer);
    let middle = g.new_resume_point(b, 7, Some(outer), ResumeMode::Outer);
    let inner = g.new_resume_point(b, 11, Some(middle), ResumeMode::ResumeAt);
    let ret = g.new_return(c1);
    g.end(b, ret);

    assert_eq!(g.frame_count(inner), 3);
    assert_eq!(g.frame_count(outer), 1);
    let flat = g.flattened_resume_points(inner);
    assert_eq!(flat.frames(), &[outer, middle, inner]);
    assert_eq!(flat.num_operands(), 6);
    let pcs: Vec<u32> = flat.iter().map(|(_, rp)| rp.pc()).collect();
    assert_eq!(pcs, vec![3, 7, 11]);

    // Every captured slot is a registered use.
    assert_eq!(g.def(c0).use_count(), 3);
    assert_eq!(g.def(c1).use_count(), 4);
    assert!(g.verify().is_ok());

    g.discard_resume_point(inner);
    assert_eq!(g.def(c1).use_count(), 3);
    assert!(g.verify().is_ok());
}

// =============================================================================
// Folding and congruence
// =============================================================================

#[test]
fn test_fold_int32_add_of_constants() {
    let mut g = MirGraph::default();
    let c2 = g.new_constant(ConstValue::Int32(2));
    let c3 = g.new_constant(ConstValue::Int32(3));
    let add = g.new_add(c2, c3);
    g.specialize_arith(add, MirType::Int32);

    let folded = g.fold(add, false);
    assert_ne!(folded, add);
    assert_eq!(g.def(folded).opcode(), Opcode::Constant);
    assert!(g.is_constant(folded, &ConstValue::Int32(5)));
    assert!(g.def(folded).block().is_none());
}

#[test]
fn test_overflowing_int32_add_does_not_fold() {
    let mut g = MirGraph::default();
    let max = g.new_constant(ConstValue::Int32(i32::MAX));
    let one = g.new_constant(ConstValue::Int32(1));
    let add = g.new_add(max, one);
    g.specialize_arith(add, MirType::Int32);
    assert_eq!(g.fold(add, false), add);
}

#[test]
fn test_bit_and_with_zero_folds_to_zero_operand() {
    let mut g = MirGraph::default();
    let x = g.new_parameter(0, None);
    let zero = g.new_constant(ConstValue::Int32(0));
    let and = g.new_bit_and(x, zero);
    g.specialize_bitwise(and);
    assert_eq!(g.fold(and, false), zero);
}

#[test]
fn test_commuted_operands_are_congruent() {
    let mut g = MirGraph::default();
    let p1 = g.new_parameter(0, None);
    let p2 = g.new_parameter(1, None);

    let a = g.new_add(p1, p2);
    g.specialize_arith(a, MirType::Int32);
    let b = g.new_add(p2, p1);
    g.specialize_arith(b, MirType::Int32);
    assert_eq!(g.value_hash(a), g.value_hash(b));
    assert!(g.congruent_to(a, b));

    let s1 = g.new_sub(p1, p2);
    g.specialize_arith(s1, MirType::Int32);
    let s2 = g.new_sub(p2, p1);
    g.specialize_arith(s2, MirType::Int32);
    assert!(!g.congruent_to(s1, s2));

    // Generic arithmetic may call user code; never merged.
    let g1 = g.new_add(p1, p2);
    let g2 = g.new_add(p1, p2);
    assert!(!g.congruent_to(g1, g2));
}
