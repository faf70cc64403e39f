use crate::test::{assert_fixpoint, build_error, flat_domain, max_domain, Flat};
use crate::{
    work_list_solve, Assignment, BoxAssignment, EquationSystem, FiniteEquationSystem,
    GraphSystemBuilder, InputAssignment, MutableAssignment, NaturalOrdering, NullSolverTracer,
    SystemError, ValueBox,
};

#[test]
fn should_join_contributions_from_all_ingoing_edges() {
    let mut builder = GraphSystemBuilder::new(flat_domain());
    builder.unknowns(["x", "y"]);
    builder.initial(InputAssignment::constant(Flat::Bottom));
    builder.edge("x", vec![], |_| Flat::A);
    builder.edge("y", vec!["x"], |rho| rho.get(&"x"));
    builder.edge("y", vec![], |_| Flat::B);
    let eqs = builder.build().unwrap();

    let rho = work_list_solve(&eqs, &eqs.initial(), &NullSolverTracer);
    assert_eq!(rho.get(&"x"), Flat::A);
    assert_eq!(rho.get(&"y"), Flat::Top);
    assert_fixpoint(&eqs, &rho);

    let start = MutableAssignment::new(InputAssignment::constant(Flat::Bottom));
    let (_, deps) = eqs.apply_with_dependencies(&start, &"y");
    assert_eq!(deps, vec!["x"]);
}

#[test]
fn unknowns_without_defining_edges_are_stationary() {
    let mut builder = GraphSystemBuilder::new(flat_domain());
    builder.unknowns(["z"]);
    builder.initial(InputAssignment::constant(Flat::Bottom));
    let eqs = builder.build().unwrap();

    let mut rho = MutableAssignment::new(InputAssignment::constant(Flat::Bottom));
    assert_eq!(eqs.apply(&rho, &"z"), Flat::Bottom);
    rho.set("z", Flat::A);
    assert_eq!(eqs.apply(&rho, &"z"), Flat::A);

    let (_, deps) = eqs.apply_with_dependencies(&rho, &"z");
    assert!(deps.is_empty());
}

#[test]
fn influence_follows_edge_targets() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32, 2, 3]);
    builder.initial(InputAssignment::constant(0i64));
    builder.edge(2, vec![1], |rho| rho.get(&1));
    builder.edge(3, vec![1], |rho| rho.get(&1));
    let eqs = builder.build().unwrap();

    assert_eq!(eqs.infl(&1), vec![2, 3]);
    assert!(eqs.infl(&2).is_empty());
}

#[test]
fn should_reject_edges_into_undeclared_targets() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32]);
    builder.initial(InputAssignment::constant(0i64));
    builder.edge(2, vec![1], |_| 0);
    assert_eq!(build_error(builder.build()), SystemError::UnknownEdgeTarget(2));
}

#[test]
fn should_reject_edges_from_undeclared_sources() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32]);
    builder.initial(InputAssignment::constant(0i64));
    builder.edge(1, vec![9], |_| 0);
    assert_eq!(build_error(builder.build()), SystemError::UnknownEdgeSource(9));
}

#[test]
fn should_reject_duplicate_unknowns_and_stray_inputs() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32, 1]);
    builder.initial(InputAssignment::constant(0i64));
    assert_eq!(build_error(builder.build()), SystemError::DuplicateUnknown(1));

    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32]);
    builder.input(5);
    builder.initial(InputAssignment::constant(0i64));
    assert_eq!(build_error(builder.build()), SystemError::UnknownInput(5));
}

#[test]
fn should_demand_an_initial_assignment() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32]);
    assert_eq!(
        build_error::<_, u32>(builder.build()),
        SystemError::MissingInitial,
    );
}

#[test]
fn localized_widening_stabilizes_a_self_loop() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([0u32]);
    builder.initial(InputAssignment::constant(0i64));
    builder.edge(0, vec![0], |rho| rho.get(&0).saturating_add(1));
    let eqs = builder.build().unwrap();

    let widening = BoxAssignment::uniform(ValueBox::from_fn(|_: &i64, _| i64::MAX), true);
    let localized = eqs.with_localized_boxes(&widening, NaturalOrdering);
    let rho = work_list_solve(&localized, &localized.initial(), &NullSolverTracer);
    assert_eq!(rho.get(&0), i64::MAX);
}

#[test]
fn non_idempotent_localized_boxes_rewire_the_graph() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32, 2]);
    builder.initial(InputAssignment::constant(0i64));
    let e = builder.edge(1, vec![2], |rho| rho.get(&2));
    let eqs = builder.build().unwrap();

    let accumulate = BoxAssignment::uniform(ValueBox::from_fn(|old: &i64, new| old + new), false);
    let localized = eqs.with_localized_boxes(&accumulate, NaturalOrdering);

    // The boxed edge re-reads its target, so the target becomes a source
    // and influences itself.
    assert_eq!(localized.sources(e), &[2, 1]);
    assert!(localized.outgoing(&1).contains(&e));
    assert!(localized.infl(&1).contains(&1));
}

#[test]
fn idempotent_localized_boxes_keep_the_structure() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32, 2]);
    builder.initial(InputAssignment::constant(0i64));
    let e = builder.edge(1, vec![2], |rho| rho.get(&2));
    let eqs = builder.build().unwrap();

    let localized =
        eqs.with_localized_boxes(&BoxAssignment::uniform(ValueBox::right(), true), NaturalOrdering);
    assert_eq!(localized.sources(e), &[2]);
    assert!(localized.outgoing(&1).is_empty());
    assert!(!localized.infl(&1).contains(&1));
}

#[test]
fn non_idempotent_boxes_add_the_diagonal_everywhere() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32, 2]);
    builder.initial(InputAssignment::constant(0i64));
    builder.edge(1, vec![2], |rho| rho.get(&2));
    let eqs = builder.build().unwrap();

    let accumulate = BoxAssignment::uniform(ValueBox::from_fn(|old: &i64, new| old + new), false);
    let boxed = eqs.with_boxes(&accumulate);
    assert!(boxed.infl(&1).contains(&1));
    assert_eq!(boxed.infl(&2), vec![1, 2]);
}

#[test]
fn warrowing_widens_on_growth() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([0u32]);
    builder.initial(InputAssignment::constant(0i64));
    builder.edge(0, vec![0], |rho| rho.get(&0).saturating_add(1));
    let eqs = builder.build().unwrap();

    let widening = BoxAssignment::uniform(ValueBox::from_fn(|_: &i64, _| 100), true);
    let narrowing = BoxAssignment::uniform(ValueBox::right(), true);
    let flat = eqs.with_localized_warrowing(&widening, &narrowing, NaturalOrdering);

    let mut rho = MutableAssignment::new(InputAssignment::constant(0));
    // The self-loop contribution exceeds the current value: widen.
    assert_eq!(flat.apply(&rho, &0), 100);
    rho.set(0, 100);
    // Still growing, still widening, already at the widening point.
    assert_eq!(flat.apply(&rho, &0), 100);
}

#[test]
fn warrowing_narrows_on_shrink() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([0u32]);
    builder.initial(InputAssignment::constant(0i64));
    builder.edge(0, vec![0], |rho| (rho.get(&0) - 1).max(0));
    let eqs = builder.build().unwrap();

    let widening = BoxAssignment::uniform(ValueBox::from_fn(|_: &i64, _| 100), true);
    let narrowing = BoxAssignment::uniform(ValueBox::right(), true);
    let flat = eqs.with_localized_warrowing(&widening, &narrowing, NaturalOrdering);

    let mut rho = MutableAssignment::new(InputAssignment::constant(0));
    rho.set(0, 100);
    // The contribution sits below the current value: narrow down to it.
    assert_eq!(flat.apply(&rho, &0), 99);
    rho.set(0, 0);
    // At the bottom the contribution equals the value: neither operator.
    assert_eq!(flat.apply(&rho, &0), 0);
}

#[test]
fn warrowing_with_stateful_widenings_gains_the_diagonal() {
    let mut builder = GraphSystemBuilder::new(max_domain());
    builder.unknowns([1u32, 2]);
    builder.initial(InputAssignment::constant(0i64));
    builder.edge(1, vec![2], |rho| rho.get(&2));
    let eqs = builder.build().unwrap();

    let widenings =
        BoxAssignment::cautious(ValueBox::from_fn(|_: &i64, _| 100), ValueBox::right(), 1);
    let narrowings = BoxAssignment::uniform(ValueBox::right(), true);
    let flat = eqs.with_localized_warrowing(&widenings, &narrowings, NaturalOrdering);

    assert_eq!(flat.infl(&2), vec![1, 2]);
    assert_eq!(flat.infl(&1), vec![1]);
}
