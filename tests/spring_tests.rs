use approx::assert_relative_eq;
use blockphys::constraint::spring::{damping_force, elastic_energy, stretch_force, stretch_jacobian};
use blockphys::constraint::{self, ConstraintInput, ConstraintStore};
use blockphys::{BlockStore, KernelRegistry, Mat as _, Mat2, Node, RecordId, Spring, Vec as _, Vec2};

#[test]
fn two_node_spring_forces_are_opposite() {
    let mut nodes: BlockStore<Node> = BlockStore::new(4).unwrap();
    let handles = nodes.grow(2, true);
    nodes.scatter_in("x", &[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)], Some(&handles)).unwrap();
    let ids: Vec<RecordId> = nodes.flatten("id", Some(&handles)).unwrap();

    let mut springs: BlockStore<Spring> = BlockStore::new(4).unwrap();
    let spring = Spring { stiffness: 10.0, damping: 0.0, rest_length: 0.5, node_ids: [ids[0], ids[1]], ..Spring::default() };
    constraint::insert(&mut springs, &[spring]).unwrap();

    let mut kernels = KernelRegistry::new();
    let input = ConstraintInput::new(&nodes, &[]);
    assert_eq!(springs.compute_forces(&mut kernels, &input), 1);
    springs.compute_jacobians(&mut kernels, &input);
    assert_eq!(input.dangling(), 0);

    let [f0, f1] = springs.get(0, 0).unwrap().f;
    assert_relative_eq!(f0.x, 5.0);
    assert_relative_eq!(f0.y, 0.0);
    assert_eq!(f1, -f0);

    springs.accumulate_forces(&mut nodes).unwrap();
    let forces: Vec<Vec2<f64>> = nodes.flatten("f", None).unwrap();
    assert_eq!(forces, [f0, f1]);
}

#[test]
fn jacobian_blocks_are_mirrored() {
    let mut nodes: BlockStore<Node> = BlockStore::new(4).unwrap();
    nodes.grow(2, true);
    nodes.scatter_in("x", &[Vec2::new(0.0, 0.0), Vec2::new(0.6, 0.8)], None).unwrap();
    let ids: Vec<RecordId> = nodes.flatten("id", None).unwrap();

    let mut springs: BlockStore<Spring> = BlockStore::new(4).unwrap();
    constraint::insert(&mut springs, &[Spring { stiffness: 3.0, damping: 0.5, rest_length: 2.0, node_ids: [ids[0], ids[1]], ..Spring::default() }]).unwrap();
    springs.compute_jacobians(&mut KernelRegistry::new(), &ConstraintInput::new(&nodes, &[]));

    let spring = springs.get(0, 0).unwrap();
    let [[a, b], [c, d]] = spring.dfdx;
    assert_eq!(a, d);
    assert_eq!(b, c);
    assert_eq!(a, -b);
    assert_eq!(a, stretch_jacobian(Vec2::new(0.0, 0.0), Vec2::new(0.6, 0.8), 2.0, 3.0));
}

#[test]
fn degenerate_spring_stays_finite() {
    let x = Vec2::<f64>::new(0.25, -1.0);
    let j = stretch_jacobian(x, x, 1.0, 7.0);
    assert_eq!(j, Mat2::<f64>::identity().scale(-7.0));
    let f = stretch_force(x, x, 1.0, 7.0);
    assert!(f.x.is_finite() && f.y.is_finite());
}

#[test]
fn damping_opposes_separation_speed() {
    let f = damping_force(
        Vec2::<f64>::new(0.0, 0.0),
        Vec2::new(2.0, 0.0),
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 3.0),
        2.0,
    );
    // Only the component along the spring counts.
    assert_relative_eq!(f.x, 2.0);
    assert_relative_eq!(f.y, 0.0);
}

#[test]
fn energy_matches_force_work() {
    let (x0, x1) = (Vec2::<f64>::new(0.0, 0.0), Vec2::<f64>::new(1.5, 0.0));
    let e = elastic_energy(x0, x1, 1.0, 4.0);
    assert_relative_eq!(e, 0.5 * 4.0 * 0.25);

    let h = 1e-6_f64;
    let de = (elastic_energy(x0, x1 + Vec2::new(h, 0.0), 1.0, 4.0) - elastic_energy(x0, x1 - Vec2::new(h, 0.0), 1.0, 4.0)) / (2.0 * h);
    // The pull on x0 is the energy gradient at x1.
    assert_relative_eq!(de, stretch_force(x0, x1, 1.0, 4.0).x, epsilon = 1e-6);
    assert_relative_eq!(x0.distance(x1), 1.5);
}
