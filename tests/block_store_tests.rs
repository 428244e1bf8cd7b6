use blockphys::block::{BlockStore, Handles};
use blockphys::{block_record, Error, KernelOptions, KernelRegistry, Node, RecordId, Vec2};

block_record! {
    pub struct Tracer in TracerColumns {
        pub position: Vec2<f64> = Vec2::new(0.0, 0.0),
        pub age: u32 = 0,
        pub alive: bool = true,
    }
}

fn ids(store: &BlockStore<Node>, handles: &Handles) -> Vec<RecordId> {
    store.flatten("id", Some(handles)).unwrap()
}

#[test]
fn scatter_flatten_round_trip() {
    let mut store: BlockStore<Tracer> = BlockStore::new(3).unwrap();
    store.grow(7, true);
    let positions: Vec<Vec2<f64>> = (0..7).map(|i| Vec2::new(i as f64, -(i as f64))).collect();
    store.scatter_in("position", &positions, None).unwrap();
    let flat = store.flatten::<Vec2<f64>>("position", None).unwrap();
    assert_eq!(flat, positions);

    store.scatter_in("position", &flat, None).unwrap();
    assert_eq!(store.flatten::<Vec2<f64>>("position", None).unwrap(), positions);
}

#[test]
fn growth_adds_exactly_n() {
    let mut store: BlockStore<Tracer> = BlockStore::new(4).unwrap();
    let mut expected = 0;
    for n in [1, 4, 5, 0, 9] {
        store.grow(n, false);
        expected += n;
        assert_eq!(store.count_elements(None).unwrap(), expected);
    }
    assert!(store.num_active_blocks() > 0);
}

#[test]
fn inactive_block_is_reused() {
    let mut store: BlockStore<Tracer> = BlockStore::new(8).unwrap();
    let first = store.grow(6, true);
    store.grow(3, true);
    store.set_active(false, Some(&first)).unwrap();
    let blocks = store.num_blocks();

    let reused = store.grow(5, true);
    assert_eq!(store.num_blocks(), blocks);
    assert_eq!(reused.blocks().collect::<Vec<_>>(), first.blocks().collect::<Vec<_>>());
    assert_eq!(store.count_elements(None).unwrap(), 8);
}

#[test]
fn node_identity_survives_store_operations() {
    let mut nodes: BlockStore<Node> = BlockStore::new(2).unwrap();
    let a = nodes.grow(3, true);
    let before = ids(&nodes, &a);

    let b = nodes.grow(2, true);
    nodes.fill("m", 2.0, None).unwrap();
    nodes.scatter_in("x", &[Vec2::new(1.0, 1.0); 5], None).unwrap();
    nodes.set_active(false, Some(&b)).unwrap();
    nodes.set_active(true, Some(&b)).unwrap();
    assert_eq!(ids(&nodes, &a), before);

    for id in &before {
        assert_eq!(nodes.locate(*id), Some((id.block_index(), id.slot_index())));
    }
    assert!(matches!(nodes.remove(&a), Err(Error::Unsupported { .. })));
    assert_eq!(ids(&nodes, &a), before);
}

#[test]
fn kernel_on_inactive_store_is_a_no_op() {
    let mut nodes: BlockStore<Node> = BlockStore::new(4).unwrap();
    let handles = nodes.grow(3, true);
    nodes.set_active(false, Some(&handles)).unwrap();

    fn explode(_: blockphys::block::BlockMut<'_, Node>, _: &()) {
        panic!("inactive block visited");
    }
    let mut kernels = KernelRegistry::new();
    let kernel = kernels.compile::<Node, _>(explode, KernelOptions::new());
    assert_eq!(kernel.run(&mut nodes, &()), 0);
}

#[test]
fn memoized_kernel_shares_artifact() {
    fn noop(_: blockphys::block::BlockMut<'_, Tracer>, _: &()) {}
    let mut kernels = KernelRegistry::new();
    let a = kernels.compile::<Tracer, _>(noop, KernelOptions::new());
    let b = kernels.compile::<Tracer, _>(noop, KernelOptions::new().with_diagnostics(true));
    assert!(std::sync::Arc::ptr_eq(a.artifact(), b.artifact()));
    assert_eq!(kernels.len(), 1);
}
