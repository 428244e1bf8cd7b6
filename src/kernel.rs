//! Kernel dispatch: run a function written against one block of records
//! over every active block of a store.
//!
//! A kernel function receives a [`BlockMut`] (the block's column arrays and
//! its valid row count) plus a shared parameter value, and loops over rows
//! itself. [`KernelRegistry::compile`] wraps such a function into a
//! [`Kernel`], memoized by function identity: compiling the same function
//! twice yields kernels sharing one [`KernelArtifact`].
//!
//! ```
//! use blockphys::block_record;
//! use blockphys::block::{BlockMut, BlockStore};
//! use blockphys::kernel::{KernelOptions, KernelRegistry};
//!
//! block_record! {
//!     struct Particle in ParticleColumns {
//!         x: f64 = 0.0,
//!         v: f64 = 1.0,
//!     }
//! }
//!
//! fn advance(block: BlockMut<'_, Particle>, dt: &f64) {
//!     for i in 0..block.len() {
//!         block.data.x[i] += block.data.v[i] * dt;
//!     }
//! }
//!
//! let mut store: BlockStore<Particle> = BlockStore::new(4).unwrap();
//! store.grow(6, false);
//!
//! let mut registry = KernelRegistry::new();
//! let kernel = registry.compile(advance, KernelOptions::new());
//! assert_eq!(kernel.run(&mut store, &0.5), 2);
//! assert_eq!(store.flatten::<f64>("x", None).unwrap(), vec![0.5; 6]);
//! ```

use crate::block::{AnyStore, Block, BlockId, BlockMut, BlockStore, Record};
use crate::error::{ArgumentError, Result};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec as AllocVec;
use core::any::{Any, TypeId};
use core::marker::PhantomData;

/// Compilation options of a kernel.
///
/// # Builder Pattern
/// ```
/// use blockphys::kernel::KernelOptions;
///
/// let options = KernelOptions::new()
///     .with_data_parallel(true)
///     .with_diagnostics(true);
/// assert!(options.allow_data_parallel_across_blocks);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KernelOptions {
    /// Kernels are monomorphized, hence always compiled ahead of the first
    /// call. Kept so callers can state intent. Default: true.
    pub compile_eagerly: bool,
    /// Declares per-block invocations independent (no cross-block aliasing).
    /// With the `parallel` feature, blocks are then processed on the rayon
    /// pool. Default: false.
    pub allow_data_parallel_across_blocks: bool,
    /// Emit a `trace` event per block invocation. Default: false.
    pub emit_diagnostics: bool,
    /// Pass the (store, block) position to the function through
    /// [`BlockMut::block_id`]. Default: false.
    pub expose_block_identity: bool,
}

impl KernelOptions {
    /// Serial, eager, no diagnostics, no block identity.
    pub fn new() -> Self {
        KernelOptions {
            compile_eagerly: true,
            allow_data_parallel_across_blocks: false,
            emit_diagnostics: false,
            expose_block_identity: false,
        }
    }

    /// Set `compile_eagerly`.
    pub fn with_eager_compilation(mut self, eager: bool) -> Self {
        self.compile_eagerly = eager;
        self
    }

    /// Set `allow_data_parallel_across_blocks`.
    pub fn with_data_parallel(mut self, parallel: bool) -> Self {
        self.allow_data_parallel_across_blocks = parallel;
        self
    }

    /// Set `emit_diagnostics`.
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.emit_diagnostics = diagnostics;
        self
    }

    /// Set `expose_block_identity`.
    pub fn with_block_identity(mut self, expose: bool) -> Self {
        self.expose_block_identity = expose;
        self
    }
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// What a compilation produced, shared by every kernel of one function.
#[derive(Debug)]
pub struct KernelArtifact {
    /// Registration order within its registry.
    pub id: usize,
    /// Type name of the kernel function.
    pub name: &'static str,
    /// Type name of the record the function was compiled for.
    pub record: &'static str,
    pub options: KernelOptions,
    /// Human-readable description of the generated block loop.
    pub source: String,
}

fn describe<R: Record, F>(options: &KernelOptions) -> String {
    let name = core::any::type_name::<F>();
    let record = core::any::type_name::<R>();
    let mut source = format!("kernel {name}\n  for block in store.blocks() where block.active:\n");
    if options.allow_data_parallel_across_blocks {
        source.push_str("    (blocks dispatched in parallel)\n");
    }
    if options.expose_block_identity {
        source.push_str("    view.id = (store_index, block_index)\n");
    }
    source.push_str(&format!("    {name}(BlockMut<{record}>[0..block.num_elements], params)\n"));
    source
}

/// Memo table of compiled kernels, keyed by function identity.
///
/// Owned by the caller (the solver keeps one in its details) rather than
/// being process-wide state.
#[derive(Debug, Default)]
pub struct KernelRegistry {
    artifacts: BTreeMap<TypeId, Arc<KernelArtifact>>,
}

impl KernelRegistry {
    /// An empty memo table.
    pub fn new() -> Self {
        KernelRegistry { artifacts: BTreeMap::new() }
    }

    /// Number of distinct compiled functions.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// True before the first compilation.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Compile `func` for records of type `R`.
    ///
    /// Every function item or closure has its own type, which identifies it.
    /// A function compiled before returns a kernel sharing the existing
    /// artifact; the options of the first compilation are kept.
    pub fn compile<R, F>(&mut self, func: F, options: KernelOptions) -> Kernel<R, F>
    where
        R: Record,
        F: 'static,
    {
        let key = TypeId::of::<F>();
        let next_id = self.artifacts.len();
        let artifact = self
            .artifacts
            .entry(key)
            .or_insert_with(|| {
                let name = core::any::type_name::<F>();
                tracing::debug!(kernel = name, id = next_id, "compiling kernel");
                Arc::new(KernelArtifact {
                    id: next_id,
                    name,
                    record: core::any::type_name::<R>(),
                    options,
                    source: describe::<R, F>(&options),
                })
            })
            .clone();

        Kernel { func, artifact, _record: PhantomData }
    }
}

/// A dispatchable, block-iterating specialization of a per-block function.
pub struct Kernel<R: Record, F> {
    func: F,
    artifact: Arc<KernelArtifact>,
    _record: PhantomData<fn(&R)>,
}

impl<R: Record, F> Kernel<R, F> {
    /// The compiled artifact, shared by every kernel of the same function.
    pub fn artifact(&self) -> &Arc<KernelArtifact> {
        &self.artifact
    }

    /// Options the artifact was compiled with.
    pub fn options(&self) -> &KernelOptions {
        &self.artifact.options
    }

    /// Iterate the active blocks of one store, calling the function once
    /// per block. Returns the number of block invocations; a store without
    /// active blocks yields zero.
    pub fn run<P>(&self, store: &mut BlockStore<R>, params: &P) -> usize
    where
        P: ?Sized + Sync,
        F: Fn(BlockMut<'_, R>, &P) + Sync,
    {
        self.run_store(0, store, params)
    }

    /// Run over several stores of the same record type, in list order.
    ///
    /// Every element is checked before any block is visited, so a list with
    /// a foreign element fails without side effects.
    pub fn run_list<P>(&self, stores: &mut [&mut dyn AnyStore], params: &P) -> Result<usize>
    where
        P: ?Sized + Sync,
        F: Fn(BlockMut<'_, R>, &P) + Sync,
    {
        if let Some(position) = stores.iter().position(|s| !s.as_any().is::<BlockStore<R>>()) {
            return Err(not_a_store::<R>(position));
        }
        let mut invocations = 0;
        for (position, store) in stores.iter_mut().enumerate() {
            let Some(store) = store.as_any_mut().downcast_mut::<BlockStore<R>>() else {
                return Err(not_a_store::<R>(position));
            };
            invocations += self.run_store(position, store, params);
        }
        Ok(invocations)
    }

    /// Run with a dynamically typed first argument: a `BlockStore<R>` or a
    /// `Vec<BlockStore<R>>`. Anything else is an argument error.
    pub fn run_dyn<P>(&self, target: &mut dyn Any, params: &P) -> Result<usize>
    where
        P: ?Sized + Sync,
        F: Fn(BlockMut<'_, R>, &P) + Sync,
    {
        if let Some(store) = target.downcast_mut::<BlockStore<R>>() {
            return Ok(self.run_store(0, store, params));
        }
        if let Some(stores) = target.downcast_mut::<AllocVec<BlockStore<R>>>() {
            return Ok(stores
                .iter_mut()
                .enumerate()
                .map(|(position, store)| self.run_store(position, store, params))
                .sum());
        }
        Err(not_a_store::<R>(0))
    }

    fn run_store<P>(&self, position: usize, store: &mut BlockStore<R>, params: &P) -> usize
    where
        P: ?Sized + Sync,
        F: Fn(BlockMut<'_, R>, &P) + Sync,
    {
        if store.num_active_blocks() == 0 {
            return 0;
        }

        #[cfg(feature = "parallel")]
        if self.artifact.options.allow_data_parallel_across_blocks {
            use rayon::prelude::*;
            return store
                .blocks_mut()
                .par_iter_mut()
                .enumerate()
                .filter(|(_, block)| block.is_active())
                .map(|(index, block)| {
                    self.invoke(position, index, block, params);
                    1
                })
                .sum();
        }

        let mut invocations = 0;
        for (index, block) in store.blocks_mut().iter_mut().enumerate() {
            if !block.is_active() {
                continue;
            }
            self.invoke(position, index, block, params);
            invocations += 1;
        }
        invocations
    }

    fn invoke<P>(&self, position: usize, index: usize, block: &mut Block<R>, params: &P)
    where
        P: ?Sized,
        F: Fn(BlockMut<'_, R>, &P),
    {
        let options = &self.artifact.options;
        if options.emit_diagnostics {
            tracing::trace!(
                kernel = self.artifact.name,
                store = position,
                block = index,
                len = block.num_elements(),
                "kernel block"
            );
        }
        let id = options
            .expose_block_identity
            .then_some(BlockId { store: position, block: index });
        (self.func)(block.view(id), params);
    }
}

fn not_a_store<R: Record>(position: usize) -> crate::error::Error {
    ArgumentError::NotABlockStore { position, expected: core::any::type_name::<BlockStore<R>>() }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use alloc::vec;
    use core::sync::atomic::{AtomicUsize, Ordering};

    crate::block_record! {
        struct Cell in CellColumns {
            value: f64 = 1.0,
            origin: u32 = u32::MAX,
        }
    }

    crate::block_record! {
        struct Other in OtherColumns {
            value: f64 = 0.0,
        }
    }

    fn double(block: BlockMut<'_, Cell>, _: &()) {
        for i in 0..block.len() {
            block.data.value[i] *= 2.0;
        }
    }

    fn count(block: BlockMut<'_, Cell>, calls: &AtomicUsize) {
        assert!(!block.is_empty());
        calls.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn compilation_is_memoized() {
        let mut registry = KernelRegistry::new();
        let a = registry.compile::<Cell, _>(double, KernelOptions::new());
        let b = registry.compile::<Cell, _>(double, KernelOptions::new().with_diagnostics(true));
        assert!(Arc::ptr_eq(a.artifact(), b.artifact()));
        assert!(!b.options().emit_diagnostics);
        assert_eq!(registry.len(), 1);

        let c = registry.compile::<Cell, _>(count, KernelOptions::new());
        assert!(!Arc::ptr_eq(a.artifact(), c.artifact()));
        assert_eq!(c.artifact().id, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn empty_store_is_not_visited() {
        let mut registry = KernelRegistry::new();
        let kernel = registry.compile::<Cell, _>(count, KernelOptions::new());
        let mut store: BlockStore<Cell> = BlockStore::new(4).unwrap();
        let calls = AtomicUsize::new(0);
        assert_eq!(kernel.run(&mut store, &calls), 0);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn inactive_blocks_are_skipped() {
        let mut registry = KernelRegistry::new();
        let kernel = registry.compile::<Cell, _>(double, KernelOptions::new());
        let mut store: BlockStore<Cell> = BlockStore::new(4).unwrap();
        store.grow(4, false);
        let second = store.grow(3, false);
        store.set_active(false, Some(&second)).unwrap();

        assert_eq!(kernel.run(&mut store, &()), 1);
        store.set_active(true, Some(&second)).unwrap();
        assert_eq!(
            store.flatten::<f64>("value", None).unwrap(),
            vec![2.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn list_dispatch_in_order() {
        let mut registry = KernelRegistry::new();
        let kernel = registry.compile::<Cell, _>(
            |block: BlockMut<'_, Cell>, _: &()| {
                if let Some(id) = block.block_id() {
                    for i in 0..block.len() {
                        block.data.origin[i] = id.store as u32;
                    }
                }
            },
            KernelOptions::new().with_block_identity(true),
        );

        let mut a: BlockStore<Cell> = BlockStore::new(4).unwrap();
        let mut empty: BlockStore<Cell> = BlockStore::new(4).unwrap();
        let mut b: BlockStore<Cell> = BlockStore::new(4).unwrap();
        a.grow(2, true);
        b.grow(5, true);

        let invocations = kernel.run_list(&mut [&mut a, &mut empty, &mut b], &()).unwrap();
        assert_eq!(invocations, 3);
        assert_eq!(a.flatten::<u32>("origin", None).unwrap(), vec![0, 0]);
        assert_eq!(b.flatten::<u32>("origin", None).unwrap(), vec![2; 5]);
    }

    #[test]
    fn list_with_foreign_store_fails_untouched() {
        let mut registry = KernelRegistry::new();
        let kernel = registry.compile::<Cell, _>(double, KernelOptions::new());
        let mut cells: BlockStore<Cell> = BlockStore::new(4).unwrap();
        let mut other: BlockStore<Other> = BlockStore::new(4).unwrap();
        cells.grow(2, true);

        let err = kernel.run_list(&mut [&mut cells, &mut other], &()).unwrap_err();
        assert!(matches!(err, Error::Argument(ArgumentError::NotABlockStore { position: 1, .. })));
        assert_eq!(cells.flatten::<f64>("value", None).unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn dynamic_first_argument() {
        let mut registry = KernelRegistry::new();
        let kernel = registry.compile::<Cell, _>(double, KernelOptions::new());

        let mut store: BlockStore<Cell> = BlockStore::new(2).unwrap();
        store.grow(3, true);
        assert_eq!(kernel.run_dyn(&mut store, &()).unwrap(), 2);

        let mut list = vec![store.clone(), store];
        assert_eq!(kernel.run_dyn(&mut list, &()).unwrap(), 4);

        let mut not_a_store = 3.0f64;
        assert!(matches!(
            kernel.run_dyn(&mut not_a_store, &()),
            Err(Error::Argument(ArgumentError::NotABlockStore { position: 0, .. }))
        ));
    }

    #[test]
    fn parallel_blocks_match_serial() {
        let mut registry = KernelRegistry::new();
        let serial = registry.compile::<Cell, _>(double, KernelOptions::new());
        let parallel = registry.compile::<Cell, _>(
            |block: BlockMut<'_, Cell>, _: &()| double(block, &()),
            KernelOptions::new().with_data_parallel(true),
        );

        let mut a: BlockStore<Cell> = BlockStore::new(8).unwrap();
        a.grow(100, false);
        let values: AllocVec<f64> = (0..100).map(|i| i as f64).collect();
        a.scatter_in("value", &values, None).unwrap();
        let mut b = a.clone();

        assert_eq!(serial.run(&mut a, &()), parallel.run(&mut b, &()));
        assert_eq!(
            a.flatten::<f64>("value", None).unwrap(),
            b.flatten::<f64>("value", None).unwrap()
        );
    }

    #[test]
    fn source_describes_loop() {
        let mut registry = KernelRegistry::new();
        let kernel = registry.compile::<Cell, _>(double, KernelOptions::new().with_block_identity(true));
        assert!(kernel.artifact().source.contains("block.active"));
        assert!(kernel.artifact().source.contains("store_index"));
    }
}
