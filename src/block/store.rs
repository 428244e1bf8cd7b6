//! Ordered block collections for one record type, with handle-based growth.

use crate::block::{Block, Columns, FieldType, Record, RecordId, Schema};
use crate::error::{ArgumentError, Error, Result, SchemaError};
use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec::Vec as AllocVec;
use core::any::Any;

/// Block capacity used when none is chosen.
pub const DEFAULT_BLOCK_SIZE: usize = 100;

/// A claimed block and the number of records claimed in it (slots `0..len`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockSpan {
    pub block: usize,
    pub len: usize,
}

/// Addresses the slots claimed by one growth operation.
///
/// Handles do not own anything: the store owns every record, a handle is
/// only the capability to address a subrange of it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Handles {
    spans: AllocVec<BlockSpan>,
}

impl Handles {
    /// Contiguous runs of claimed slots, one per block touched.
    pub fn spans(&self) -> &[BlockSpan] {
        &self.spans
    }

    /// Block indices, in claim order.
    pub fn blocks(&self) -> impl Iterator<Item = usize> + '_ {
        self.spans.iter().map(|s| s.block)
    }

    /// Every `(block, slot)` pair, in claim order.
    pub fn slots(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.spans.iter().flat_map(|s| (0..s.len).map(move |slot| (s.block, slot)))
    }

    /// Number of claimed records.
    pub fn len(&self) -> usize {
        self.spans.iter().map(|s| s.len).sum()
    }

    /// True when nothing was claimed.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Append another handle set.
    pub fn extend(&mut self, other: &Handles) {
        self.spans.extend_from_slice(&other.spans);
    }
}

impl FromIterator<BlockSpan> for Handles {
    fn from_iter<I: IntoIterator<Item = BlockSpan>>(iter: I) -> Self {
        Handles { spans: iter.into_iter().collect() }
    }
}

/// Lazy sequence of the active blocks of a store, optionally restricted to
/// the blocks of a handle set. Create a new one to restart.
pub struct Blocks<'s, R: Record> {
    blocks: &'s [Block<R>],
    spans: Option<&'s [BlockSpan]>,
    position: usize,
}

impl<'s, R: Record> Iterator for Blocks<'s, R> {
    type Item = &'s Block<R>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let index = match self.spans {
                Some(spans) => spans.get(self.position)?.block,
                None => self.position,
            };
            self.position += 1;
            let block = self.blocks.get(index)?;
            if block.is_active() {
                debug_assert!(!block.is_empty());
                return Some(block);
            }
        }
    }
}

/// Ordered list of fixed-capacity blocks for one record schema.
///
/// Invariant: at least one block exists at all times (possibly inactive and
/// empty), so iteration and kernel entry never face a zero-length store.
#[derive(Clone, Debug)]
pub struct BlockStore<R: Record> {
    schema: Schema,
    blocks: AllocVec<Block<R>>,
    block_size: usize,
    template: R,
    next_serial: u32,
}

impl<R: Record> BlockStore<R> {
    /// Derive the schema of `R` and create a store holding one empty block.
    pub fn new(block_size: usize) -> core::result::Result<Self, SchemaError> {
        if block_size == 0 {
            return Err(SchemaError::ZeroBlockSize);
        }
        let schema = Schema::new(R::fields())?;
        let template = R::template();
        let blocks = alloc::vec![Block::allocate(block_size, &template)];
        Ok(BlockStore { schema, blocks, block_size, template, next_serial: 0 })
    }

    /// Field layout derived from `R`.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Capacity of every block, in records.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether records carry a [`RecordId`] column. Such stores refuse
    /// [`remove`](Self::remove).
    pub fn is_identity_bearing(&self) -> bool {
        self.schema.is_identity_bearing()
    }

    /// Allocated blocks, active or not. Never zero.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks that take part in iteration.
    pub fn num_active_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_active()).count()
    }

    /// True when no block participates in iteration.
    pub fn is_empty(&self) -> bool {
        self.num_active_blocks() == 0
    }

    /// The block at `index`, active or not.
    pub fn block(&self, index: usize) -> Result<&Block<R>> {
        let count = self.blocks.len();
        self.blocks
            .get(index)
            .ok_or(ArgumentError::BlockOutOfRange { index, count }.into())
    }

    /// Mutable access to the block at `index`.
    pub fn block_mut(&mut self, index: usize) -> Result<&mut Block<R>> {
        let count = self.blocks.len();
        self.blocks
            .get_mut(index)
            .ok_or(ArgumentError::BlockOutOfRange { index, count }.into())
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block<R>] {
        &mut self.blocks
    }

    /// Reset to exactly one inactive, empty block. Identity serials keep
    /// increasing, so ids minted afterwards never repeat earlier ones.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.blocks.push(Block::allocate(self.block_size, &self.template));
    }

    /// `clear()` followed by `grow(num_elements, true)`.
    pub fn initialize(&mut self, num_elements: usize) -> Handles {
        self.clear();
        self.grow(num_elements, true)
    }

    /// Claim `num_elements` slots initialised with template defaults.
    ///
    /// With `reuse_inactive`, inactive blocks are reactivated (first fit)
    /// before new blocks are appended. Identity columns get fresh values.
    pub fn grow(&mut self, num_elements: usize, reuse_inactive: bool) -> Handles {
        let handles = self.claim(num_elements, reuse_inactive);
        for span in handles.spans() {
            let block = &mut self.blocks[span.block];
            for slot in 0..self.block_size {
                block.data.write(slot, &self.template);
            }
        }
        self.mint_identities(&handles);
        tracing::debug!(
            record = core::any::type_name::<R>(),
            num_elements,
            blocks = handles.spans().len(),
            "grew block store"
        );
        handles
    }

    /// Same slot claiming as [`grow`](Self::grow) without default-filling.
    /// Reused blocks keep whatever values they held; identity columns are
    /// still assigned.
    pub fn grow_uninitialized(&mut self, num_elements: usize, reuse_inactive: bool) -> Handles {
        let handles = self.claim(num_elements, reuse_inactive);
        self.mint_identities(&handles);
        handles
    }

    fn claim(&mut self, num_elements: usize, reuse_inactive: bool) -> Handles {
        let mut spans = AllocVec::new();
        if num_elements == 0 {
            return Handles { spans };
        }

        let mut inactive: AllocVec<usize> = if reuse_inactive {
            self.blocks
                .iter()
                .enumerate()
                .filter(|(_, b)| !b.is_active())
                .map(|(i, _)| i)
                .collect()
        } else {
            AllocVec::new()
        };
        inactive.reverse();

        let mut remaining = num_elements;
        while remaining > 0 {
            let len = remaining.min(self.block_size);
            let index = match inactive.pop() {
                Some(index) => index,
                None => {
                    self.blocks.push(Block::allocate(self.block_size, &self.template));
                    self.blocks.len() - 1
                }
            };
            let block = &mut self.blocks[index];
            block.set_len(len);
            block.set_active(true);
            spans.push(BlockSpan { block: index, len });
            remaining -= len;
        }

        Handles { spans }
    }

    fn mint_identities(&mut self, handles: &Handles) {
        let Some(field) = self.schema.identity() else {
            return;
        };
        for span in handles.spans() {
            let block = &mut self.blocks[span.block];
            let Some(ids) = block
                .data
                .column_mut(field)
                .and_then(|c| c.downcast_mut::<Box<[RecordId]>>())
            else {
                continue;
            };
            for (slot, id) in ids.iter_mut().enumerate() {
                *id = if slot < span.len {
                    let serial = self.next_serial;
                    self.next_serial = self.next_serial.wrapping_add(1);
                    RecordId { serial, block: span.block as u32, slot: slot as u32 }
                } else {
                    RecordId::NONE
                };
            }
        }
    }

    fn check_handles(&self, handles: &Handles) -> Result<()> {
        let count = self.blocks.len();
        match handles.blocks().find(|&index| index >= count) {
            Some(index) => Err(ArgumentError::BlockOutOfRange { index, count }.into()),
            None => Ok(()),
        }
    }

    /// Active blocks in store order, or the active blocks among `handles`.
    pub fn iter<'s>(&'s self, handles: Option<&'s Handles>) -> Result<Blocks<'s, R>> {
        if let Some(handles) = handles {
            self.check_handles(handles)?;
        }
        Ok(Blocks { blocks: &self.blocks, spans: handles.map(|h| h.spans()), position: 0 })
    }

    fn selected(&self, handles: Option<&Handles>) -> Result<AllocVec<usize>> {
        match handles {
            Some(handles) => {
                self.check_handles(handles)?;
                Ok(handles.blocks().collect())
            }
            None => Ok((0..self.blocks.len()).collect()),
        }
    }

    /// Sum of valid rows over the selected active blocks.
    pub fn count_elements(&self, handles: Option<&Handles>) -> Result<usize> {
        Ok(self.iter(handles)?.map(|b| b.num_elements()).sum())
    }

    fn column_index<T: FieldType>(&self, name: &str) -> Result<usize> {
        let index = self
            .schema
            .field_index(name)
            .ok_or_else(|| ArgumentError::UnknownField(name.to_string()))?;
        if !self.schema.fields()[index].holds::<T>() {
            return Err(ArgumentError::FieldType {
                name: name.to_string(),
                requested: core::any::type_name::<T>(),
            }
            .into());
        }
        Ok(index)
    }

    fn writable_column_index<T: FieldType>(&self, name: &str, operation: &'static str) -> Result<usize> {
        let index = self.column_index::<T>(name)?;
        if self.schema.identity() == Some(index) {
            return Err(Error::Unsupported {
                operation,
                reason: "identity values are assigned by the store",
            });
        }
        Ok(index)
    }

    /// Gather a field of the selected active blocks into one flat array.
    pub fn flatten<T: FieldType>(&self, name: &str, handles: Option<&Handles>) -> Result<AllocVec<T>> {
        let field = self.column_index::<T>(name)?;
        let mut values = AllocVec::with_capacity(self.count_elements(handles)?);
        for block in self.iter(handles)? {
            let column = typed_column::<T>(block.data.column(field), name)?;
            values.extend_from_slice(&column[..block.num_elements()]);
        }
        Ok(values)
    }

    /// Copy a flat array into the selected active blocks, in the traversal
    /// order of [`iter`](Self::iter). `scatter_in(f, flatten(f))` is the identity.
    pub fn scatter_in<T: FieldType>(&mut self, name: &str, values: &[T], handles: Option<&Handles>) -> Result<()> {
        let field = self.writable_column_index::<T>(name, "scatter_in")?;
        let expected = self.count_elements(handles)?;
        if values.len() != expected {
            return Err(ArgumentError::LengthMismatch { expected, found: values.len() }.into());
        }

        let mut offset = 0;
        for index in self.selected(handles)? {
            let block = &mut self.blocks[index];
            if !block.is_active() {
                continue;
            }
            let len = block.num_elements();
            let column = typed_column_mut::<T>(block.data.column_mut(field), name)?;
            column[..len].clone_from_slice(&values[offset..offset + len]);
            offset += len;
        }
        Ok(())
    }

    /// Assign `value` to every valid row of the selected active blocks.
    pub fn fill<T: FieldType>(&mut self, name: &str, value: T, handles: Option<&Handles>) -> Result<()> {
        let field = self.writable_column_index::<T>(name, "fill")?;
        for index in self.selected(handles)? {
            let block = &mut self.blocks[index];
            if !block.is_active() {
                continue;
            }
            let len = block.num_elements();
            let column = typed_column_mut::<T>(block.data.column_mut(field), name)?;
            column[..len].fill(value.clone());
        }
        Ok(())
    }

    /// Toggle activity of the selected blocks. Blocks without valid rows
    /// stay inactive.
    pub fn set_active(&mut self, active: bool, handles: Option<&Handles>) -> Result<()> {
        for index in self.selected(handles)? {
            let block = &mut self.blocks[index];
            block.set_active(active && !block.is_empty());
        }
        Ok(())
    }

    /// Physically delete the blocks of `handles`.
    ///
    /// Refused on identity-bearing stores: other records hold durable
    /// `(block, slot)` references into them. Deactivate instead.
    /// Handles issued earlier are invalidated by a successful removal.
    pub fn remove(&mut self, handles: &Handles) -> Result<()> {
        if self.is_identity_bearing() {
            return Err(Error::Unsupported {
                operation: "remove",
                reason: "identity-bearing stores only support deactivation",
            });
        }
        self.check_handles(handles)?;

        let mut indices: AllocVec<usize> = handles.blocks().collect();
        indices.sort_unstable();
        indices.dedup();
        for index in indices.into_iter().rev() {
            self.blocks.remove(index);
        }
        if self.blocks.is_empty() {
            self.blocks.push(Block::allocate(self.block_size, &self.template));
        }
        Ok(())
    }

    /// Copy of the record at `(block, slot)`.
    pub fn get(&self, block: usize, slot: usize) -> Result<R> {
        let b = self.block(block)?;
        b.record(slot)
            .ok_or(ArgumentError::SlotOutOfRange { block, slot, len: b.num_elements() }.into())
    }

    /// Overwrite the record at `(block, slot)`; its identity value is kept.
    pub fn set(&mut self, block: usize, slot: usize, record: &R) -> Result<()> {
        let identity = self.schema.identity();
        let b = self.block_mut(block)?;
        let len = b.num_elements();
        if slot >= len {
            return Err(ArgumentError::SlotOutOfRange { block, slot, len }.into());
        }
        let kept = identity.and_then(|field| {
            typed_column::<RecordId>(b.data.column(field), "id").ok().map(|ids| ids[slot])
        });
        b.data.write(slot, record);
        if let (Some(field), Some(id)) = (identity, kept) {
            if let Ok(ids) = typed_column_mut::<RecordId>(b.data.column_mut(field), "id") {
                ids[slot] = id;
            }
        }
        Ok(())
    }

    /// Location of a live record by identity. `None` when the id is stale,
    /// i.e. its block was deactivated or reused since it was minted.
    pub fn locate(&self, id: RecordId) -> Option<(usize, usize)> {
        let field = self.schema.identity()?;
        let block = self.blocks.get(id.block_index())?;
        if !block.is_active() || id.slot_index() >= block.num_elements() {
            return None;
        }
        let ids = typed_column::<RecordId>(block.data.column(field), "id").ok()?;
        (ids[id.slot_index()] == id).then_some((id.block_index(), id.slot_index()))
    }
}

fn typed_column<'c, T: FieldType>(column: Option<&'c dyn Any>, name: &str) -> Result<&'c [T]> {
    column
        .and_then(|c| c.downcast_ref::<Box<[T]>>())
        .map(|c| &c[..])
        .ok_or_else(|| {
            ArgumentError::FieldType { name: name.to_string(), requested: core::any::type_name::<T>() }.into()
        })
}

fn typed_column_mut<'c, T: FieldType>(column: Option<&'c mut dyn Any>, name: &str) -> Result<&'c mut [T]> {
    column
        .and_then(|c| c.downcast_mut::<Box<[T]>>())
        .map(|c| &mut c[..])
        .ok_or_else(|| {
            ArgumentError::FieldType { name: name.to_string(), requested: core::any::type_name::<T>() }.into()
        })
}

/// Type-erased block store, for heterogeneous dispatch lists.
pub trait AnyStore: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Type name of the stored record.
    fn record_type(&self) -> &'static str;
    fn num_active_blocks(&self) -> usize;
}

impl<R: Record> AnyStore for BlockStore<R> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn record_type(&self) -> &'static str {
        core::any::type_name::<R>()
    }

    fn num_active_blocks(&self) -> usize {
        BlockStore::num_active_blocks(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec::Vec2;
    use alloc::vec;

    crate::block_record! {
        struct Vertex in VertexColumns {
            x: Vec2<f64> = Vec2::new(2.1, 2.1),
            y: f64 = 1.5,
        }
    }

    crate::block_record! {
        struct Tagged in TaggedColumns {
            w: f64 = 0.0,
            id: RecordId = RecordId::NONE,
        }
    }

    #[test]
    fn new_store_has_one_inactive_block() {
        let store: BlockStore<Vertex> = BlockStore::new(10).unwrap();
        assert_eq!(store.num_blocks(), 1);
        assert!(store.is_empty());
        assert_eq!(store.count_elements(None).unwrap(), 0);
        assert_eq!(store.iter(None).unwrap().count(), 0);
    }

    #[test]
    fn grow_spans_blocks() {
        let mut store: BlockStore<Vertex> = BlockStore::new(10).unwrap();
        let handles = store.grow(25, false);
        assert_eq!(handles.spans(), &[
            BlockSpan { block: 1, len: 10 },
            BlockSpan { block: 2, len: 10 },
            BlockSpan { block: 3, len: 5 },
        ]);
        assert_eq!(store.count_elements(None).unwrap(), 25);
        assert_eq!(store.count_elements(Some(&handles)).unwrap(), 25);
    }

    #[test]
    fn grow_reuses_inactive_first_fit() {
        let mut store: BlockStore<Vertex> = BlockStore::new(10).unwrap();
        let handles = store.grow(5, true);
        assert_eq!(handles.spans()[0].block, 0);
        assert_eq!(store.num_blocks(), 1);
    }

    #[test]
    fn zero_growth_claims_nothing() {
        let mut store: BlockStore<Vertex> = BlockStore::new(10).unwrap();
        assert!(store.grow(0, true).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn grow_resets_reused_blocks_to_defaults() {
        let mut store: BlockStore<Vertex> = BlockStore::new(4).unwrap();
        let handles = store.grow(3, true);
        store.fill("y", 9.0, Some(&handles)).unwrap();
        store.set_active(false, Some(&handles)).unwrap();

        let again = store.grow(3, true);
        assert_eq!(again.spans()[0].block, handles.spans()[0].block);
        assert_eq!(store.flatten::<f64>("y", None).unwrap(), vec![1.5; 3]);
    }

    #[test]
    fn uninitialized_growth_keeps_stale_values() {
        let mut store: BlockStore<Vertex> = BlockStore::new(4).unwrap();
        let handles = store.grow(2, true);
        store.fill("y", 9.0, Some(&handles)).unwrap();
        store.set_active(false, None).unwrap();

        store.grow_uninitialized(2, true);
        assert_eq!(store.flatten::<f64>("y", None).unwrap(), vec![9.0; 2]);
    }

    #[test]
    fn flatten_scatter_round_trip() {
        let mut store: BlockStore<Vertex> = BlockStore::new(4).unwrap();
        store.grow(6, false);
        let values: AllocVec<f64> = (0..6).map(|i| i as f64).collect();
        store.scatter_in("y", &values, None).unwrap();

        let flat = store.flatten::<f64>("y", None).unwrap();
        assert_eq!(flat, values);
        store.scatter_in("y", &flat, None).unwrap();
        assert_eq!(store.flatten::<f64>("y", None).unwrap(), values);
    }

    #[test]
    fn flatten_respects_handles() {
        let mut store: BlockStore<Vertex> = BlockStore::new(4).unwrap();
        store.grow(3, false);
        let second = store.grow(2, false);
        store.fill("y", 7.0, Some(&second)).unwrap();
        assert_eq!(store.flatten::<f64>("y", Some(&second)).unwrap(), vec![7.0, 7.0]);
        assert_eq!(store.flatten::<f64>("y", None).unwrap(), vec![1.5, 1.5, 1.5, 7.0, 7.0]);
    }

    #[test]
    fn unknown_field_and_wrong_type() {
        let mut store: BlockStore<Vertex> = BlockStore::new(4).unwrap();
        store.grow(1, false);
        assert!(matches!(
            store.flatten::<f64>("z", None),
            Err(Error::Argument(ArgumentError::UnknownField(_)))
        ));
        assert!(matches!(
            store.flatten::<u32>("y", None),
            Err(Error::Argument(ArgumentError::FieldType { .. }))
        ));
    }

    #[test]
    fn scatter_length_mismatch() {
        let mut store: BlockStore<Vertex> = BlockStore::new(4).unwrap();
        store.grow(3, false);
        let err = store.scatter_in("y", &[1.0, 2.0], None).unwrap_err();
        assert_eq!(err, Error::Argument(ArgumentError::LengthMismatch { expected: 3, found: 2 }));
    }

    #[test]
    fn out_of_range_handle() {
        let store: BlockStore<Vertex> = BlockStore::new(4).unwrap();
        let bogus: Handles = [BlockSpan { block: 9, len: 1 }].into_iter().collect();
        assert!(matches!(
            store.count_elements(Some(&bogus)),
            Err(Error::Argument(ArgumentError::BlockOutOfRange { index: 9, count: 1 }))
        ));
    }

    #[test]
    fn identity_values_are_unique_and_stable() {
        let mut store: BlockStore<Tagged> = BlockStore::new(3).unwrap();
        let first = store.grow(4, false);
        let ids = store.flatten::<RecordId>("id", Some(&first)).unwrap();
        assert_eq!(ids[3], RecordId { serial: 3, block: 2, slot: 0 });

        store.grow(2, true);
        store.fill("w", 3.0, None).unwrap();
        store.set_active(false, Some(&first)).unwrap();
        store.set_active(true, Some(&first)).unwrap();
        assert_eq!(store.flatten::<RecordId>("id", Some(&first)).unwrap(), ids);
        for id in ids {
            assert_eq!(store.locate(id), Some((id.block_index(), id.slot_index())));
        }
    }

    #[test]
    fn identity_column_is_not_writable() {
        let mut store: BlockStore<Tagged> = BlockStore::new(3).unwrap();
        store.grow(1, false);
        assert!(matches!(
            store.fill("id", RecordId::NONE, None),
            Err(Error::Unsupported { operation: "fill", .. })
        ));
    }

    #[test]
    fn remove_rejected_on_identity_store() {
        let mut store: BlockStore<Tagged> = BlockStore::new(3).unwrap();
        let handles = store.grow(2, false);
        assert!(matches!(store.remove(&handles), Err(Error::Unsupported { operation: "remove", .. })));
        assert_eq!(store.count_elements(None).unwrap(), 2);
    }

    #[test]
    fn remove_keeps_one_block() {
        let mut store: BlockStore<Vertex> = BlockStore::new(3).unwrap();
        let handles = store.grow(2, true);
        store.remove(&handles).unwrap();
        assert_eq!(store.num_blocks(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn stale_id_after_reuse() {
        let mut store: BlockStore<Tagged> = BlockStore::new(2).unwrap();
        let handles = store.grow(1, true);
        let id = store.flatten::<RecordId>("id", None).unwrap()[0];
        store.set_active(false, Some(&handles)).unwrap();
        assert_eq!(store.locate(id), None);
        store.grow(1, true);
        assert_eq!(store.locate(id), None);
    }

    #[test]
    fn set_keeps_identity() {
        let mut store: BlockStore<Tagged> = BlockStore::new(2).unwrap();
        store.grow(1, true);
        let before = store.get(0, 0).unwrap();
        store.set(0, 0, &Tagged { w: 4.0, id: RecordId::NONE }).unwrap();
        let after = store.get(0, 0).unwrap();
        assert_eq!(after.w, 4.0);
        assert_eq!(after.id, before.id);
    }

    #[test]
    fn iteration_is_restartable() {
        let mut store: BlockStore<Vertex> = BlockStore::new(2).unwrap();
        store.grow(5, false);
        let blocks = store.iter(None).unwrap();
        assert_eq!(blocks.count(), 3);
        assert_eq!(store.iter(None).unwrap().count(), 3);
    }
}
