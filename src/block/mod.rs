//! Block-structured columnar storage (Array of Structures of Arrays).
//!
//! A record type declared with [`block_record!`](crate::block_record) is
//! stored in fixed-capacity blocks. Each block holds one contiguous array
//! per field, a count of valid rows and an activity flag:
//!
//! ```text
//! |------------------------------|
//! | x[block_size]      (Vec2)    |
//! | v[block_size]      (Vec2)    |
//! | id[block_size]     (RecordId)|
//! |------------------------------|
//! | num_elements       (usize)   |
//! | active             (bool)    |
//! |------------------------------|
//! ```
//!
//! A [`BlockStore`] is an ordered list of such blocks and always holds at
//! least one of them, so iteration never faces an empty collection.

mod record;
pub mod schema;
pub mod store;

pub use schema::{FieldDesc, FieldKind, FieldType, ScalarKind, Schema, RESERVED_FIELDS};
pub use store::{AnyStore, BlockSpan, Blocks, BlockStore, Handles, DEFAULT_BLOCK_SIZE};

use alloc::vec::Vec as AllocVec;
use core::any::Any;

/// Durable identity of a record in an identity-bearing store.
///
/// `serial` is unique for the lifetime of the store; `block` and `slot`
/// locate the record, which is never relocated once assigned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub serial: u32,
    pub block: u32,
    pub slot: u32,
}

impl RecordId {
    /// Value of identity slots that hold no record.
    pub const NONE: RecordId = RecordId { serial: u32::MAX, block: u32::MAX, slot: u32::MAX };

    /// True for [`RecordId::NONE`].
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Block holding the record.
    pub fn block_index(&self) -> usize {
        self.block as usize
    }

    /// Slot of the record within its block.
    pub fn slot_index(&self) -> usize {
        self.slot as usize
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::NONE
    }
}

/// A logical record with a statically declared schema.
pub trait Record: Clone + Send + Sync + 'static {
    /// Columnar layout of one block of this record.
    type Columns: Columns<Record = Self>;

    /// The field descriptor list, in declaration order.
    fn fields() -> AllocVec<FieldDesc>;

    /// Template instance providing per-field defaults.
    fn template() -> Self;
}

/// One block's worth of columns for a record type.
pub trait Columns: Clone + core::fmt::Debug + Send + Sync + 'static {
    type Record: Clone;

    /// Allocate every column with `capacity` copies of the template's values.
    fn allocate(capacity: usize, template: &Self::Record) -> Self;

    /// Gather one row into a record.
    fn read(&self, slot: usize) -> Self::Record;

    /// Scatter a record into one row.
    fn write(&mut self, slot: usize, record: &Self::Record);

    /// Column by field index, as `&Box<[T]>` behind `Any`.
    fn column(&self, field: usize) -> Option<&dyn Any>;

    /// Mutable column by field index, as `&mut Box<[T]>` behind `Any`.
    fn column_mut(&mut self, field: usize) -> Option<&mut dyn Any>;
}

/// A fixed-capacity columnar chunk of records.
#[derive(Clone, Debug)]
pub struct Block<R: Record> {
    data: R::Columns,
    num_elements: usize,
    active: bool,
}

impl<R: Record> Block<R> {
    /// A fully allocated, inactive, empty block.
    pub(crate) fn allocate(capacity: usize, template: &R) -> Self {
        Block {
            data: R::Columns::allocate(capacity, template),
            num_elements: 0,
            active: false,
        }
    }

    /// Number of valid rows.
    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// True when the block holds no valid row.
    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    /// Whether the block takes part in iteration.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Column arrays, sized to the block capacity.
    pub fn data(&self) -> &R::Columns {
        &self.data
    }

    /// Mutable column arrays.
    pub fn data_mut(&mut self) -> &mut R::Columns {
        &mut self.data
    }

    /// Copy of a valid row.
    pub fn record(&self, slot: usize) -> Option<R> {
        (slot < self.num_elements).then(|| self.data.read(slot))
    }

    pub(crate) fn set_len(&mut self, num_elements: usize) {
        self.num_elements = num_elements;
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Kernel view of this block.
    pub(crate) fn view(&mut self, id: Option<BlockId>) -> BlockMut<'_, R> {
        BlockMut { len: self.num_elements, id, data: &mut self.data }
    }
}

/// Position of a block within a dispatch: which store of the list, which block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockId {
    pub store: usize,
    pub block: usize,
}

/// What a kernel function receives for each visited block: the block's
/// column arrays and the number of valid rows to process.
pub struct BlockMut<'a, R: Record> {
    pub data: &'a mut R::Columns,
    len: usize,
    id: Option<BlockId>,
}

impl<'a, R: Record> BlockMut<'a, R> {
    /// Valid rows in this block; always positive for dispatched blocks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when there is nothing to process.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Only available when the kernel was compiled with `expose_block_identity`.
    pub fn block_id(&self) -> Option<BlockId> {
        self.id
    }
}
