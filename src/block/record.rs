//! `block_record!`: declare a record type together with its block layout.

/// Declares a record struct, its template defaults and its columnar block type.
///
/// ```
/// use blockphys::block_record;
/// use blockphys::block::{BlockStore, RecordId};
///
/// block_record! {
///     /// A particle with a durable identity.
///     pub struct Particle in ParticleColumns {
///         pub mass: f64 = 1.0,
///         pub id: RecordId = RecordId::NONE,
///     }
/// }
///
/// let mut store: BlockStore<Particle> = BlockStore::new(8).unwrap();
/// let handles = store.grow(10, false);
/// assert_eq!(handles.len(), 10);
/// assert_eq!(store.flatten::<f64>("mass", None).unwrap(), vec![1.0; 10]);
/// ```
///
/// A field of type `RecordId` marks the schema as identity-bearing.
#[macro_export]
macro_rules! block_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $columns:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty = $default:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )+
        }

        impl Default for $name {
            fn default() -> Self {
                $name { $($field: $default,)+ }
            }
        }

        #[doc = concat!("Columnar storage for one block of [`", stringify!($name), "`] records.")]
        #[derive(Clone, Debug)]
        $vis struct $columns {
            $(pub $field: $crate::__private::Box<[$ty]>,)+
        }

        impl $crate::block::Record for $name {
            type Columns = $columns;

            fn fields() -> $crate::__private::Vec<$crate::block::FieldDesc> {
                $crate::__private::vec![
                    $($crate::block::FieldDesc::of::<$ty>(stringify!($field)),)+
                ]
            }

            fn template() -> Self {
                <$name as Default>::default()
            }
        }

        impl $crate::block::Columns for $columns {
            type Record = $name;

            fn allocate(capacity: usize, template: &$name) -> Self {
                $columns {
                    $($field: $crate::__private::vec![template.$field.clone(); capacity].into_boxed_slice(),)+
                }
            }

            fn read(&self, slot: usize) -> $name {
                $name { $($field: self.$field[slot].clone(),)+ }
            }

            fn write(&mut self, slot: usize, record: &$name) {
                $(self.$field[slot] = record.$field.clone();)+
            }

            #[allow(unused_assignments)]
            fn column(&self, field: usize) -> Option<&dyn $crate::__private::Any> {
                let mut index = 0usize;
                $(
                    if index == field {
                        return Some(&self.$field as &dyn $crate::__private::Any);
                    }
                    index += 1;
                )+
                None
            }

            #[allow(unused_assignments)]
            fn column_mut(&mut self, field: usize) -> Option<&mut dyn $crate::__private::Any> {
                let mut index = 0usize;
                $(
                    if index == field {
                        return Some(&mut self.$field as &mut dyn $crate::__private::Any);
                    }
                    index += 1;
                )+
                None
            }
        }
    };
}
