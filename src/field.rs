//! Packed and external field declarations used to build a [crate::schema::Schema].

use serde_json::Value;

pub(crate) type ReadFn<T> = Box<dyn Fn(&mut T, u64) + Send + Sync>;
pub(crate) type WriteFn<T> = Box<dyn Fn(&T) -> i64 + Send + Sync>;
pub(crate) type GetFn<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
pub(crate) type SetFn<T> = Box<dyn Fn(&mut T, &Value) + Send + Sync>;

/// A field serialized into the bit buffer through a reader/writer codec.
///
/// Registration order on the builder fixes the wire order. The writer
/// extracts the raw unsigned wire value from an instance (as `i64`, so
/// out-of-range inputs stay observable at pack time); the reader applies a
/// raw wire value back onto an instance.
pub struct PackedField<T> {
    /// Name used in error messages. Must be unique within a schema.
    pub name: String,
    /// Exact number of bits this field occupies on the wire.
    pub width_bits: usize,
    pub(crate) read: ReadFn<T>,
    pub(crate) write: WriteFn<T>,
}

impl<T> PackedField<T> {
    /// Caller-supplied codec over an explicit bit width.
    ///
    /// Readers may consult fields populated earlier in wire order as well as
    /// external props, e.g. to resolve an index against a collection held on
    /// the instance, with raw `0` reserved as an absent sentinel.
    pub fn custom(
        name: &str,
        width_bits: usize,
        read: impl Fn(&mut T, u64) + Send + Sync + 'static,
        write: impl Fn(&T) -> i64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            width_bits,
            read: Box::new(read),
            write: Box::new(write),
        }
    }

    /// Single-bit boolean codec: raw `1` reads as `true`.
    pub fn flag(
        name: &str,
        get: impl Fn(&T) -> bool + Send + Sync + 'static,
        set: impl Fn(&mut T, bool) + Send + Sync + 'static,
    ) -> Self {
        Self::custom(
            name,
            1,
            move |instance, raw| set(instance, raw == 1),
            move |instance| i64::from(get(instance)),
        )
    }

    /// Identity codec sized for values in `0..=max_value`.
    pub fn integer(
        name: &str,
        max_value: u64,
        get: impl Fn(&T) -> i64 + Send + Sync + 'static,
        set: impl Fn(&mut T, u64) + Send + Sync + 'static,
    ) -> Self {
        Self::custom(
            name,
            bits_for_max(max_value),
            move |instance, raw| set(instance, raw),
            move |instance| get(instance),
        )
    }
}

/// A field carried out-of-band next to the packed text.
///
/// External values never enter the bit buffer but still feed the hashed
/// canonical dump, so unpacking against different external state is
/// detected.
pub struct ExternalField<T> {
    /// Key used in the external map.
    pub name: String,
    pub(crate) get: GetFn<T>,
    pub(crate) set: SetFn<T>,
}

impl<T> ExternalField<T> {
    pub fn new(
        name: &str,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
        set: impl Fn(&mut T, &Value) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            get: Box::new(get),
            set: Box::new(set),
        }
    }
}

/// Smallest width that can hold every value in `0..=max_value`.
pub(crate) fn bits_for_max(max_value: u64) -> usize {
    (64 - max_value.leading_zeros()) as usize
}
