//! Schema: ordered field registrations compiled into a pack/unpack engine.

use std::collections::BTreeSet;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use md5::{Digest, Md5};
use serde_json::Value;

use crate::{
    bits::{BitReader, BitWriter},
    errors::{PackError, ReadError, SchemaError},
    field::{ExternalField, PackedField},
    layout::Layout,
    packed::{ExternalMap, Packed},
};

type DumpFn<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;

/// Builder for a [Schema]. Registration order fixes the wire order and must
/// be identical on the packing and unpacking side for a given type.
pub struct SchemaBuilder<T> {
    packed: Vec<PackedField<T>>,
    external: Vec<ExternalField<T>>,
    dump: DumpFn<T>,
}

impl<T> SchemaBuilder<T> {
    fn new() -> Self {
        Self {
            packed: Vec::new(),
            external: Vec::new(),
            // constant hash input; the accepted degenerate case when no dump
            // function is registered
            dump: Box::new(|_| Value::Object(Default::default())),
        }
    }

    /// Appends a single-bit boolean field.
    pub fn flag(
        self,
        name: &str,
        get: impl Fn(&T) -> bool + Send + Sync + 'static,
        set: impl Fn(&mut T, bool) + Send + Sync + 'static,
    ) -> Self {
        self.packed_field(PackedField::flag(name, get, set))
    }

    /// Appends an identity-coded integer field sized for `0..=max_value`.
    pub fn integer(
        self,
        name: &str,
        max_value: u64,
        get: impl Fn(&T) -> i64 + Send + Sync + 'static,
        set: impl Fn(&mut T, u64) + Send + Sync + 'static,
    ) -> Self {
        self.packed_field(PackedField::integer(name, max_value, get, set))
    }

    /// Appends a field with a caller-supplied codec and explicit bit width.
    pub fn custom(
        self,
        name: &str,
        width_bits: usize,
        read: impl Fn(&mut T, u64) + Send + Sync + 'static,
        write: impl Fn(&T) -> i64 + Send + Sync + 'static,
    ) -> Self {
        self.packed_field(PackedField::custom(name, width_bits, read, write))
    }

    /// Appends a caller-built packed field.
    pub fn packed_field(mut self, field: PackedField<T>) -> Self {
        self.packed.push(field);
        self
    }

    /// Registers an out-of-band field, carried next to the packed text and
    /// included in the hashed dump.
    pub fn external(
        mut self,
        name: &str,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
        set: impl Fn(&mut T, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.external.push(ExternalField::new(name, get, set));
        self
    }

    /// Sets the canonical-view function whose serialized form feeds the hash
    /// fragment.
    pub fn dump_with(mut self, dump: impl Fn(&T) -> Value + Send + Sync + 'static) -> Self {
        self.dump = Box::new(dump);
        self
    }

    /// Validates the registrations and computes the buffer layout.
    pub fn build(self) -> Result<Schema<T>, SchemaError> {
        let mut names = BTreeSet::new();
        let packed_names = self.packed.iter().map(|f| f.name.as_str());
        let external_names = self.external.iter().map(|f| f.name.as_str());

        for name in packed_names.chain(external_names) {
            if name.trim().is_empty() || !names.insert(name) {
                return Err(SchemaError::InvalidFieldName(name.to_string()));
            }
        }

        for field in &self.packed {
            if field.width_bits == 0 || field.width_bits > 64 {
                return Err(SchemaError::InvalidFieldWidth {
                    field: field.name.clone(),
                    width: field.width_bits,
                });
            }
        }

        let data_bits = self.packed.iter().map(|f| f.width_bits).sum();

        Ok(Schema {
            layout: Layout::for_data_bits(data_bits),
            packed: self.packed,
            external: self.external,
            dump: self.dump,
        })
    }
}

/// A compiled schema for one instance type: ordered packed fields, external
/// fields, the dump function, and the derived [Layout].
///
/// Build one per type before the first instance is packed, typically in a
/// `LazyLock` static (every registration closure is `Send + Sync`), and
/// treat it as read-only afterward.
pub struct Schema<T> {
    packed: Vec<PackedField<T>>,
    external: Vec<ExternalField<T>>,
    dump: DumpFn<T>,
    layout: Layout,
}

impl<T> Schema<T> {
    pub fn builder() -> SchemaBuilder<T> {
        SchemaBuilder::new()
    }

    /// The derived buffer/hash sizing for this schema.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Packs `instance` into padding-free base64 text plus the external map.
    ///
    /// Pure function of the instance state: packing an unmutated instance
    /// twice yields identical results.
    pub fn pack(&self, instance: &T) -> Result<Packed, PackError> {
        let mut writer = BitWriter::new(self.layout.buffer_bytes);

        for field in &self.packed {
            let raw = (field.write)(instance);
            if raw < 0 {
                return Err(PackError::Negative {
                    field: field.name.clone(),
                });
            }

            let limit = 1u128 << field.width_bits;
            if (raw as u128) >= limit {
                return Err(PackError::TooLarge {
                    field: field.name.clone(),
                    value: raw,
                    limit,
                });
            }

            writer.write_bits(raw as u64, field.width_bits)?;
        }

        let external: ExternalMap = self
            .external
            .iter()
            .map(|field| (field.name.clone(), (field.get)(instance)))
            .collect();

        let fragment = self.hash_fragment(instance)?;
        writer.write_bits(fragment, self.layout.hash_bits)?;

        Ok(Packed {
            text: STANDARD_NO_PAD.encode(writer.into_bytes()),
            external,
        })
    }

    /// Reconstructs an instance from packed text and external props, using
    /// `init` to create the blank instance.
    ///
    /// `None` signals a structurally incompatible payload: undecodable text,
    /// a decoded length that does not match this schema's layout, leftover
    /// bits, or a hash fragment the repopulated instance does not reproduce
    /// (stale or foreign external state). Absent or empty text yields a
    /// fresh instance with only the external props applied and no hash
    /// check.
    pub fn unpack_with<F>(&self, text: Option<&str>, external: &ExternalMap, init: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        let mut instance = init();

        for field in &self.external {
            if let Some(value) = external.get(&field.name) {
                (field.set)(&mut instance, value);
            }
        }

        let Some(text) = text.filter(|text| !text.is_empty()) else {
            return Some(instance);
        };

        let buffer = match STANDARD_NO_PAD.decode(text) {
            Ok(buffer) => buffer,
            Err(err) => {
                tracing::debug!(%err, "packed text is not valid base64");
                return None;
            }
        };

        if buffer.len() != self.layout.buffer_bytes {
            tracing::debug!(
                got = buffer.len(),
                expected = self.layout.buffer_bytes,
                "unexpected buffer length"
            );
            return None;
        }

        let mut reader = BitReader::new(&buffer);
        for field in &self.packed {
            let raw = reader.read_bits(field.width_bits).ok()?;
            (field.read)(&mut instance, raw);
        }

        if reader.bits_left() != self.layout.hash_bits {
            tracing::debug!(
                got = reader.bits_left(),
                expected = self.layout.hash_bits,
                "unexpected trailing bit count"
            );
            return None;
        }

        let fragment = reader.read_bits(self.layout.hash_bits).ok()?;
        let expected = self.hash_fragment(&instance).ok()?;
        if fragment != expected {
            tracing::debug!("hash fragment mismatch");
            return None;
        }

        Some(instance)
    }

    /// [Self::unpack_with] for types with a default constructor.
    pub fn unpack(&self, text: Option<&str>, external: &ExternalMap) -> Option<T>
    where
        T: Default,
    {
        self.unpack_with(text, external, T::default)
    }

    /// First `hash_bits` bits of the digest of the serialized canonical
    /// dump, read with the same bit convention as the main buffer.
    fn hash_fragment(&self, instance: &T) -> Result<u64, ReadError> {
        let json = (self.dump)(instance).to_string();
        let digest = Md5::digest(json.as_bytes());

        let mut reader = BitReader::new(digest.as_slice());
        reader.read_bits(self.layout.hash_bits)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Probe {
        on: bool,
        count: i64,
    }

    fn probe_schema() -> Schema<Probe> {
        Schema::builder()
            .flag("on", |p: &Probe| p.on, |p, v| p.on = v)
            .integer("count", 1000, |p: &Probe| p.count, |p, v| p.count = v as i64)
            .dump_with(|p| json!({ "on": p.on, "count": p.count }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_layout_from_field_widths() {
        // 1 + 10 data bits
        let schema = probe_schema();
        assert_eq!(
            schema.layout(),
            Layout {
                buffer_bytes: 3,
                hash_bits: 13
            }
        );
    }

    #[test]
    fn test_round_trip() {
        let schema = probe_schema();
        let probe = Probe { on: true, count: 42 };

        let packed = schema.pack(&probe).unwrap();
        assert_eq!(packed.text.len(), 4);
        assert!(packed.external.is_empty());

        let unpacked = schema.unpack(Some(&packed.text), &packed.external).unwrap();
        assert_eq!(unpacked, probe);
    }

    #[test]
    fn test_round_trip_boundary_values() {
        let schema = probe_schema();

        for count in [0, 1000, 1023] {
            let probe = Probe { on: false, count };
            let packed = schema.pack(&probe).unwrap();
            let unpacked = schema.unpack(Some(&packed.text), &packed.external).unwrap();
            assert_eq!(unpacked, probe);
        }
    }

    #[test]
    fn test_negative_value_fails() {
        let schema = probe_schema();
        let probe = Probe { on: false, count: -10 };

        let err = schema.pack(&probe).unwrap_err();
        assert_eq!(
            err,
            PackError::Negative {
                field: "count".to_string()
            }
        );
        assert_eq!(err.to_string(), "count's value should be unsigned");
    }

    #[test]
    fn test_too_large_value_fails() {
        let schema = probe_schema();
        let probe = Probe { on: false, count: 2048 };

        let err = schema.pack(&probe).unwrap_err();
        assert_eq!(
            err,
            PackError::TooLarge {
                field: "count".to_string(),
                value: 2048,
                limit: 1024
            }
        );
        assert_eq!(
            err.to_string(),
            "2048 is too big for count. It should be less than 1024"
        );

        // the first value past the bit-level capacity fails too
        let probe = Probe { on: false, count: 1024 };
        assert!(matches!(
            schema.pack(&probe),
            Err(PackError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_wrong_length_text_rejected() {
        let schema = probe_schema();
        // 8 characters decode to 6 bytes, twice this schema's buffer
        assert_eq!(schema.unpack(Some("AAAAAAAA"), &ExternalMap::new()), None);
    }

    #[test]
    fn test_undecodable_text_rejected() {
        let schema = probe_schema();
        assert_eq!(schema.unpack(Some("not base64!"), &ExternalMap::new()), None);
    }

    #[test]
    fn test_tampered_hash_rejected() {
        let schema = probe_schema();
        let packed = schema.pack(&Probe { on: true, count: 42 }).unwrap();

        // the last character covers hash bits only (data ends at bit 11)
        let mut chars: Vec<char> = packed.text.chars().collect();
        chars[3] = if chars[3] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        assert_eq!(schema.unpack(Some(&tampered), &packed.external), None);
    }

    #[test]
    fn test_absent_text_skips_hash_check() {
        let schema = probe_schema();
        assert_eq!(
            schema.unpack(None, &ExternalMap::new()),
            Some(Probe::default())
        );
        assert_eq!(
            schema.unpack(Some(""), &ExternalMap::new()),
            Some(Probe::default())
        );
    }

    #[test]
    fn test_default_dump_is_constant() {
        // no dump function: the hash carries no integrity signal, but the
        // packed fields still round-trip
        let schema = Schema::builder()
            .flag("on", |p: &Probe| p.on, |p, v| p.on = v)
            .build()
            .unwrap();

        let packed = schema.pack(&Probe { on: true, count: 0 }).unwrap();
        let unpacked = schema.unpack(Some(&packed.text), &packed.external).unwrap();
        assert!(unpacked.on);
    }

    #[test]
    fn test_externals_only_schema() {
        #[derive(Debug, Default, PartialEq)]
        struct Tag {
            name: String,
        }

        let schema = Schema::<Tag>::builder()
            .external(
                "name",
                |t: &Tag| json!(t.name),
                |t, v| t.name = v.as_str().unwrap_or_default().to_string(),
            )
            .dump_with(|t| json!({ "name": t.name }))
            .build()
            .unwrap();

        // no packed fields: the buffer is hash only
        assert_eq!(
            schema.layout(),
            Layout {
                buffer_bytes: 3,
                hash_bits: 24
            }
        );

        let tag = Tag {
            name: "outpost".to_string(),
        };
        let packed = schema.pack(&tag).unwrap();
        assert_eq!(packed.external, ExternalMap::from([("name".to_string(), json!("outpost"))]));
        assert_eq!(schema.unpack(Some(&packed.text), &packed.external), Some(tag));

        // same text against different external state fails the hash check
        let doctored = ExternalMap::from([("name".to_string(), json!("elsewhere"))]);
        assert_eq!(schema.unpack(Some(&packed.text), &doctored), None);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = Schema::builder()
            .flag("on", |p: &Probe| p.on, |p, v| p.on = v)
            .flag("on", |p: &Probe| p.on, |p, v| p.on = v)
            .build();

        assert!(matches!(result, Err(SchemaError::InvalidFieldName(name)) if name == "on"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = Schema::builder()
            .flag("", |p: &Probe| p.on, |p, v| p.on = v)
            .build();

        assert!(matches!(result, Err(SchemaError::InvalidFieldName(_))));
    }

    #[test]
    fn test_zero_width_rejected() {
        // integer(0) derives a zero-bit field
        let result = Schema::builder()
            .integer("count", 0, |p: &Probe| p.count, |p, v| p.count = v as i64)
            .build();

        assert_eq!(
            result.err(),
            Some(SchemaError::InvalidFieldWidth {
                field: "count".to_string(),
                width: 0
            })
        );
    }

    #[test]
    fn test_oversized_width_rejected() {
        let result = Schema::builder()
            .custom("wide", 65, |_: &mut Probe, _| {}, |_| 0)
            .build();

        assert_eq!(
            result.err(),
            Some(SchemaError::InvalidFieldWidth {
                field: "wide".to_string(),
                width: 65
            })
        );
    }
}
