//! End-to-end message round trips: primitives, nested structs, shared
//! references, truncation behavior.

use std::collections::HashMap;
use std::rc::Rc;

use xwire::buffer::Buffer;
use xwire::config::Config;
use xwire::decoder::ReadContext;
use xwire::encoder::WriteContext;
use xwire::error::Error;
use xwire::resolver::{TypeRegistration, TypeResolver, TypeResolverBuilder};
use xwire::serializer::{skip_field_value, Serializer};
use xwire::type_info::{is_compatible_category, type_ids};
use xwire::type_meta::{FieldDef, FieldType};
use xwire::Result;

// ============================================================================
// Test model: inner point, outer record, shared pair
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

impl Serializer for Point {
    fn needs_type_info() -> bool {
        true
    }

    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_struct_type_info::<Self>()
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_struct_type_info::<Self>().map(|_| ())
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        self.x.write_data(ctx)?;
        self.y.write_data(ctx)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let info = ctx
            .current_type_info()
            .ok_or_else(|| Error::type_error("missing struct type info"))?;
        if is_compatible_category(info.type_id) {
            let meta = info
                .type_meta
                .as_ref()
                .ok_or_else(|| Error::type_error("missing struct schema"))?;
            let mut result = Self::default();
            for field in &meta.fields {
                match field.local_index {
                    Some(0) => result.x = i32::read_data(ctx)?,
                    Some(1) => result.y = i32::read_data(ctx)?,
                    _ => skip_field_value(ctx, &field.field_type)?,
                }
            }
            Ok(result)
        } else {
            Ok(Self { x: i32::read_data(ctx)?, y: i32::read_data(ctx)? })
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Record {
    name: String,
    values: Vec<i32>,
    metrics: HashMap<String, i64>,
    point: Point,
    active: bool,
}

impl Serializer for Record {
    fn needs_type_info() -> bool {
        true
    }

    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_struct_type_info::<Self>()
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_struct_type_info::<Self>().map(|_| ())
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        self.name.write_data(ctx)?;
        self.values.write_data(ctx)?;
        self.metrics.write_data(ctx)?;
        self.point.write(ctx)?; // Struct-Feld: volle Form mit Type-Info
        self.active.write_data(ctx)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let info = ctx
            .current_type_info()
            .ok_or_else(|| Error::type_error("missing struct type info"))?;
        let meta = info
            .type_meta
            .as_ref()
            .ok_or_else(|| Error::type_error("missing struct schema"))?;
        let mut result = Self::default();
        for field in &meta.fields {
            match field.local_index {
                Some(0) => result.name = String::read_data(ctx)?,
                Some(1) => result.values = Vec::<i32>::read_data(ctx)?,
                Some(2) => result.metrics = HashMap::<String, i64>::read_data(ctx)?,
                Some(3) => result.point = Point::read(ctx)?,
                Some(4) => result.active = bool::read_data(ctx)?,
                _ => skip_field_value(ctx, &field.field_type)?,
            }
        }
        Ok(result)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct SharedPair {
    first: Rc<i64>,
    second: Rc<i64>,
}

impl Serializer for SharedPair {
    fn needs_type_info() -> bool {
        true
    }

    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_struct_type_info::<Self>()
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_struct_type_info::<Self>().map(|_| ())
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        self.first.write(ctx)?;
        self.second.write(ctx)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(Self { first: Rc::<i64>::read(ctx)?, second: Rc::<i64>::read(ctx)? })
    }
}

fn point_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("x", FieldType::scalar(type_ids::VARINT32)),
        FieldDef::new("y", FieldType::scalar(type_ids::VARINT32)),
    ]
}

fn record_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("name", FieldType::scalar(type_ids::STRING)),
        FieldDef::new("values", FieldType::list_of(FieldType::scalar(type_ids::VARINT32))),
        FieldDef::new(
            "metrics",
            FieldType::map_of(
                FieldType::scalar(type_ids::STRING),
                FieldType::scalar(type_ids::VARINT64),
            ),
        ),
        FieldDef::new("point", FieldType::scalar(type_ids::COMPATIBLE_STRUCT)),
        FieldDef::new("active", FieldType::scalar(type_ids::BOOL)),
    ]
}

fn shared_pair_fields() -> Vec<FieldDef> {
    let mut first = FieldDef::new("first", FieldType::scalar(type_ids::VARINT64));
    first.tracking = true;
    let mut second = FieldDef::new("second", FieldType::scalar(type_ids::VARINT64));
    second.tracking = true;
    vec![first, second]
}

fn resolver() -> Rc<TypeResolver> {
    TypeResolverBuilder::new()
        .register::<Point>(TypeRegistration::compatible_struct(1, point_fields()))
        .register::<Record>(TypeRegistration::compatible_struct(2, record_fields()))
        .register::<SharedPair>(TypeRegistration::compatible_struct(3, shared_pair_fields()))
        .build()
        .unwrap()
}

fn sample_record() -> Record {
    let mut metrics = HashMap::new();
    metrics.insert("count".to_string(), 5i64);
    metrics.insert("sum".to_string(), 25i64);
    metrics.insert("max".to_string(), 9i64);
    Record {
        name: "payload-name".to_string(),
        values: vec![1, 3, 5, 7, 9],
        metrics,
        point: Point { x: 42, y: -7 },
        active: true,
    }
}

// --- Primitive round trip with exact framing ---

#[test]
fn int64_round_trip_with_exact_prefix() {
    let resolver = resolver();
    let mut w = WriteContext::new(resolver.clone(), Config::new());
    let bytes = w.serialize(&-9_876_543_212_345i64).unwrap();

    assert_eq!(bytes[0], 0x02, "xlang flag byte");
    assert_eq!(bytes[1], type_ids::VARINT64 as u8);
    let mut expected = Buffer::new();
    expected.write_var_int64(-9_876_543_212_345);
    assert_eq!(&bytes[2..], expected.into_vec().as_slice());

    let mut r = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
    assert_eq!(r.deserialize::<i64>().unwrap(), -9_876_543_212_345);
}

// --- UTF-8 string round trip ---

#[test]
fn utf8_string_round_trip() {
    let resolver = resolver();
    let value = "stream-hello-世界".to_string();
    let mut w = WriteContext::new(resolver.clone(), Config::new());
    let bytes = w.serialize(&value).unwrap();

    // Nach Flag und STRING-Tag: Header (byte_len << 2) | 2, dann UTF-8.
    let byte_len = value.len() as u64;
    assert_eq!(bytes[1], type_ids::STRING as u8);
    assert_eq!(u64::from(bytes[2]), (byte_len << 2) | 2);
    assert_eq!(&bytes[3..], value.as_bytes());

    let mut r = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
    assert_eq!(r.deserialize::<String>().unwrap(), value);
}

// --- Nested struct with list, map, inner struct ---

#[test]
fn nested_struct_round_trip() {
    let resolver = resolver();
    let record = sample_record();
    let mut w = WriteContext::new(resolver.clone(), Config::new());
    let bytes = w.serialize(&record).unwrap();

    // Beide Type-Defs erscheinen genau einmal im Stream.
    let outer_def = resolver.get_by_rust_type::<Record>().unwrap().type_def.clone();
    let inner_def = resolver.get_by_rust_type::<Point>().unwrap().type_def.clone();
    assert_eq!(count_occurrences(&bytes, &outer_def), 1, "outer type def emitted once");
    assert_eq!(count_occurrences(&bytes, &inner_def), 1, "inner type def emitted once");

    let mut r = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
    assert_eq!(r.deserialize::<Record>().unwrap(), record);
}

#[test]
fn repeated_nested_structs_use_back_refs() {
    let resolver = resolver();
    let records = vec![sample_record(), sample_record()];
    let mut w = WriteContext::new(resolver.clone(), Config::new());
    let bytes = w.serialize(&records).unwrap();

    let outer_def = resolver.get_by_rust_type::<Record>().unwrap().type_def.clone();
    let inner_def = resolver.get_by_rust_type::<Point>().unwrap().type_def.clone();
    assert_eq!(count_occurrences(&bytes, &outer_def), 1);
    assert_eq!(count_occurrences(&bytes, &inner_def), 1);

    let mut r = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
    assert_eq!(r.deserialize::<Vec<Record>>().unwrap(), records);
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() || haystack.len() < needle.len() {
        return 0;
    }
    (0..=haystack.len() - needle.len())
        .filter(|&i| &haystack[i..i + needle.len()] == needle)
        .count()
}

// --- Shared reference (identity preservation) ---

#[test]
fn shared_reference_round_trip() {
    let resolver = resolver();
    let cell = Rc::new(2026i64);
    let pair = SharedPair { first: cell.clone(), second: cell };

    let mut w = WriteContext::new(resolver.clone(), Config::new());
    let bytes = w.serialize(&pair).unwrap();

    let mut r = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
    let decoded = r.deserialize::<SharedPair>().unwrap();
    assert_eq!(*decoded.first, 2026);
    assert_eq!(*decoded.second, 2026);
    assert!(Rc::ptr_eq(&decoded.first, &decoded.second), "identity must be preserved");
}

#[test]
fn shared_reference_wire_flags() {
    let resolver = resolver();
    let cell = Rc::new(2026i64);
    let pair = SharedPair { first: cell.clone(), second: cell };

    let mut w = WriteContext::new(resolver.clone(), Config::new());
    let bytes = w.serialize(&pair).unwrap();

    // `second` endet den Stream als Ref-Flag (-2) + varuint Ref-Id 0.
    assert_eq!(&bytes[bytes.len() - 2..], &[0xFE, 0x00]);

    // `first` trägt das RefValue-Flag (0) unmittelbar vor seinem Tag+Body:
    // ... [0x00, VARINT64-Tag, zigzag(2026)...].
    let mut body = Buffer::new();
    body.write_var_int64(2026);
    let body = body.into_vec();
    let mut first_pattern = vec![0x00, type_ids::VARINT64 as u8];
    first_pattern.extend_from_slice(&body);
    assert_eq!(count_occurrences(&bytes, &first_pattern), 1);
}

#[test]
fn distinct_cells_are_not_shared_after_round_trip() {
    let resolver = resolver();
    let pair = SharedPair { first: Rc::new(2026i64), second: Rc::new(2026i64) };

    let mut w = WriteContext::new(resolver.clone(), Config::new());
    let bytes = w.serialize(&pair).unwrap();
    let mut r = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
    let decoded = r.deserialize::<SharedPair>().unwrap();
    assert_eq!(*decoded.first, 2026);
    assert_eq!(*decoded.second, 2026);
    assert!(!Rc::ptr_eq(&decoded.first, &decoded.second));
}

// --- Truncation (every prefix fails cleanly) ---

#[test]
fn truncated_struct_is_buffer_out_of_bound() {
    let resolver = resolver();
    let mut w = WriteContext::new(resolver.clone(), Config::new());
    let mut bytes = w.serialize(&sample_record()).unwrap();
    bytes.pop();

    let mut r = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
    let err = r.deserialize::<Record>().unwrap_err();
    assert!(err.is_out_of_bound(), "{err}");

    r.reset();
    assert!(r.error().is_none());
}

#[test]
fn every_truncation_point_fails_without_panic() {
    let resolver = resolver();
    let mut w = WriteContext::new(resolver.clone(), Config::new());
    let bytes = w.serialize(&sample_record()).unwrap();

    for cut in 0..bytes.len() {
        let mut r = ReadContext::new(
            resolver.clone(),
            Config::new(),
            Buffer::from_vec(bytes[..cut].to_vec()),
        );
        assert!(
            r.deserialize::<Record>().is_err(),
            "truncation at {cut}/{} must fail",
            bytes.len()
        );
    }
}

// --- Option fields inside messages ---

#[test]
fn option_values_round_trip() {
    let resolver = resolver();
    let mut w = WriteContext::new(resolver.clone(), Config::new());

    let values = vec![Some(1i32), None, Some(-3)];
    let bytes = w.serialize(&values).unwrap();
    let mut r = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
    assert_eq!(r.deserialize::<Vec<Option<i32>>>().unwrap(), values);
}

// --- Empty containers and empty strings ---

#[test]
fn empty_values_round_trip() {
    let resolver = resolver();
    let mut w = WriteContext::new(resolver.clone(), Config::new());

    let bytes = w.serialize(&String::new()).unwrap();
    let mut r = ReadContext::new(resolver.clone(), Config::new(), Buffer::from_vec(bytes));
    assert_eq!(r.deserialize::<String>().unwrap(), "");

    let bytes = w.serialize(&Vec::<i64>::new()).unwrap();
    let mut r = ReadContext::new(resolver.clone(), Config::new(), Buffer::from_vec(bytes));
    assert_eq!(r.deserialize::<Vec<i64>>().unwrap(), Vec::<i64>::new());

    let record = Record::default();
    let bytes = w.serialize(&record).unwrap();
    let mut r = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
    assert_eq!(r.deserialize::<Record>().unwrap(), record);
}
