use std::collections::BTreeMap;

use magpack::{
    decode_header, described, is_header, marshal, marshal_primitive, resolve, scan, unmarshal,
    unmarshal_int, unmarshal_primitive, unmarshal_string, Candidate, CompressionId, Described,
    EncoderConfig, Error, Header, MessageEncoder, NamespaceId, Primitive, PrimitiveKind, Registry,
    SchemaId, Value, HEADER_LEN,
};
use serde::{Deserialize, Serialize};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const ORDERS: NamespaceId = NamespaceId(4242);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct OrderPlaced {
    #[serde(skip)]
    header: Header,
    order: u64,
    items: Vec<String>,
}

described!(OrderPlaced {
    namespace: ORDERS,
    schema: SchemaId::versioned(1, 1),
    text: r#"{"type":"record","name":"OrderPlaced","namespace":"orders","fields":[
        {"name":"order","type":"long"},
        {"name":"items","type":{"type":"array","items":"string"}}]}"#,
});

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct OrderShipped {
    #[serde(skip)]
    header: Header,
    order: u64,
    carrier: String,
}

described!(OrderShipped {
    namespace: ORDERS,
    schema: SchemaId::versioned(2, 1),
    text: r#"{"type":"record","name":"OrderShipped","namespace":"orders","fields":[
        {"name":"order","type":"long"},{"name":"carrier","type":"string"}]}"#,
});

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct OrderCancelled {
    #[serde(skip)]
    header: Header,
    order: u64,
    reason: Option<String>,
}

described!(OrderCancelled {
    namespace: ORDERS,
    schema: SchemaId::versioned(3, 1),
    text: r#"{"type":"record","name":"OrderCancelled","namespace":"orders","fields":[
        {"name":"order","type":"long"},{"name":"reason","type":["null","string"]}]}"#,
});

// Same shape and schema number as OrderShipped, but a newer version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct OrderShippedV2 {
    #[serde(skip)]
    header: Header,
    order: u64,
    carrier: String,
}

described!(OrderShippedV2 {
    namespace: ORDERS,
    schema: SchemaId::versioned(2, 2),
    text: r#"{"type":"record","name":"OrderShipped","namespace":"orders","fields":[
        {"name":"order","type":"long"},{"name":"carrier","type":"string"}]}"#,
});

fn shipped() -> OrderShipped {
    OrderShipped {
        order: 991,
        carrier: "rail".into(),
        ..Default::default()
    }
}

#[test]
fn union_resolves_second_of_three() {
    init_logging();
    let data = marshal(&mut shipped(), CompressionId::GZIP, None).unwrap();
    let found = resolve(
        &data,
        vec![
            Candidate::of::<OrderPlaced>(),
            Candidate::of::<OrderShipped>(),
            Candidate::of::<OrderCancelled>(),
        ],
    )
    .unwrap()
    .expect("data was not empty");
    let event = found.downcast::<OrderShipped>().unwrap();
    assert_eq!(event.order, 991);
    assert_eq!(event.carrier, "rail");
    assert_eq!(event.header.identity(), OrderShipped::identity());
}

#[test]
fn union_without_match() {
    init_logging();
    let data = marshal(&mut shipped(), CompressionId::NONE, None).unwrap();
    let err = resolve(
        &data,
        vec![
            Candidate::of::<OrderPlaced>(),
            Candidate::of::<OrderCancelled>(),
            Candidate::of::<OrderShippedV2>(),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, Error::SchemerNotFound(id) if id == OrderShipped::identity()));
}

#[test]
fn registry_dispatch() {
    init_logging();
    let mut registry = Registry::new();
    registry
        .register::<OrderPlaced>()
        .register::<OrderShipped>()
        .register::<OrderCancelled>();

    let mut cancelled = OrderCancelled {
        order: 5,
        reason: Some("changed mind".into()),
        ..Default::default()
    };
    let data = marshal(&mut cancelled, CompressionId::ZSTD, None).unwrap();
    let found = registry.resolve(&data).unwrap().unwrap();
    let back = found.downcast::<OrderCancelled>().unwrap();
    assert_eq!(back.reason.as_deref(), Some("changed mind"));

    let schemas: serde_json::Value = serde_json::from_str(&registry.joined_schemas().unwrap()).unwrap();
    assert_eq!(schemas.as_array().map(|a| a.len()), Some(3));
}

#[test]
fn version_mismatch_is_refused() {
    init_logging();
    let data = marshal(&mut shipped(), CompressionId::SNAPPY, None).unwrap();
    let mut newer = OrderShippedV2::default();
    match unmarshal(&data, &mut newer, None) {
        Err(Error::WrongSchema { expected, actual }) => {
            assert_eq!(expected, SchemaId::versioned(2, 2));
            assert_eq!(actual, SchemaId::versioned(2, 1));
        }
        res => panic!("expected a schema mismatch, got {:?}", res),
    }
    assert_eq!(newer, OrderShippedV2::default());
}

#[test]
fn foo() {
    init_logging();
    let data = marshal_primitive("foo", CompressionId::NONE).unwrap();
    assert!(is_header(&data[..HEADER_LEN]));
    let (ns, schema, comp) = decode_header(&data[..HEADER_LEN]).unwrap();
    assert_eq!(ns, NamespaceId::BUILTIN);
    assert_eq!(schema, SchemaId::versioned(1, 1));
    assert_eq!(comp, CompressionId::NONE);
    assert_eq!(
        unmarshal_primitive(&data).unwrap(),
        Some(Primitive::String("foo".into()))
    );
    assert_eq!(unmarshal_string(&data).unwrap(), "foo");
    assert!(matches!(
        unmarshal_int(&data),
        Err(Error::NotBasic(PrimitiveKind::Int))
    ));
}

#[test]
fn primitive_map_with_compression() {
    init_logging();
    let mut map = BTreeMap::new();
    map.insert("count".to_string(), Value::Int(3));
    map.insert("label".to_string(), Value::from("blue"));
    map.insert("payload".to_string(), Value::Bin(vec![9; 64]));
    let data = marshal_primitive(&map, CompressionId::DEFLATE).unwrap();
    assert_eq!(
        unmarshal_primitive(&data).unwrap(),
        Some(Primitive::Map(map))
    );
}

#[test]
fn primitive_into_described_type_fails() {
    init_logging();
    let data = marshal_primitive(12i64, CompressionId::NONE).unwrap();
    let mut placed = OrderPlaced::default();
    assert!(matches!(
        unmarshal(&data, &mut placed, None),
        Err(Error::WrongNamespace { .. })
    ));
}

#[test]
fn stream_of_envelopes() {
    init_logging();
    let encoder = MessageEncoder::new(EncoderConfig::from_json(r#"{"compression":"zstd"}"#).unwrap())
        .unwrap();
    let mut stream = Vec::new();
    let mut offsets = Vec::new();
    for order in 0..5u64 {
        let mut placed = OrderPlaced {
            order,
            items: vec![format!("item-{}", order)],
            ..Default::default()
        };
        offsets.push(stream.len());
        stream.extend_from_slice(&encoder.encode(&mut placed).unwrap());
    }

    let found: Vec<usize> = scan(&stream)
        .filter(|(_, header)| header.identity() == OrderPlaced::identity())
        .map(|(offset, _)| offset)
        .collect();
    for offset in offsets.iter() {
        assert!(found.contains(offset));
    }

    let mut ends = offsets[1..].to_vec();
    ends.push(stream.len());
    for (index, (start, end)) in offsets.iter().zip(ends).enumerate() {
        let mut placed = OrderPlaced::default();
        encoder.decode(&stream[*start..end], &mut placed).unwrap();
        assert_eq!(placed.order, index as u64);
        assert_eq!(placed.items, [format!("item-{}", index)]);
    }
}

#[test]
fn json_fallback_skips_header() {
    init_logging();
    let mut placed = OrderPlaced::default();
    unmarshal(br#"{"order": 17, "items": ["a", "b"]}"#, &mut placed, None).unwrap();
    assert_eq!(placed.order, 17);
    assert_eq!(placed.items, ["a", "b"]);
    assert!(placed.header.is_unset());
}
