use magpack::{
    described, marshal, marshal_primitive, scan, unmarshal_primitive, CompressionId, Header,
    NamespaceId, Registry, SchemaId,
};
use serde::{Deserialize, Serialize};
use std::error::Error;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Greeting {
    #[serde(skip)]
    header: Header,
    to: String,
    text: String,
}

described!(Greeting {
    namespace: NamespaceId(64),
    schema: SchemaId::versioned(1, 1),
    text: r#"{"type":"record","name":"Greeting","fields":[
        {"name":"to","type":"string"},{"name":"text","type":"string"}]}"#,
});

#[derive(Debug, Default, Serialize, Deserialize)]
struct Farewell {
    #[serde(skip)]
    header: Header,
    to: String,
}

described!(Farewell {
    namespace: NamespaceId(64),
    schema: SchemaId::versioned(2, 1),
    text: r#"{"type":"record","name":"Farewell","fields":[{"name":"to","type":"string"}]}"#,
});

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut registry = Registry::new();
    registry.register::<Greeting>().register::<Farewell>();

    let mut hello = Greeting {
        to: "world".into(),
        text: "hello, hello, hello".into(),
        ..Default::default()
    };
    let mut bye = Farewell {
        to: "world".into(),
        ..Default::default()
    };

    let mut stream = marshal(&mut hello, CompressionId::SNAPPY, None)?;
    let split = stream.len();
    stream.extend(marshal(&mut bye, CompressionId::NONE, None)?);
    println!("Encoded two messages into {} bytes", stream.len());

    for (offset, header) in scan(&stream) {
        println!("  header at {}: {:?}", offset, header);
    }

    for part in [&stream[..split], &stream[split..]] {
        let Some(message) = registry.resolve(part)? else {
            continue;
        };
        if let Some(greeting) = message.downcast_ref::<Greeting>() {
            println!("Greeting for {}: {}", greeting.to, greeting.text);
        } else if let Some(farewell) = message.downcast_ref::<Farewell>() {
            println!("Farewell to {}", farewell.to);
        }
    }

    let bare = marshal_primitive("foo", CompressionId::GZIP)?;
    println!("Bare string round trip: {:?}", unmarshal_primitive(&bare)?);

    println!("Registered schemas: {}", registry.joined_schemas()?);
    Ok(())
}
