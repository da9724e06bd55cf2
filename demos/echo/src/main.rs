use std::sync::Arc;

use wirecall_client::{TcpClient, UdpClient};
use wirecall_common::protocol::{PrimitiveKind, Value, ValueDescriptor};
use wirecall_server::{Operation, Registry, TcpServer, UdpServer};

fn build_registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry.register(
        "echo",
        Operation::new(
            vec![ValueDescriptor::Utf8String],
            Some(ValueDescriptor::Utf8String),
            |mut args| Ok(args.remove(0)),
        ),
    );
    registry.register(
        "sum",
        Operation::new(
            vec![ValueDescriptor::array(ValueDescriptor::Primitive(
                PrimitiveKind::I32,
            ))],
            Some(ValueDescriptor::Primitive(PrimitiveKind::I64)),
            |mut args| {
                let Value::Array(items) = args.remove(0) else {
                    return Err("expected an array".into());
                };
                let mut total = 0i64;
                for item in items {
                    let Value::I32(n) = item else {
                        return Err("expected i32 elements".into());
                    };
                    total += i64::from(n);
                }
                Ok(Value::I64(total))
            },
        ),
    );
    Arc::new(registry)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let registry = build_registry();

    let mut tcp_server = TcpServer::new(Arc::clone(&registry));
    tcp_server.start(0)?;
    let tcp_addr = tcp_server.local_addr().expect("server just started");

    let mut udp_server = UdpServer::new(registry);
    udp_server.start(0)?;
    let udp_port = udp_server.local_addr().expect("server just started").port();

    println!("Calling echo over TCP ({})...", tcp_addr);
    let client = TcpClient::connect(tcp_addr)?;
    let reply = client.invoke(
        Some(&ValueDescriptor::Utf8String),
        "echo",
        &[(ValueDescriptor::Utf8String, Value::from("hello wirecall"))],
    )?;
    println!("  reply: {:?}", reply);

    let reply = client.invoke(
        Some(&ValueDescriptor::Primitive(PrimitiveKind::I64)),
        "sum",
        &[(
            ValueDescriptor::array(ValueDescriptor::Primitive(PrimitiveKind::I32)),
            Value::Array(vec![Value::I32(1), Value::I32(2), Value::I32(3)]),
        )],
    )?;
    println!("  sum([1,2,3]): {:?}", reply);
    client.disconnect();

    println!("Calling echo over UDP (port {})...", udp_port);
    let client = UdpClient::connect(("127.0.0.1", udp_port), 0)?;
    let reply = client.invoke(
        Some(&ValueDescriptor::Utf8String),
        "echo",
        &[(ValueDescriptor::Utf8String, Value::from("hello datagrams"))],
    )?;
    println!("  reply: {:?}", reply);

    tcp_server.stop();
    udp_server.stop();
    Ok(())
}
