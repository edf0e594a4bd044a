//! Attach handshake against a mock debuggee.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;

use serde_json::json;

use lualens::bridge::{DebugClient, DebugMessage, decode, encode};
use lualens::config::DebuggerConfig;

#[test]
fn test_attach_handshake_ships_spliced_bootstrap() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    // Mock debuggee: capture the init message, reply with initRsp.
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let init = decode(&line).unwrap();

        let mut reply = DebugMessage::new("initRsp", json!({"ok": true}));
        reply.callback_id = init.callback_id;
        writer.write_all(encode(&reply).unwrap().as_bytes()).unwrap();
        init
    });

    let config = DebuggerConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..DebuggerConfig::default()
    };
    let mut client = DebugClient::connect(&config).unwrap();
    let id = client.send_bootstrap(&config).unwrap();

    let reply = client.recv().unwrap().expect("initRsp before close");
    assert_eq!(reply.cmd, "initRsp");
    assert_eq!(reply.callback_id, Some(id));
    drop(client);

    let init = server.join().unwrap();
    assert_eq!(init.cmd, "initReq");
    let script = init.info["code"].as_str().expect("bootstrap code payload");
    // Placeholder replaced by the default registry.
    assert!(!script.contains("__CUSTOM_TYPES__"));
    assert!(script.contains("registerType"));
}
