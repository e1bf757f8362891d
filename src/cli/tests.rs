//! Unit tests for CLI commands

use std::io::Write as _;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;

use crate::cli::{run_cli, Cli, Commands};
use crate::config::AppConfig;

fn write_config() -> tempfile::NamedTempFile {
    let config = AppConfig {
        server_address: "127.0.0.1:8080".into(),
        hash_key: STANDARD.encode([5u8; 32]),
        block_key: STANDARD.encode([6u8; 16]),
        ..AppConfig::default()
    };
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(config.to_yaml().unwrap().as_bytes()).unwrap();
    file
}

fn run(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
    let mut out = Vec::new();
    run_cli(cli, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn test_open_is_positional() {
    let cli = Cli::try_parse_from(["valet", "open", "--name", "s", "abc"]).unwrap();
    match cli.command {
        Commands::Open { name, cookie, .. } => {
            assert_eq!(name, "s");
            assert_eq!(cookie, "abc");
        }
        other => panic!("Expected Open command, got {other:?}"),
    }
}

#[test]
fn test_dispatch_defaults() {
    let cli = Cli::try_parse_from(["valet", "dispatch"]).unwrap();
    match cli.command {
        Commands::Dispatch { method, path, body, cookie, .. } => {
            assert_eq!(method, "POST");
            assert_eq!(path, "/sample");
            assert!(body.is_none());
            assert!(cookie.is_none());
        }
        other => panic!("Expected Dispatch command, got {other:?}"),
    }
}

#[test]
fn test_serve_takes_config_flag() {
    let cli = Cli::try_parse_from(["valet", "serve", "--config", "/tmp/valet.yaml"]).unwrap();
    match cli.command {
        Commands::Serve { config } => {
            assert_eq!(config.unwrap().to_str(), Some("/tmp/valet.yaml"));
        }
        other => panic!("Expected Serve command, got {other:?}"),
    }
}

#[test]
fn test_keygen_output_is_a_valid_config() {
    let yaml = run(&["valet", "keygen"]).unwrap();
    let config = AppConfig::from_yaml(&yaml).unwrap();
    config.validate().unwrap();
}

#[test]
fn test_seal_then_open() {
    let file = write_config();
    let path = file.path().to_str().unwrap();

    let sealed = run(&["valet", "seal", "--name", "v", "--json", r#"{"a":1}"#, "--config", path])
        .unwrap();
    let opened = run(&["valet", "open", "--name", "v", sealed.trim(), "--config", path]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&opened).unwrap();
    assert_eq!(value["a"], 1);

    let err = run(&["valet", "open", "--name", "w", sealed.trim(), "--config", path]).unwrap_err();
    assert!(err.to_string().contains("invalid_mac"));
}

#[test]
fn test_check_config_hides_keys() {
    let file = write_config();
    let out = run(&["valet", "check-config", "--config", file.path().to_str().unwrap()]).unwrap();
    assert!(out.contains("cookie.name: v"));
    assert!(out.contains("cookie.http_only: true"));
    assert!(!out.contains(&STANDARD.encode([5u8; 32])));
}

#[test]
fn test_dispatch_echoes_sample_body() {
    let file = write_config();
    let out = run(&[
        "valet",
        "dispatch",
        "--body",
        r#"{"Name":"ana","Number":3}"#,
        "--config",
        file.path().to_str().unwrap(),
    ])
    .unwrap();
    assert!(out.starts_with("status: 200 OK"));
    assert!(out.contains("x-frame-options: DENY"));
    assert!(out.contains("set-cookie: v="));
    assert!(out.contains(r#""Name":"ana""#));
}
