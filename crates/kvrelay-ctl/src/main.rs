//! kvrelay-ctl — thin command-line client for the kvrelay datapath.
//!
//! This is deliberately minimal: it exists to exercise the wire format
//! end-to-end during development, not to be a full client SDK. Every
//! subcommand bootstraps its own ephemeral token before talking to the
//! datapath, matching the exchange a real client library would perform.

use anyhow::{Context, Result};

mod cmd;

use cmd::http::base_url;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 10159;

fn print_usage() {
    println!("Usage: kvrelay-ctl [--host <host>] [--port <port>] --access-token <token> <command>");
    println!();
    println!("Commands:");
    println!("  status                          Bootstrap and print what the relay reports");
    println!("  read <hex-tuple-key>             Read every entry with the given key as a prefix");
    println!("  write-set <hex-tuple-key> <hex-bytes>");
    println!("                                  Set a key to a raw byte value");
    println!("  watch <hex-tuple-key>...        Stream change notifications for one or more keys");
    println!();
    println!(
        "Options:\n  --host <host>                   Relay host (default: {})\n  --port <port>                   Relay port (default: {})\n  --access-token <token>          Operator bearer token exchanged at bootstrap (required)",
        DEFAULT_HOST, DEFAULT_PORT
    );
    println!();
    println!("Examples:");
    println!("  kvrelay-ctl --access-token secret status");
    println!("  kvrelay-ctl --access-token secret read 0141610000");
    println!("  kvrelay-ctl --access-token secret write-set 0141610000 68656c6c6f");
    println!("  kvrelay-ctl --access-token secret watch 0141610000");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut host = DEFAULT_HOST.to_string();
    let mut port = DEFAULT_PORT;
    let mut access_token = None;
    let mut remaining: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                host = args.get(i).context("--host requires a value")?.clone();
            }
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--access-token" => {
                i += 1;
                access_token = Some(args.get(i).context("--access-token requires a value")?.clone());
            }
            "--help" | "-h" | "help" => {
                print_usage();
                return Ok(());
            }
            _ => remaining.push(args[i].clone()),
        }
        i += 1;
    }

    if remaining.is_empty() {
        print_usage();
        return Ok(());
    }

    let access_token = match access_token {
        Some(token) => token,
        None => {
            eprintln!("--access-token is required");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };
    let base = base_url(&host, port);

    let remaining_refs: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();
    match remaining_refs.as_slice() {
        ["status"] => cmd::status::run(&base, &access_token).await,
        ["read", key] => cmd::read::run(&base, &access_token, key).await,
        ["write-set", key, value] => cmd::write_set::run(&base, &access_token, key, value).await,
        ["watch", keys @ ..] => {
            let keys: Vec<String> = keys.iter().map(|s| s.to_string()).collect();
            cmd::watch::run(&base, &access_token, &keys).await
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
