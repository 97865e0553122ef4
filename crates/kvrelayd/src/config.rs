//! Manual flag parsing for `kvrelayd` — no `clap`, just a `while` loop over
//! `std::env::args()`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use uuid::Uuid;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_id: Uuid,
    pub access_token: String,
    pub ephemeral_token_ttl: Duration,
    /// Optional positional path to seed the engine from on startup.
    pub data_file: Option<PathBuf>,
    /// Optional path to dump the engine's contents to on shutdown.
    pub dump_path: Option<PathBuf>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 10159;
const DEFAULT_TTL_MS: u64 = 3_600_000;

impl Config {
    pub fn usage() -> &'static str {
        "Usage: kvrelayd --database-id <uuid> --access-token <token> [options] [data-file]\n\
         \n\
         Options:\n\
         \x20 --host <host>                  Bind address (default: 0.0.0.0)\n\
         \x20 --port <port>                  Bind port (default: 10159)\n\
         \x20 --database-id <uuid>           Database identifier reported at bootstrap (required)\n\
         \x20 --access-token <token>         Long-lived bearer token clients exchange at `/` (required)\n\
         \x20 --ephemeral-token-ttl <ms>     Datapath token lifetime in milliseconds (default: 3600000)\n\
         \x20 --dump-path <path>             Write the engine's contents here on shutdown\n\
         \n\
         Positional:\n\
         \x20 data-file                      Newline-delimited JSON snapshot to seed the engine from"
    }

    pub fn parse(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut host = DEFAULT_HOST.to_string();
        let mut port = DEFAULT_PORT;
        let mut database_id = None;
        let mut access_token = None;
        let mut ttl_ms = DEFAULT_TTL_MS;
        let mut dump_path = None;
        let mut positional = Vec::new();

        let args: Vec<String> = args.collect();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--host" => {
                    i += 1;
                    host = next_value(&args, i, "--host")?.to_string();
                }
                "--port" => {
                    i += 1;
                    port = next_value(&args, i, "--port")?
                        .parse()
                        .context("--port must be a u16")?;
                }
                "--database-id" => {
                    i += 1;
                    let raw = next_value(&args, i, "--database-id")?;
                    database_id = Some(Uuid::parse_str(raw).context("--database-id must be a UUID")?);
                }
                "--access-token" => {
                    i += 1;
                    access_token = Some(next_value(&args, i, "--access-token")?.to_string());
                }
                "--ephemeral-token-ttl" => {
                    i += 1;
                    ttl_ms = next_value(&args, i, "--ephemeral-token-ttl")?
                        .parse()
                        .context("--ephemeral-token-ttl must be a number of milliseconds")?;
                }
                "--dump-path" => {
                    i += 1;
                    dump_path = Some(PathBuf::from(next_value(&args, i, "--dump-path")?));
                }
                other if other.starts_with("--") => {
                    return Err(anyhow!("unknown flag: {other}"));
                }
                positional_arg => positional.push(positional_arg.to_string()),
            }
            i += 1;
        }

        if positional.len() > 1 {
            return Err(anyhow!("unexpected extra argument: {}", positional[1]));
        }

        Ok(Config {
            host,
            port,
            database_id: database_id.ok_or_else(|| anyhow!("--database-id is required"))?,
            access_token: access_token.ok_or_else(|| anyhow!("--access-token is required"))?,
            ephemeral_token_ttl: Duration::from_millis(ttl_ms),
            data_file: positional.pop().map(PathBuf::from),
            dump_path,
        })
    }
}

fn next_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{flag} requires a value"))
}
