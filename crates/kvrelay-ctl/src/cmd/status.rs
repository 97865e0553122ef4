//! `kvrelay-ctl status` — bootstraps against `/` and prints what the relay
//! reports about itself. Exercises the bootstrap bearer exchange in
//! isolation, without touching the datapath.

use anyhow::Result;

use crate::cmd::http;

pub async fn run(base: &str, access_token: &str) -> Result<()> {
    let bootstrap = http::bootstrap(base, access_token).await?;
    println!("database_id: {}", bootstrap.database_id);
    println!("ephemeral token: {}", bootstrap.token);
    println!("expires at: {}", bootstrap.expires_at);
    for endpoint in &bootstrap.endpoints {
        println!("endpoint: {} ({})", endpoint.url, endpoint.consistency);
    }
    Ok(())
}
