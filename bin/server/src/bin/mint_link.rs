//! Prints a redemption link for an identity and service.
//!
//! Usage: `mint-link <identity-id> [service]`
//!
//! Reads `LINK_SECRET` and `PUBLIC_API_URL` from the environment, like the
//! server does.

use linkgate_core::{IdentityId, ServiceName};
use linkgate_link_token::{LinkSecret, TokenMinter};
use linkgate_server::config::ServerConfig;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(identity) = args.next() else {
        eprintln!("usage: mint-link <identity-id> [mypage|mymile]");
        return ExitCode::FAILURE;
    };
    let identity: IdentityId = match identity.parse() {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let service = match args.next().as_deref().unwrap_or("mypage").parse::<ServiceName>() {
        Ok(service) => service,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let secret = match LinkSecret::new(&config.link_secret) {
        Ok(secret) => secret,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let token = TokenMinter::new(secret).mint(&identity, service);
    println!(
        "{}/api/auth/redirect?tk={token}",
        config.public_api_url.trim_end_matches('/')
    );
    ExitCode::SUCCESS
}
