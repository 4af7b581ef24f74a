use clap::Parser;
use obauth::{
    clock::DurationSecs,
    grants::{AuthorizationCodeGrant, AuthorizationCodeParams},
    AuthorizationCode, AuthorizationRequest, ExpiryPolicy, ObConfig, SessionKey, TokenCache,
    Transport,
};
use std::time::Duration;

/// Walks through the interactive login against an Open Banking authority
///
/// Connection settings are read from the `OB_*` environment variables (or a
/// `.env` file).
#[derive(Debug, Parser)]
struct Opts {
    /// The authorization code delivered to the redirect URI
    ///
    /// When omitted, only the authorization URL is printed.
    #[arg(short, long, env = "OB_AUTHORIZATION_CODE", hide_env_values = true)]
    code: Option<AuthorizationCode>,

    /// Reacquire tokens that expire within this many seconds
    #[arg(long)]
    min_validity: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let config = ObConfig::from_env()?;
    let transport = Transport::builder()
        .timeout(Duration::from_secs(opts.timeout))
        .build(&config)
        .await?;

    let login = AuthorizationRequest::new(&config);
    tracing::info!(
        url = %login.url(),
        state = %login.state(),
        "open this URL to log in"
    );

    let Some(code) = opts.code else {
        return Ok(());
    };

    let mut cache = TokenCache::new(AuthorizationCodeGrant::from_config(&config, transport));
    if let Some(secs) = opts.min_validity {
        cache = cache.with_expiry_policy(ExpiryPolicy::Reacquire {
            min_validity: DurationSecs(secs),
        });
    }

    let session = SessionKey::generate();
    let record = cache
        .get_or_retrieve(&session, AuthorizationCodeParams::new(code))
        .await?;

    tracing::info!(
        session = %session,
        token = format_args!("{:#?}", record.access_token()),
        token_type = %record.token_type(),
        expires_at = record.expires_at().0,
        has_refresh_token = record.refresh_token().is_some(),
        "obtained access token"
    );

    Ok(())
}
