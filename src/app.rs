use crate::archive::{archive, ArchiveOutcome};
use crate::bootstrap::{obtain_token, TokenSource};
use crate::config::Config;
use crate::credhub::{resolve, CredHubClient, SecretStore};
use crate::errors::AppResult;
use crate::gmail::{GmailClient, MailService};
use crate::oauth::{AuthenticatedClient, ClientConfig, Token, GMAIL_MODIFY_SCOPE};
use crate::scan::{print_headers, MessagePages};
use crate::types::PurgeSummary;
use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::info;

pub async fn run(config: Config) -> Result<()> {
    let store = CredHubClient::new(&config.credhub)?;

    if config.save_token {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        save_token(&config, &store, &mut input, &mut output).await?;
        return Ok(());
    }

    info!(dry_run = config.dry_run, page_size = config.page_size, "Starting purge");
    let mut output = io::stdout();
    let summary = execute(&config, &store, GmailClient::new, &mut output).await?;
    info!(
        pages = summary.pages,
        matched = summary.matched,
        archived = summary.archived,
        dry_run = config.dry_run,
        "Purge finished"
    );
    Ok(())
}

pub async fn load_client_config<S: SecretStore + ?Sized>(
    config: &Config,
    store: &S,
) -> AppResult<ClientConfig> {
    let raw = resolve(store, &config.creds_path).await?;
    ClientConfig::from_json(raw.as_bytes(), &[GMAIL_MODIFY_SCOPE])
}

/// One-time bootstrap: make sure a token exists in the local token file.
pub async fn save_token<S, R, W>(
    config: &Config,
    store: &S,
    input: &mut R,
    output: &mut W,
) -> AppResult<TokenSource>
where
    S: SecretStore + ?Sized,
    R: BufRead,
    W: Write,
{
    let client_config = load_client_config(config, store).await?;
    let (_token, source) = obtain_token(&client_config, &config.token_file, input, output).await?;
    info!(source = ?source, path = %config.token_file.display(), "Token available");
    Ok(source)
}

/// Normal run: resolve both secrets, authenticate, then scan and archive.
///
/// `connect` turns the authenticated transport into a mail service; it is not
/// called unless both secrets resolve and decode.
pub async fn execute<S, M, F, W>(
    config: &Config,
    store: &S,
    connect: F,
    output: &mut W,
) -> AppResult<PurgeSummary>
where
    S: SecretStore + ?Sized,
    M: MailService,
    F: FnOnce(AuthenticatedClient) -> M,
    W: Write,
{
    let client_config = load_client_config(config, store).await?;
    let raw_token = resolve(store, &config.token_path).await?;
    let token = Token::from_json(&raw_token)?;
    info!(
        has_refresh_token = token.refresh_token().is_some(),
        "Using token from secret store"
    );

    let auth = AuthenticatedClient::new(&client_config, token)?;
    let service = connect(auth);
    purge(config, &service, output).await
}

/// Walk every page of the purge query, printing headers when asked and
/// archiving each page before the next one is requested.
pub async fn purge<S, W>(config: &Config, service: &S, output: &mut W) -> AppResult<PurgeSummary>
where
    S: MailService + ?Sized,
    W: Write,
{
    let mut pages = MessagePages::new(service, &config.query, config.page_size);
    let mut summary = PurgeSummary::default();

    while let Some(page) = pages.next_page().await? {
        summary.matched += page.ids.len();

        if config.show_headers {
            print_headers(service, &page.ids, output).await?;
        }

        if let ArchiveOutcome::Archived(n) = archive(service, &page.ids, config.dry_run).await? {
            summary.archived += n;
        }
    }

    summary.pages = pages.pages_fetched();
    Ok(summary)
}
