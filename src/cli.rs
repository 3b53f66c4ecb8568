use clap::Parser;
use std::path::PathBuf;

/// Archive unread Gmail messages older than a day, using CredHub-held OAuth credentials.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Print subject and date of every matched message.
    #[arg(long)]
    pub show_headers: bool,

    /// Page size for the mailbox search.
    #[arg(long, default_value_t = 500)]
    pub page_size: u32,

    /// Scan (and optionally print headers) without modifying any message.
    #[arg(long)]
    pub dry_run: bool,

    /// Run the one-time interactive OAuth flow, save the token and exit.
    #[arg(long)]
    pub save_token: bool,

    /// CredHub URL
    #[arg(long, default_value = "")]
    pub credhub_url: String,

    /// CredHub path of the Gmail OAuth token. Not needed with --save-token.
    #[arg(long, default_value = "")]
    pub gmail_token_path: String,

    /// CredHub path of the Gmail OAuth client config.
    #[arg(long, default_value = "")]
    pub gmail_creds_path: String,

    /// Where --save-token reads and writes the bootstrap token.
    #[arg(long, default_value = "token.json")]
    pub token_file: PathBuf,
}
