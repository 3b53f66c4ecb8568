use crate::errors::{AppError, AppResult};
use crate::oauth::{load_token_file, save_token_file, CodeExchange, Token};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::info;

/// Where the bootstrap token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    File,
    WebFlow,
}

/// Return the token cached at `token_file`, or run the interactive consent flow
/// and cache its result there.
pub async fn obtain_token<E, R, W>(
    exchange: &E,
    token_file: &Path,
    input: &mut R,
    output: &mut W,
) -> AppResult<(Token, TokenSource)>
where
    E: CodeExchange + ?Sized,
    R: BufRead,
    W: Write,
{
    if let Some(token) = load_token_file(token_file)? {
        info!(path = %token_file.display(), "Using existing token file");
        return Ok((token, TokenSource::File));
    }

    let token = token_from_web(exchange, input, output).await?;
    writeln!(output, "Saving credential file to: {}", token_file.display())
        .map_err(|e| AppError::Io(e.to_string()))?;
    save_token_file(token_file, &token)?;
    Ok((token, TokenSource::WebFlow))
}

async fn token_from_web<E, R, W>(exchange: &E, input: &mut R, output: &mut W) -> AppResult<Token>
where
    E: CodeExchange + ?Sized,
    R: BufRead,
    W: Write,
{
    let auth_url = exchange.authorization_url()?;
    writeln!(
        output,
        "Go to the following link in your browser then type the authorization code: \n{auth_url}"
    )
    .and_then(|_| output.flush())
    .map_err(|e| AppError::Io(e.to_string()))?;

    let code = read_code(input)?;
    info!("Exchanging authorization code");
    exchange.exchange_code(&code).await
}

fn read_code<R: BufRead>(input: &mut R) -> AppResult<String> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = input
            .read_line(&mut line)
            .map_err(|e| AppError::WebExchange(format!("unable to read authorization code: {e}")))?;
        if n == 0 {
            return Err(AppError::WebExchange(
                "unable to read authorization code: end of input".into(),
            ));
        }
        if let Some(code) = line.split_whitespace().next() {
            return Ok(code.to_string());
        }
    }
}
