use anyhow::{Context, Result};
use base64::Engine;
use barbican_client::{
    format_entity, render_entity, Client, ListQuery, NewSecret, OutputFormat, SecretPayload,
};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use crate::output::Output;
use crate::{parse_expiration, read_file, ListArgs};

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
    /// Store a secret in Barbican
    Store(StoreArgs),

    /// Retrieve a secret by providing its URI
    Get {
        /// The URI reference for the secret
        uri: String,

        /// Retrieve the unencrypted secret data instead of its metadata
        #[arg(short, long, visible_alias = "decrypt")]
        payload: bool,

        /// Content type to retrieve the payload as
        #[arg(short = 't', long, default_value = "text/plain")]
        payload_content_type: String,
    },

    /// List secrets
    List {
        #[command(flatten)]
        page: ListArgs,

        /// Secret name filter
        #[arg(short, long)]
        name: Option<String>,

        /// Algorithm filter
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Bit length filter
        #[arg(short, long)]
        bit_length: Option<u64>,

        /// Algorithm mode filter
        #[arg(short, long)]
        mode: Option<String>,
    },

    /// Delete a secret by providing its URI
    Delete {
        /// The URI reference for the secret
        uri: String,
    },
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// A human-friendly name
    #[arg(short, long)]
    name: Option<String>,

    /// The unencrypted secret
    #[arg(short, long, conflicts_with = "payload_file")]
    payload: Option<String>,

    /// Read the secret from a file; stored as binary unless a text content type is given
    #[arg(long)]
    payload_file: Option<String>,

    /// The type/format of the secret data; text/plain is assumed to be UTF-8
    #[arg(short = 't', long)]
    payload_content_type: Option<String>,

    /// Required with --payload when the content type is application/octet-stream
    #[arg(short = 'e', long)]
    payload_content_encoding: Option<String>,

    /// The algorithm
    #[arg(short, long, default_value = "aes")]
    algorithm: String,

    /// The bit length
    #[arg(short, long, default_value_t = 256)]
    bit_length: u64,

    /// The algorithm mode; used only for reference
    #[arg(short, long, default_value = "cbc")]
    mode: String,

    /// Secret type (symmetric, public, private, passphrase, certificate, opaque)
    #[arg(short = 's', long)]
    secret_type: Option<String>,

    /// Expiration time in ISO 8601 format
    #[arg(short = 'x', long, value_parser = parse_expiration)]
    expiration: Option<DateTime<Utc>>,
}

impl SecretCommand {
    pub async fn run(self, client: &Client, format: OutputFormat) -> Result<Output> {
        match self {
            Self::Store(args) => store(client, args, format).await,
            Self::Get {
                uri,
                payload: true,
                payload_content_type,
            } => {
                let mut secret = client.secrets.get_as(&uri, &payload_content_type)?;
                let value = secret.payload().await?.map(display_payload);
                Ok(Output::text(render_entity(&["Payload"], &[value], format)))
            }
            Self::Get { uri, .. } => {
                let mut secret = client.secrets.get(&uri)?;
                Ok(Output::text(format_entity(&mut secret, format).await?))
            }
            Self::List {
                page,
                name,
                algorithm,
                bit_length,
                mode,
            } => {
                let query = ListQuery::new(page.limit, page.offset)
                    .filter_opt("name", name)
                    .filter_opt("alg", algorithm)
                    .filter_opt("mode", mode)
                    .filter_opt("bits", bit_length.filter(|bits| *bits > 0));
                let page = client.secrets.list_with(&query).await?;
                Ok(Output::page(page, format).await?)
            }
            Self::Delete { uri } => {
                client.secrets.delete(&uri).await?;
                Ok(Output::default())
            }
        }
    }
}

async fn store(client: &Client, args: StoreArgs, format: OutputFormat) -> Result<Output> {
    let payload = match (args.payload, &args.payload_file) {
        (Some(text), _) => Some(SecretPayload::Text(text)),
        (None, Some(path)) => Some(file_payload(path, args.payload_content_type.as_deref())?),
        (None, None) => None,
    };

    let mut secret = client.secrets.create(NewSecret {
        name: args.name,
        payload,
        payload_content_type: args.payload_content_type,
        payload_content_encoding: args.payload_content_encoding,
        algorithm: Some(args.algorithm),
        bit_length: Some(args.bit_length),
        mode: Some(args.mode),
        secret_type: args.secret_type,
        expiration: args.expiration,
    })?;
    secret.store().await?;

    Ok(Output::text(format_entity(&mut secret, format).await?))
}

fn file_payload(path: &str, content_type: Option<&str>) -> Result<SecretPayload> {
    let bytes = read_file(path)?;
    if content_type.is_some_and(|ct| ct.starts_with("text/")) {
        let text = String::from_utf8(bytes).with_context(|| format!("{path} is not UTF-8"))?;
        Ok(SecretPayload::Text(text))
    } else {
        Ok(SecretPayload::Binary(bytes))
    }
}

/// Binary payloads are shown base64-encoded
fn display_payload(payload: &SecretPayload) -> String {
    match payload {
        SecretPayload::Text(text) => text.clone(),
        SecretPayload::Binary(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
    }
}
