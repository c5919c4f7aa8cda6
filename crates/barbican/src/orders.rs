use anyhow::{Context, Result};
use barbican_client::{
    format_entity, Client, Formatted, NewAsymmetricOrder, NewCertificateOrder, NewKeyOrder,
    OrderCommon, OrderType, OutputFormat,
};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use crate::output::Output;
use crate::{parse_expiration, read_file, ListArgs};

#[derive(Subcommand, Debug)]
pub enum OrderCommand {
    /// Create a new order
    Create(CreateArgs),

    /// Retrieve an order by providing its URI
    Get {
        /// The URI reference for the order
        uri: String,
    },

    /// List orders
    List {
        #[command(flatten)]
        page: ListArgs,
    },

    /// Delete an order by providing its URI
    Delete {
        /// The URI reference for the order
        uri: String,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Type of order: key, asymmetric or certificate
    #[arg(long = "type", default_value = "key")]
    order_type: OrderType,

    /// A human-friendly name
    #[arg(short, long)]
    name: Option<String>,

    /// Algorithm of the generated key (default: aes for key, rsa for asymmetric)
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Bit length of the generated key (default: 256 for key, 2048 for asymmetric)
    #[arg(short, long)]
    bit_length: Option<u64>,

    /// Algorithm mode of a symmetric key
    #[arg(short, long, default_value = "cbc")]
    mode: String,

    /// Type/format of the secret to be generated
    #[arg(short = 't', long, default_value = "application/octet-stream")]
    payload_content_type: String,

    /// Expiration time of the generated secret in ISO 8601 format
    #[arg(short = 'x', long, value_parser = parse_expiration)]
    expiration: Option<DateTime<Utc>>,

    /// Pass phrase protecting a generated private key
    #[arg(long)]
    pass_phrase: Option<String>,

    /// Type of certificate request
    #[arg(long)]
    request_type: Option<String>,

    /// Subject of the certificate
    #[arg(long)]
    subject_dn: Option<String>,

    /// Container holding the key the certificate is issued for
    #[arg(long)]
    source_container_ref: Option<String>,

    /// Identifier of the CA to use for the certificate request
    #[arg(long)]
    ca_id: Option<String>,

    /// Certificate profile to use
    #[arg(long)]
    profile: Option<String>,

    /// File containing the CSR
    #[arg(long)]
    request_file: Option<String>,
}

impl OrderCommand {
    pub async fn run(self, client: &Client, format: OutputFormat) -> Result<Output> {
        match self {
            Self::Create(args) => create(client, args, format).await,
            Self::Get { uri } => {
                let mut order = client.orders.get(&uri).await?;
                Ok(Output::text(format_entity(&mut order, format).await?))
            }
            Self::List { page } => {
                let page = client.orders.list(page.limit, page.offset).await?;
                Ok(Output::page(page, format).await?)
            }
            Self::Delete { uri } => {
                client.orders.delete(&uri).await?;
                Ok(Output::default())
            }
        }
    }
}

async fn create(client: &Client, args: CreateArgs, format: OutputFormat) -> Result<Output> {
    match args.order_type {
        OrderType::Key => {
            let order = client.orders.create_key(NewKeyOrder {
                name: args.name,
                algorithm: Some(args.algorithm.unwrap_or_else(|| "aes".to_string())),
                bit_length: Some(args.bit_length.unwrap_or(256)),
                mode: Some(args.mode),
                payload_content_type: Some(args.payload_content_type),
                expiration: args.expiration,
            })?;
            submit(order, format).await
        }
        OrderType::Asymmetric => {
            let order = client.orders.create_asymmetric(NewAsymmetricOrder {
                name: args.name,
                algorithm: Some(args.algorithm.unwrap_or_else(|| "rsa".to_string())),
                bit_length: Some(args.bit_length.unwrap_or(2048)),
                pass_phrase: args.pass_phrase,
                payload_content_type: Some(args.payload_content_type),
                expiration: args.expiration,
            })?;
            submit(order, format).await
        }
        OrderType::Certificate => {
            let request_data = args
                .request_file
                .as_deref()
                .map(|path| {
                    let bytes = read_file(path)?;
                    String::from_utf8(bytes).with_context(|| format!("{path} is not a PEM file"))
                })
                .transpose()?;
            let order = client.orders.create_certificate(NewCertificateOrder {
                name: args.name,
                request_type: args.request_type,
                subject_dn: args.subject_dn,
                source_container_ref: args.source_container_ref,
                ca_id: args.ca_id,
                profile: args.profile,
                request_data,
            })?;
            submit(order, format).await
        }
    }
}

async fn submit<O: OrderCommon + Formatted>(mut order: O, format: OutputFormat) -> Result<Output> {
    let order_ref = order.submit().await?;
    tracing::debug!(%order_ref, "order submitted");
    Ok(Output::text(format_entity(&mut order, format).await?))
}
