use anyhow::{bail, Result};
use barbican_client::{
    format_entity, Client, Container, ContainerType, ListQuery, NewCertificateContainer,
    NewContainer, NewRsaContainer, OutputFormat,
};
use clap::Subcommand;

use crate::output::Output;
use crate::ListArgs;

#[derive(Subcommand, Debug)]
pub enum ContainerCommand {
    /// Store a container in Barbican
    Create {
        /// A human-friendly name
        #[arg(short, long)]
        name: Option<String>,

        /// Type of container: generic, rsa or certificate
        #[arg(long = "type", default_value = "generic")]
        container_type: ContainerType,

        /// One secret to put in the container, as NAME=URI (repeatable),
        /// e.g. --secret "private_key=https://kms.example.com/v1/secrets/<uuid>"
        #[arg(short, long = "secret")]
        secrets: Vec<String>,
    },

    /// Retrieve a container by providing its URI
    Get {
        /// The URI reference for the container
        uri: String,
    },

    /// List containers
    List {
        #[command(flatten)]
        page: ListArgs,

        /// Container name filter
        #[arg(short, long)]
        name: Option<String>,

        /// Container type filter
        #[arg(short = 't', long = "type")]
        container_type: Option<ContainerType>,
    },

    /// Delete a container by providing its URI
    Delete {
        /// The URI reference for the container
        uri: String,
    },
}

impl ContainerCommand {
    pub async fn run(self, client: &Client, format: OutputFormat) -> Result<Output> {
        match self {
            Self::Create {
                name,
                container_type,
                secrets,
            } => {
                let mut container = build(client, name, container_type, &secrets)?;
                container.store().await?;
                Ok(Output::text(format_entity(&mut container, format).await?))
            }
            Self::Get { uri } => {
                let mut container = client.containers.get(&uri).await?;
                Ok(Output::text(format_entity(&mut container, format).await?))
            }
            Self::List {
                page,
                name,
                container_type,
            } => {
                let query = ListQuery::new(page.limit, page.offset)
                    .filter_opt("name", name)
                    .filter_opt("type", container_type);
                let page = client.containers.list_with(&query).await?;
                Ok(Output::page(page, format).await?)
            }
            Self::Delete { uri } => {
                client.containers.delete(&uri).await?;
                Ok(Output::default())
            }
        }
    }
}

fn build(
    client: &Client,
    name: Option<String>,
    container_type: ContainerType,
    secrets: &[String],
) -> Result<Container> {
    let mut container = match container_type {
        ContainerType::Generic => client.containers.create(NewContainer {
            name,
            ..Default::default()
        })?,
        ContainerType::Rsa => client.containers.create_rsa(NewRsaContainer {
            name,
            ..Default::default()
        })?,
        ContainerType::Certificate => {
            client
                .containers
                .create_certificate(NewCertificateContainer {
                    name,
                    ..Default::default()
                })?
        }
    };

    for arg in secrets {
        let (slot, secret_ref) = parse_secret(arg)?;
        let secret = client.secrets.get(secret_ref)?;
        match container_type {
            ContainerType::Generic => container.add(slot, secret)?,
            _ => container.set_slot(slot, secret)?,
        }
    }
    Ok(container)
}

/// Split `name=uri`
fn parse_secret(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((name, uri)) if !name.trim().is_empty() && !uri.trim().is_empty() => {
            Ok((name.trim(), uri.trim()))
        }
        _ => bail!("Invalid secret '{}'. Use --secret NAME=URI", arg),
    }
}
