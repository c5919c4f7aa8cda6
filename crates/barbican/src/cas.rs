use anyhow::Result;
use barbican_client::{format_entity, Client, ListQuery, OutputFormat};
use clap::Subcommand;

use crate::output::Output;
use crate::ListArgs;

#[derive(Subcommand, Debug)]
pub enum CaCommand {
    /// Retrieve a CA by providing its URI
    Get {
        /// The URI reference for the CA
        uri: String,
    },

    /// List CAs
    List {
        #[command(flatten)]
        page: ListArgs,

        /// CA name filter
        #[arg(short, long)]
        name: Option<String>,
    },
}

impl CaCommand {
    pub async fn run(self, client: &Client, format: OutputFormat) -> Result<Output> {
        match self {
            Self::Get { uri } => {
                let mut ca = client.cas.get(&uri)?;
                Ok(Output::text(format_entity(&mut ca, format).await?))
            }
            Self::List { page, name } => {
                let query = ListQuery::new(page.limit, page.offset).filter_opt("name", name);
                let page = client.cas.list_with(&query).await?;
                Ok(Output::page(page, format).await?)
            }
        }
    }
}
