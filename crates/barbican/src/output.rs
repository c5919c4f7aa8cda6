use std::io::Write;

use barbican_client::{format_list, Formatted, OutputFormat, Page};

/// What a command prints
#[derive(Debug, Default, PartialEq)]
pub struct Output {
    pub body: String,
    /// `Previous:`/`Next:` lines of a list page
    pub cursors: Vec<String>,
}

impl Output {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            cursors: Vec::new(),
        }
    }

    /// Render a page of entities along with its cursors
    pub async fn page<T: Formatted>(
        mut page: Page<T>,
        format: OutputFormat,
    ) -> barbican_client::Result<Self> {
        let body = format_list(&mut page.items, format).await?;
        let cursors = [("Previous", &page.previous), ("Next", &page.next)]
            .into_iter()
            .filter_map(|(label, href)| href.as_ref().map(|h| format!("{label}: {h}")))
            .collect();
        Ok(Self { body, cursors })
    }

    /// Cursors go to stdout under a table and to stderr otherwise, so
    /// json/value output stays machine-readable
    pub fn print(&self, format: OutputFormat) -> std::io::Result<()> {
        let mut stdout = std::io::stdout().lock();
        if !self.body.is_empty() {
            writeln!(stdout, "{}", self.body)?;
        }
        if format == OutputFormat::Table {
            for line in &self.cursors {
                writeln!(stdout, "{line}")?;
            }
        } else {
            let mut stderr = std::io::stderr().lock();
            for line in &self.cursors {
                writeln!(stderr, "{line}")?;
            }
        }
        Ok(())
    }
}
