use std::io::{self, Write};

use serde::Serialize;

use crate::bulk::DownloadOutcome;
use crate::table::ResultTable;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_table(table: &ResultTable) -> io::Result<()> {
        Self::print_json(table)
    }

    pub fn print_download(outcome: &DownloadOutcome) -> io::Result<()> {
        Self::print_json(outcome)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn print_tsv(table: &ResultTable) -> io::Result<()> {
    io::stdout().write_all(table.to_tsv().as_bytes())
}
