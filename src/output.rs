use std::io::{self, Write};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::catalog::ExternalWorkRecord;

#[derive(Debug, Serialize)]
pub struct SearchResult<'a> {
    pub query: &'a str,
    pub records: &'a [ExternalWorkRecord],
}

#[derive(Debug, Serialize)]
pub struct RecordResult<'a> {
    pub query: &'a str,
    pub record: Option<&'a ExternalWorkRecord>,
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub authorized: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearResult {
    pub removed: Vec<Utf8PathBuf>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_search(result: &SearchResult<'_>) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_record(result: &RecordResult<'_>) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_auth(result: &AuthStatus) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_clear(result: &ClearResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
