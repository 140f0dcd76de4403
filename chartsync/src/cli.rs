use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use crate::config::RunInputs;
use crate::sync::engine::RunMode;

/// Uploads local chart/audio song folders to a catalog site, or lists the
/// ones the site does not have yet.
///
/// Any positional left out is asked for on stdin.
#[derive(Debug, Parser)]
#[command(name = "chartsync", version)]
pub struct Cli {
    /// Catalog root holding category directories (default: ./ESE)
    pub root: Option<String>,
    /// Site URL, with or without scheme (default: local server)
    pub site_url: Option<String>,
    /// Route traffic through the configured proxy: y or n
    pub proxy: Option<String>,
    /// 1 to upload, 2 to list songs missing on the server
    pub mode: Option<String>,
    /// Upload state file
    #[arg(long, env = "CHARTSYNC_STATE_FILE")]
    pub state_file: Option<PathBuf>,
}

/// Fills every answer the command line left out by prompting on `output`
/// and reading a line from `input`. End of input counts as an empty answer.
pub fn resolve_inputs<R, W>(cli: &Cli, input: &mut R, output: &mut W) -> io::Result<RunInputs>
where
    R: BufRead,
    W: Write,
{
    let root = answer(cli.root.as_deref(), "Catalog root directory: ", input, output)?;
    let site_url = answer(
        cli.site_url.as_deref(),
        "Site URL (e.g. https://taiko.example): ",
        input,
        output,
    )?;
    let proxy = answer(cli.proxy.as_deref(), "Use proxy? [Y/n]: ", input, output)?;
    let mode = answer(
        cli.mode.as_deref(),
        "Mode (1 = upload, 2 = find songs missing on server): ",
        input,
        output,
    )?;

    Ok(RunInputs {
        root,
        site_url,
        use_proxy: parse_proxy_answer(&proxy),
        mode: parse_mode_answer(&mode),
    })
}

pub fn parse_proxy_answer(value: &str) -> bool {
    !value.trim().eq_ignore_ascii_case("n")
}

pub fn parse_mode_answer(value: &str) -> RunMode {
    match value.trim() {
        "2" => RunMode::Scan,
        _ => RunMode::Upload,
    }
}

fn answer<R, W>(given: Option<&str>, prompt: &str, input: &mut R, output: &mut W) -> io::Result<String>
where
    R: BufRead,
    W: Write,
{
    if let Some(value) = given {
        return Ok(value.trim().to_string());
    }
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
