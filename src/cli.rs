use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use seqfan::writer::is_gzip_path;

/// Convert and split FASTA/FASTQ files into FASTA files.
///
/// Records are distributed round-robin over the outputs. Inputs may be
/// compressed with gzip, bzip2, xz or zstd.
#[derive(Parser, Debug)]
#[command(version, about, arg_required_else_help = true)]
pub struct Cli {
    /// Input FASTA/FASTQ files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Number of output files to split into
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub outputs: u32,

    /// Output filename pattern (use %d or %0Nd for the output number)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Gzip output files
    #[arg(short = 'z', long)]
    pub gzip: bool,

    /// Number of decoding threads (default: number of CPUs)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Do not render the progress line
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The output pattern given with `-o`, or one derived from the inputs
    pub fn output_pattern(&self) -> String {
        let mut pattern = match &self.output {
            Some(pattern) => pattern.clone(),
            None => derive_pattern(&self.inputs, self.outputs),
        };
        if self.gzip && !is_gzip_path(Path::new(&pattern)) {
            pattern.push_str(".gz");
        }
        pattern
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Pattern named after the first input, with an index placeholder wide enough for `outputs`
pub fn derive_pattern(inputs: &[PathBuf], outputs: u32) -> String {
    let mut pattern = match inputs {
        [] => String::from("out"),
        [single] => strip_extensions(single).to_string_lossy().into_owned(),
        [first, ..] => first
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("out")),
    };
    pattern.push_str(match outputs {
        0..=1 => "",
        2..=9 => "%01d",
        10..=99 => "%02d",
        100..=999 => "%03d",
        1000..=9999 => "%04d",
        _ => "%08d",
    });
    pattern.push_str(".fasta");
    pattern
}

/// Drop every extension of the file name: `reads.fastq.gz` becomes `reads`
fn strip_extensions(path: &Path) -> PathBuf {
    let mut path = path.to_path_buf();
    while path.extension().is_some() {
        path.set_extension("");
    }
    path
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placeholder {
    width: usize,
    zero_pad: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Index(Placeholder),
}

/// A printf-style output filename pattern.
///
/// Supports `%d`, `%Nd`, `%0Nd` and `%%`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
    tokens: Vec<Token>,
}

impl OutputPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }

            let zero_pad = chars.next_if_eq(&'0').is_some();
            let mut digits = String::new();
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                digits.push(d);
            }
            match chars.next() {
                Some('d') => {}
                Some(other) => bail!("Unsupported conversion '%{other}' in output pattern {pattern:?}"),
                None => bail!("Incomplete placeholder at the end of output pattern {pattern:?}"),
            }
            let width = if digits.is_empty() { 0 } else { digits.parse()? };

            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::Index(Placeholder { width, zero_pad }));
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Ok(Self { tokens })
    }

    pub fn has_placeholder(&self) -> bool {
        self.tokens.iter().any(|t| matches!(t, Token::Index(_)))
    }

    /// Filename of output `index`
    pub fn render(&self, index: usize) -> PathBuf {
        let mut name = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(s) => name.push_str(s),
                &Token::Index(Placeholder { width, zero_pad }) => {
                    if zero_pad {
                        name.push_str(&format!("{index:0width$}"));
                    } else {
                        name.push_str(&format!("{index:width$}"));
                    }
                }
            }
        }
        PathBuf::from(name)
    }
}
