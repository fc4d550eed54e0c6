use anyhow::Context;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Every platform the compiler can target; `// SYSTEM all` expands to this list.
pub const ALL_SYSTEMS: [&str; 9] = [
    "6502",
    "65c02",
    "rockwell65c02",
    "wdc65c02",
    "huc6280",
    "z80",
    "gb",
    "wdc65816",
    "spc700",
];

const SYSTEM_MARKER: &str = "// SYSTEM";
const BLOCK_MARKER: &str = "// BLOCK";
const ERROR_MARKER: &str = "// ERROR";
const REFERENCE_MARKER: &str = "// REFERENCE";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{file}:{line}: invalid `// SYSTEM` tag")]
    InvalidSystemTag { file: String, line: usize },
    #[error("{file}:{line}: invalid `// BLOCK` tag")]
    InvalidBlockTag { file: String, line: usize },
    #[error("{file}:{line}: first `// BLOCK` tag must contain an address")]
    BlockWithoutAddress { file: String, line: usize },
    #[error("{file}: expected at least one `// SYSTEM` tag")]
    MissingSystemTag { file: String },
    #[error("{file}: expected at least one `// BLOCK` or `// ERROR` tag")]
    MissingExpectations { file: String },
    #[error("{file}: `// BLOCK` and `// ERROR` tags are mutually exclusive")]
    MixedExpectations { file: String },
    #[error("{file}: `// REFERENCE` tags are not allowed in block tests")]
    ReferenceInBlockTest { file: String },
}

/// A contiguous run of expected bytes in the compiler's output binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockExpectation {
    pub address: usize,
    pub data: Vec<u8>,
}

impl BlockExpectation {
    /// One past the last byte covered by this expectation.
    pub fn end(&self) -> usize {
        self.address + self.data.len()
    }
}

/// One parsed test file: the systems to compile it for, and either block
/// expectations or expected diagnostic line sets, never both.
#[derive(Debug)]
pub struct TestFile {
    pub filename: PathBuf,
    pub systems: Vec<String>,
    pub blocks: Vec<BlockExpectation>,
    pub errors: BTreeSet<usize>,
    pub references: BTreeSet<usize>,
}

impl TestFile {
    fn new(
        filename: PathBuf,
        mut systems: Vec<String>,
        blocks: Vec<BlockExpectation>,
        errors: BTreeSet<usize>,
        references: BTreeSet<usize>,
    ) -> Result<Self, ParseError> {
        let file = filename.display().to_string();
        if systems.is_empty() {
            return Err(ParseError::MissingSystemTag { file });
        }
        if systems.len() == 1 && systems[0] == "all" {
            systems = ALL_SYSTEMS.iter().map(|s| (*s).to_owned()).collect();
        }
        if !blocks.is_empty() && !errors.is_empty() {
            return Err(ParseError::MixedExpectations { file });
        }
        if !blocks.is_empty() && !references.is_empty() {
            return Err(ParseError::ReferenceInBlockTest { file });
        }
        if blocks.is_empty() && errors.is_empty() {
            return Err(ParseError::MissingExpectations { file });
        }
        Ok(Self {
            filename,
            systems,
            blocks,
            errors,
            references,
        })
    }
}

pub fn read_test_file(path: &Path) -> anyhow::Result<TestFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read test file {}", path.display()))?;
    Ok(parse_test_source(path, &text)?)
}

/// Scan the test source once, line by line, collecting annotation tags.
pub fn parse_test_source(filename: &Path, text: &str) -> Result<TestFile, ParseError> {
    let file = || filename.display().to_string();

    let mut systems = Vec::new();
    let mut blocks: Vec<BlockExpectation> = Vec::new();
    let mut errors = BTreeSet::new();
    let mut references = BTreeSet::new();
    let mut current_block: Option<usize> = None;

    for (index, line) in text.lines().enumerate() {
        let lineno = index + 1;

        if let Some(pos) = line.find(SYSTEM_MARKER) {
            let rest = &line[pos + SYSTEM_MARKER.len()..];
            let ids: Vec<&str> = rest
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|id| !id.is_empty())
                .collect();
            if ids.is_empty() {
                return Err(ParseError::InvalidSystemTag {
                    file: file(),
                    line: lineno,
                });
            }
            systems.extend(ids.into_iter().map(str::to_owned));
        }

        if let Some(pos) = line.find(BLOCK_MARKER) {
            let rest = &line[pos + BLOCK_MARKER.len()..];
            let parsed = match_block_line(rest).ok_or_else(|| ParseError::InvalidBlockTag {
                file: file(),
                line: lineno,
            })?;
            match parsed.address {
                Some(address) => {
                    // A run starting where an earlier one ends continues it.
                    if let Some(i) = blocks.iter().position(|b| b.end() == address) {
                        blocks[i].data.extend_from_slice(&parsed.data);
                        current_block = Some(i);
                    } else {
                        blocks.push(BlockExpectation {
                            address,
                            data: parsed.data,
                        });
                        current_block = Some(blocks.len() - 1);
                    }
                }
                None => match current_block {
                    Some(i) => blocks[i].data.extend_from_slice(&parsed.data),
                    None => {
                        return Err(ParseError::BlockWithoutAddress {
                            file: file(),
                            line: lineno,
                        })
                    }
                },
            }
        }

        if line.contains(ERROR_MARKER) {
            errors.insert(lineno);
        }

        if line.contains(REFERENCE_MARKER) {
            references.insert(lineno);
        }
    }

    TestFile::new(filename.to_path_buf(), systems, blocks, errors, references)
}

struct BlockLine {
    address: Option<usize>,
    data: Vec<u8>,
}

/// Structured match for the text after a `// BLOCK` marker: an optional
/// `[0x]AAAA` address token followed by 2-hex-digit byte tokens. Anything
/// after a run of two or more whitespace characters is a trailing comment.
fn match_block_line(rest: &str) -> Option<BlockLine> {
    let mut tokens = block_payload(rest).split_whitespace();
    let mut data = Vec::new();

    let address = match tokens.next() {
        None => None,
        Some(first) => {
            if let Some(address) = match_address(first) {
                Some(address)
            } else {
                data.push(match_byte(first)?);
                None
            }
        }
    };

    for token in tokens {
        data.push(match_byte(token)?);
    }

    Some(BlockLine { address, data })
}

/// Cut off the trailing comment: everything from the first run of two
/// consecutive whitespace characters after the leading gap.
fn block_payload(rest: &str) -> &str {
    let start = rest
        .find(|c: char| !c.is_whitespace())
        .unwrap_or(rest.len());
    let body = &rest[start..];
    let mut previous_was_space = false;
    for (i, c) in body.char_indices() {
        if c.is_whitespace() {
            if previous_was_space {
                return &body[..i];
            }
            previous_was_space = true;
        } else {
            previous_was_space = false;
        }
    }
    body
}

fn match_address(token: &str) -> Option<usize> {
    let digits = token.strip_prefix("0x").unwrap_or(token);
    if (4..=8).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        usize::from_str_radix(digits, 16).ok()
    } else {
        None
    }
}

fn match_byte(token: &str) -> Option<u8> {
    if token.len() == 2 && token.bytes().all(|b| b.is_ascii_hexdigit()) {
        u8::from_str_radix(token, 16).ok()
    } else {
        None
    }
}
