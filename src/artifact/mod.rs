//! The artifact parser: the signed multi-file firmware container format is
//! explicitly out of scope (§1 Non-goals). This module defines the trait
//! boundary `InstallUpdate` calls through, plus a minimal concrete parser
//! sufficient to run the crate end to end.
//!
//! Real deployments would swap `SimpleArtifactParser` for a parser that
//! understands the deployment's actual signed container format; nothing
//! above the `ArtifactParser` boundary needs to change.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader, Read};

/// Artifact, once the container envelope has been stripped and its
/// device-type compatibility validated: a plain byte stream ready to be
/// written to the inactive partition.
pub struct ParsedArtifact {
    pub payload: Box<dyn Read + Send>,
}

impl std::fmt::Debug for ParsedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedArtifact").finish_non_exhaustive()
    }
}

/// External collaborator boundary for artifact containers.
pub trait ArtifactParser: Send + Sync + std::fmt::Debug {
    /// Parse `stream`, verify it declares compatibility with
    /// `device_type`, and return the remaining payload.
    ///
    /// Rejects artifacts whose declared compatible device types do not
    /// include `device_type`.
    fn parse(&self, stream: Box<dyn Read + Send>, device_type: &str) -> Result<ParsedArtifact>;
}

/// Minimal reference container format: a single header line
/// `compatible_device_types=a,b,c`, a newline, then the raw payload.
///
/// This stands in for the real signed multi-file container the spec
/// declares out of scope; it exists so the crate is runnable end to end.
#[derive(Debug, Default)]
pub struct SimpleArtifactParser;

impl ArtifactParser for SimpleArtifactParser {
    fn parse(&self, stream: Box<dyn Read + Send>, device_type: &str) -> Result<ParsedArtifact> {
        let mut reader = BufReader::new(stream);
        let mut header = String::new();
        reader
            .read_line(&mut header)
            .context("failed to read artifact header")?;

        let types = header
            .trim()
            .strip_prefix("compatible_device_types=")
            .ok_or_else(|| anyhow::anyhow!("missing compatible_device_types header"))?;

        let compatible: Vec<&str> = types.split(',').map(str::trim).collect();
        if !compatible.contains(&device_type) {
            bail!(
                "artifact is not compatible with device type '{}' (declares: {})",
                device_type,
                types
            );
        }

        Ok(ParsedArtifact {
            payload: Box::new(reader),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(content: &str) -> Box<dyn Read + Send> {
        Box::new(Cursor::new(content.as_bytes().to_vec()))
    }

    #[test]
    fn compatible_device_type_parses() {
        let parser = SimpleArtifactParser;
        let mut parsed = parser
            .parse(
                stream("compatible_device_types=qemux86-64,raspberrypi4\npayload-bytes"),
                "qemux86-64",
            )
            .unwrap();
        let mut out = String::new();
        parsed.payload.read_to_string(&mut out).unwrap();
        assert_eq!(out, "payload-bytes");
    }

    #[test]
    fn incompatible_device_type_is_rejected() {
        let parser = SimpleArtifactParser;
        let err = parser
            .parse(
                stream("compatible_device_types=raspberrypi4\npayload"),
                "qemux86-64",
            )
            .unwrap_err();
        assert!(err.to_string().contains("not compatible"));
    }

    #[test]
    fn missing_header_is_an_error() {
        let parser = SimpleArtifactParser;
        let err = parser.parse(stream("garbage\n"), "qemux86-64").unwrap_err();
        assert!(err.to_string().contains("compatible_device_types"));
    }

    #[derive(Default)]
    struct FailingReader;
    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "read error"))
        }
    }

    #[test]
    fn read_error_propagates_unchanged() {
        let parser = SimpleArtifactParser;
        let err = parser
            .parse(Box::new(FailingReader), "qemux86-64")
            .unwrap_err();
        assert!(err.to_string().contains("read error") || err.to_string().contains("failed to read"));
    }
}
