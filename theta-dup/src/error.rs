// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error types for sketch operations

use std::fmt;

/// ErrorKind is all kinds of Error this crate can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A caller-supplied parameter is out of range, or input bytes are
    /// missing where a header is expected.
    InvalidArgument,
    /// The serial version on the wire differs from the supported version.
    VersionMismatch,
    /// The sketch type byte is not recognized by the requested deserializer.
    TypeMismatch,
    /// The stored seed hash does not match the caller-supplied seed.
    SeedMismatch,
    /// The byte buffer is shorter than the declared layout requires.
    Truncated,
    /// The underlying byte source or sink signalled a read/write failure.
    IoFailure,
    /// A probe cycle completed without resolution. Indicates a corrupted
    /// input sketch or an internal invariant violation.
    LogicFault,
}

impl ErrorKind {
    /// Convert this error kind instance into static str.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::VersionMismatch => "VersionMismatch",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::SeedMismatch => "SeedMismatch",
            ErrorKind::Truncated => "Truncated",
            ErrorKind::IoFailure => "IoFailure",
            ErrorKind::LogicFault => "LogicFault",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all fallible functions in this crate.
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::default(),
            source: None,
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Set source for error.
    ///
    /// # Panics
    ///
    /// Panics if the source has been set.
    pub fn set_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(src.into());
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub(crate) fn version_mismatch(expected: u8, actual: u8) -> Self {
        Self::new(ErrorKind::VersionMismatch, "unsupported serial version")
            .with_context("expected", expected)
            .with_context("actual", actual)
    }

    pub(crate) fn type_mismatch(expected: u8, actual: u8) -> Self {
        Self::new(ErrorKind::TypeMismatch, "unexpected sketch type")
            .with_context("expected", expected)
            .with_context("actual", actual)
    }

    pub(crate) fn seed_mismatch(expected: u16, actual: u16) -> Self {
        Self::new(ErrorKind::SeedMismatch, "seed hash mismatch")
            .with_context("expected", format!("0x{expected:04X}"))
            .with_context("actual", format!("0x{actual:04X}"))
    }

    pub(crate) fn truncated(field: &'static str) -> Self {
        Self::new(ErrorKind::Truncated, "not enough bytes in input").with_context("field", field)
    }

    pub(crate) fn io_failure(op: &'static str, src: std::io::Error) -> Self {
        Self::new(ErrorKind::IoFailure, "byte source failure")
            .with_context("op", op)
            .set_source(src)
    }

    pub(crate) fn logic_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LogicFault, message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "   {k}: {v}")?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source:")?;
            writeln!(f, "   {source:#}")?;
        }

        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}
