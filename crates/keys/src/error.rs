// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, io};

/// Malformed input rejected before it can reach the file
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyError {
    InvalidId(String),
    InvalidKey(String),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::InvalidId(id) => write!(f, "Invalid ID: {id:?}"),
            KeyError::InvalidKey(key) => write!(f, "Invalid public_key: {key:?}"),
        }
    }
}

impl std::error::Error for KeyError {}

#[derive(Debug)]
pub enum Error {
    Key(KeyError),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Key(e) => write!(f, "{e}"),
            Error::Io(e) => write!(f, "authorized keys I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Key(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<KeyError> for Error {
    fn from(e: KeyError) -> Self {
        Error::Key(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
