// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use thiserror::Error;

/// Represents all kind of errors which can occur while setting up the controllers or while
/// handing commands to them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LwrException {
    /// ConfigurationException is returned by the controller constructors if a required link
    /// name, hardware handle or kinematic chain segment is missing. A controller which failed
    /// to initialize does not exist and can therefore never be updated.
    #[error("{message}")]
    ConfigurationException { message: String },

    /// CommandDimension is returned if the payload of a command does not have the expected
    /// number of entries. Nothing of the command is applied.
    #[error("{command} message had the wrong size: expected {expected} entries but got {actual}")]
    CommandDimension {
        /// Name of the rejected command.
        command: &'static str,
        /// Number of entries the command has to have.
        expected: usize,
        /// Number of entries the command had.
        actual: usize,
    },

    /// CommandException is returned if a command has the right size but cannot be applied,
    /// e.g. because it contains non finite values or refers to an unknown frame.
    #[error("{message}")]
    CommandException { message: String },

    /// KinematicsException is returned by kinematic solvers if they fail to compute a
    /// transform or a Jacobian.
    #[error("{message}")]
    KinematicsException { message: String },
}

/// creates a ConfigurationException from anything that can be displayed
pub(crate) fn create_configuration_exception(message: impl Into<String>) -> LwrException {
    LwrException::ConfigurationException {
        message: message.into(),
    }
}

/// creates a CommandException from anything that can be displayed
pub(crate) fn create_command_exception(message: impl Into<String>) -> LwrException {
    LwrException::CommandException {
        message: message.into(),
    }
}

/// Result type which can have LwrException as Error
pub type LwrResult<T> = Result<T, LwrException>;
