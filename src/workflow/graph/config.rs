// SPDX-License-Identifier: MIT

//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::FancyError;

/// Order in which the engine visits steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionOrder {
    /// Stored step order, trusted as-is
    #[default]
    Stored,
    /// Computed from the input/output wiring; invalid graphs fail before any step runs
    Topological,
}

/// Which side wins when a parameter is both wired and configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentPrecedence {
    #[default]
    Config,
    Input,
    /// Fail the step with `ArgumentCollision`
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub order: ExecutionOrder,
    pub precedence: ArgumentPrecedence,
}

impl EngineConfig {
    pub fn from_yaml(content: &str) -> Result<Self, FancyError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, FancyError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn with_order(mut self, order: ExecutionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_precedence(mut self, precedence: ArgumentPrecedence) -> Self {
        self.precedence = precedence;
        self
    }
}
