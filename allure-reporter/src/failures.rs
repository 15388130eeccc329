// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deduplication of failures reported across agents.

use crate::events::{CallSite, TestError};
use itertools::Itertools;

/// A failure, possibly observed in several agents.
///
/// Two records are the same failure if their messages are equal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorRecord {
    message: String,
    call_site: Option<CallSite>,
    agents: Vec<String>,
}

impl ErrorRecord {
    /// Creates a new record with no call site or agent.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            call_site: None,
            agents: Vec::new(),
        }
    }

    /// Converts an error reported by the host. Returns `None` if the error has no message.
    pub fn from_host(error: &TestError) -> Option<Self> {
        let message = error.err_msg.as_deref().filter(|msg| !msg.is_empty())?;
        let mut record = Self::new(message);
        record.call_site = error.callsite.clone();
        if let Some(agent) = error.user_agent.as_deref().filter(|agent| !agent.is_empty()) {
            record.agents.push(agent.to_owned());
        }
        Some(record)
    }

    /// Sets the call site.
    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }

    /// Adds an agent the failure was observed in.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.add_agent(agent.into());
        self
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the call site of the first occurrence.
    pub fn call_site(&self) -> Option<&CallSite> {
        self.call_site.as_ref()
    }

    /// Returns the agents the failure was observed in, in order of first appearance.
    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    /// Returns the agents joined with `", "`, or `None` if no agent is known.
    pub fn agent_list(&self) -> Option<String> {
        (!self.agents.is_empty()).then(|| self.agents.iter().join(", "))
    }

    /// Returns the lines describing where the failure happened.
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(call_site) = &self.call_site {
            if let Some(filename) = &call_site.filename {
                lines.push(format!("File name: {filename}"));
            }
            if let Some(line_num) = &call_site.line_num {
                lines.push(format!("Line number: {line_num}"));
            }
        }
        if let Some(agents) = self.agent_list() {
            lines.push(format!("User Agent(s): {agents}"));
        }
        lines
    }

    fn add_agent(&mut self, agent: String) {
        if !self.agents.contains(&agent) {
            self.agents.push(agent);
        }
    }
}

/// Merges records with the same message.
///
/// The output keeps the order of first occurrence. Merged records combine their agents; the
/// call site of the first occurrence is kept.
pub fn merge_errors(errors: impl IntoIterator<Item = ErrorRecord>) -> Vec<ErrorRecord> {
    let mut merged: Vec<ErrorRecord> = Vec::new();
    for error in errors {
        match merged
            .iter_mut()
            .find(|existing| existing.message == error.message)
        {
            Some(existing) => {
                for agent in error.agents {
                    existing.add_agent(agent);
                }
            }
            None => merged.push(error),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn agents_are_combined() {
        let merged = merge_errors([
            ErrorRecord::new("X").with_agent("chrome"),
            ErrorRecord::new("X").with_agent("firefox"),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].agent_list().as_deref(), Some("chrome, firefox"));
    }

    #[test]
    fn first_call_site_wins() {
        let first = CallSite {
            filename: Some("a.js".to_owned()),
            line_num: Some("1".to_owned()),
        };
        let second = CallSite {
            filename: Some("b.js".to_owned()),
            line_num: Some("2".to_owned()),
        };
        let merged = merge_errors([
            ErrorRecord::new("X").with_call_site(first.clone()),
            ErrorRecord::new("Y"),
            ErrorRecord::new("X")
                .with_call_site(second)
                .with_agent("firefox"),
        ]);

        assert_eq!(
            merged,
            vec![
                ErrorRecord::new("X")
                    .with_call_site(first)
                    .with_agent("firefox"),
                ErrorRecord::new("Y"),
            ]
        );
    }

    #[test]
    fn repeated_agents_are_listed_once() {
        let merged = merge_errors([
            ErrorRecord::new("X").with_agent("chrome"),
            ErrorRecord::new("X").with_agent("firefox"),
            ErrorRecord::new("X").with_agent("chrome"),
            ErrorRecord::new("X"),
        ]);
        assert_eq!(merged[0].agents(), ["chrome", "firefox"]);
    }

    #[test]
    fn host_errors_without_message_are_ignored() {
        let error = TestError {
            err_msg: None,
            callsite: None,
            user_agent: Some("chrome".to_owned()),
        };
        assert_eq!(ErrorRecord::from_host(&error), None);

        let error = TestError {
            err_msg: Some("failed".to_owned()),
            callsite: Some(CallSite {
                filename: Some("a.js".to_owned()),
                line_num: None,
            }),
            user_agent: Some("chrome".to_owned()),
        };
        let record = ErrorRecord::from_host(&error).expect("message present");
        assert_eq!(
            record.detail_lines(),
            ["File name: a.js", "User Agent(s): chrome"]
        );
    }
}
