//! Test-only scripted collaborators for the self-healing loop.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::Result;

use crate::core::types::{ExecutionResult, FixSuggestion};
use crate::io::advisor::FixAdvisor;
use crate::io::confirm::Confirmer;
use crate::io::locate::BinaryLocator;
use crate::io::process::CommandExecutor;

/// Executor that replays queued results per command text.
///
/// Commands without a queued result get the fallback result.
pub struct ScriptedExecutor {
    scripts: RefCell<HashMap<String, VecDeque<ExecutionResult>>>,
    fallback: ExecutionResult,
    calls: RefCell<Vec<(String, bool)>>,
}

impl ScriptedExecutor {
    pub fn always_ok() -> Self {
        Self::with_fallback(ExecutionResult::succeeded(""))
    }

    pub fn always_failing(error_text: &str) -> Self {
        Self::with_fallback(ExecutionResult::failed("", error_text))
    }

    fn with_fallback(fallback: ExecutionResult) -> Self {
        Self {
            scripts: RefCell::new(HashMap::new()),
            fallback,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Queue results returned, in order, for `command`.
    pub fn script(self, command: &str, results: Vec<ExecutionResult>) -> Self {
        self.scripts
            .borrow_mut()
            .entry(command.to_string())
            .or_default()
            .extend(results);
        self
    }

    /// Every `(command, suppress_output)` pair executed so far.
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.borrow().clone()
    }

    /// How many times `command` was executed.
    pub fn count(&self, command: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(c, _)| c == command)
            .count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, command: &str, suppress_output: bool) -> Result<ExecutionResult> {
        self.calls
            .borrow_mut()
            .push((command.to_string(), suppress_output));
        let next = self
            .scripts
            .borrow_mut()
            .get_mut(command)
            .and_then(VecDeque::pop_front);
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// A recorded advisor consultation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorCall {
    pub command: String,
    pub error_text: String,
    pub meta: Option<String>,
}

/// Advisor that replays queued suggestions, then reports unavailable.
pub struct ScriptedAdvisor {
    suggestions: RefCell<VecDeque<FixSuggestion>>,
    calls: RefCell<Vec<AdvisorCall>>,
}

impl ScriptedAdvisor {
    pub fn new(suggestions: Vec<FixSuggestion>) -> Self {
        Self {
            suggestions: RefCell::new(suggestions.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<AdvisorCall> {
        self.calls.borrow().clone()
    }
}

impl FixAdvisor for ScriptedAdvisor {
    fn suggest_fix(&self, command: &str, error_text: &str, meta: Option<&str>) -> FixSuggestion {
        self.calls.borrow_mut().push(AdvisorCall {
            command: command.to_string(),
            error_text: error_text.to_string(),
            meta: meta.map(str::to_string),
        });
        self.suggestions
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| FixSuggestion::unavailable("no scripted suggestion"))
    }
}

/// Confirmer that replays queued answers, then declines.
pub struct ScriptedConfirmer {
    answers: RefCell<VecDeque<bool>>,
    repeat: Option<bool>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: RefCell::new(answers.into()),
            repeat: None,
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn always(answer: bool) -> Self {
        Self {
            repeat: Some(answer),
            ..Self::new(Vec::new())
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        let queued = self.answers.borrow_mut().pop_front();
        Ok(queued.or(self.repeat).unwrap_or(false))
    }
}

/// Locator over a fixed set of names, optionally appearing after some misses.
pub struct FakeLocator {
    available: HashSet<String>,
    appearing: Option<(String, u32)>,
    lookups: Cell<u32>,
}

impl FakeLocator {
    pub fn missing() -> Self {
        Self::available(std::iter::empty::<&str>())
    }

    pub fn available<'a, I: IntoIterator<Item = &'a str>>(names: I) -> Self {
        Self {
            available: names.into_iter().map(str::to_string).collect(),
            appearing: None,
            lookups: Cell::new(0),
        }
    }

    /// `name` is missing for the first `misses` lookups, then present.
    pub fn appearing_after(name: &str, misses: u32) -> Self {
        Self {
            appearing: Some((name.to_string(), misses)),
            ..Self::missing()
        }
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.get()
    }
}

impl BinaryLocator for FakeLocator {
    fn is_available(&self, name: &str) -> bool {
        let seen = self.lookups.get();
        self.lookups.set(seen + 1);
        if self.available.contains(name) {
            return true;
        }
        matches!(&self.appearing, Some((target, misses)) if target == name && seen >= *misses)
    }
}
