//! Scriptable in-memory engine for cache/session/dispatcher tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use csense_engine::{CompileCommand, Engine, EngineError, TypeInfo, UnitHandle};
use csense_types::{CompletionRecord, Diagnostic, Overlay};

/// Observable state shared between a [`FakeEngine`] and the test body.
///
/// Outcome queues drain front-first; an empty queue means success.
#[derive(Default)]
pub(crate) struct FakeState {
    pub parse_outcomes: VecDeque<Result<(), EngineError>>,
    pub reparse_outcomes: VecDeque<Result<(), EngineError>>,
    pub parse_calls: Vec<(String, Vec<String>)>,
    pub reparse_calls: usize,
    pub complete_calls: usize,
    pub live_units: Vec<u64>,
    pub disposed_units: Vec<u64>,
    pub last_overlays: Vec<Overlay>,
    pub completions: Option<Vec<CompletionRecord>>,
    pub diagnostics: Vec<Diagnostic>,
    pub type_result: Option<TypeInfo>,
    pub compile_commands: Option<Vec<CompileCommand>>,
    next_unit: u64,
}

pub(crate) struct FakeEngine {
    state: Rc<RefCell<FakeState>>,
}

impl FakeEngine {
    pub fn new() -> (Self, Rc<RefCell<FakeState>>) {
        let state = Rc::new(RefCell::new(FakeState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }
}

impl Engine for FakeEngine {
    fn parse(
        &mut self,
        file: &str,
        args: &[String],
        overlays: &[Overlay],
    ) -> Result<UnitHandle, EngineError> {
        let mut state = self.state.borrow_mut();
        state.parse_calls.push((file.to_string(), args.to_vec()));
        state.last_overlays = overlays.to_vec();
        match state.parse_outcomes.pop_front().unwrap_or(Ok(())) {
            Ok(()) => {
                state.next_unit += 1;
                let id = state.next_unit;
                state.live_units.push(id);
                Ok(UnitHandle::new(id))
            }
            Err(err) => Err(err),
        }
    }

    fn reparse(&mut self, unit: UnitHandle, overlays: &[Overlay]) -> Result<(), EngineError> {
        let mut state = self.state.borrow_mut();
        assert!(
            state.live_units.contains(&unit.raw()),
            "reparse of dead unit {}",
            unit.raw()
        );
        state.reparse_calls += 1;
        state.last_overlays = overlays.to_vec();
        state.reparse_outcomes.pop_front().unwrap_or(Ok(()))
    }

    fn dispose(&mut self, unit: UnitHandle) {
        let mut state = self.state.borrow_mut();
        let index = state
            .live_units
            .iter()
            .position(|id| *id == unit.raw())
            .unwrap_or_else(|| panic!("dispose of dead unit {}", unit.raw()));
        state.live_units.remove(index);
        state.disposed_units.push(unit.raw());
    }

    fn diagnostics(&mut self, _unit: UnitHandle) -> Vec<Diagnostic> {
        self.state.borrow().diagnostics.clone()
    }

    fn complete_at(
        &mut self,
        _unit: UnitHandle,
        _file: &str,
        _line: u32,
        _col: u32,
        overlays: &[Overlay],
    ) -> Option<Vec<CompletionRecord>> {
        let mut state = self.state.borrow_mut();
        state.complete_calls += 1;
        state.last_overlays = overlays.to_vec();
        state.completions.clone()
    }

    fn type_at(&mut self, _unit: UnitHandle, _file: &str, _line: u32, _col: u32) -> Option<TypeInfo> {
        self.state.borrow().type_result.clone()
    }

    fn compile_commands(&mut self, _build_dir: &str, _file: &str) -> Option<Vec<CompileCommand>> {
        self.state.borrow().compile_commands.clone()
    }
}
