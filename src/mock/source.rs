//! Scripted input event source

use crate::device::{InputEventSource, RawInputRecord};
use crate::sensor::SensorError;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;

#[derive(Debug, Default)]
struct Script {
    pending: VecDeque<RawInputRecord>,
    values: HashMap<u16, i32>,
    fail_next: Option<i32>,
    reads: usize,
}

/// Hands out pre-programmed records, at most `max` per read
#[derive(Debug, Default, Clone)]
pub struct ScriptedSource {
    script: Rc<RefCell<Script>>,
}

impl ScriptedSource {
    pub fn push(&self, record: RawInputRecord) {
        self.script.borrow_mut().pending.push_back(record);
    }

    pub fn push_all(&self, records: impl IntoIterator<Item = RawInputRecord>) {
        self.script.borrow_mut().pending.extend(records);
    }

    /// Value returned by [`InputEventSource::current_value`] for `code`
    pub fn set_value(&self, code: u16, value: i32) {
        self.script.borrow_mut().values.insert(code, value);
    }

    /// Fail the next read with `errno`
    pub fn fail_next(&self, errno: i32) {
        self.script.borrow_mut().fail_next = Some(errno);
    }

    pub fn remaining(&self) -> usize {
        self.script.borrow().pending.len()
    }

    /// Number of reads attempted so far
    pub fn reads(&self) -> usize {
        self.script.borrow().reads
    }
}

impl InputEventSource for ScriptedSource {
    fn read_records(
        &mut self,
        out: &mut VecDeque<RawInputRecord>,
        max: usize,
    ) -> Result<usize, SensorError> {
        let mut script = self.script.borrow_mut();
        script.reads += 1;
        if let Some(errno) = script.fail_next.take() {
            return Err(io::Error::from_raw_os_error(errno).into());
        }
        let count = max.min(script.pending.len());
        out.extend(script.pending.drain(..count));
        Ok(count)
    }

    fn current_value(&self, code: u16) -> Option<i32> {
        self.script.borrow().values.get(&code).copied()
    }
}
