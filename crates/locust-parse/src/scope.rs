//! Lexical scope tracking for the extractor.
//!
//! Frames are pruned lazily: a frame stays on the stack after its body ends
//! and is only discarded when the next definition starts past its end line.
//! Each frame owns a copy of the symbol table it inherited when pushed, so
//! imports bound in one scope never leak into a sibling.

use std::collections::HashMap;

use locust_core::Parent;

type SymbolTable = HashMap<String, String>;

#[derive(Debug, Clone)]
struct Frame {
    name: String,
    line: u32,
    end_line: Option<u32>,
    symbols: SymbolTable,
}

impl Frame {
    fn is_live_at(&self, line: u32) -> bool {
        self.end_line.is_none_or(|end| end >= line)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    module_symbols: SymbolTable,
    frames: Vec<Frame>,
}

impl ScopeStack {
    /// Open a definition scope starting at `line` and return its qualified
    /// name and parent.
    pub(crate) fn enter(&mut self, name: &str, line: u32, end_line: Option<u32>) -> (String, Option<Parent>) {
        self.frames
            .retain(|f| f.end_line.is_none_or(|end| end > line));

        let symbols = self.symbols_at(line).clone();
        self.frames.push(Frame {
            name: name.to_string(),
            line,
            end_line,
            symbols,
        });

        let qualified_name = join_names(&self.frames);
        let parent = match self.frames.len() {
            0 | 1 => None,
            n => Some(Parent::new(join_names(&self.frames[..n - 1]), self.frames[n - 2].line)),
        };
        (qualified_name, parent)
    }

    /// Parent reference for a non-scope definition (import or usage) at `line`.
    pub(crate) fn enclosing(&self, line: u32) -> Option<Parent> {
        let live: Vec<&Frame> = self.frames.iter().filter(|f| f.is_live_at(line)).collect();
        let innermost = live.last()?;
        let name = live.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(".");
        Some(Parent::new(name, innermost.line))
    }

    /// Bind `alias` to `target` in the innermost scope live at `line`.
    pub(crate) fn bind(&mut self, line: u32, alias: String, target: String) {
        let table = match self.frames.iter_mut().rev().find(|f| f.is_live_at(line)) {
            Some(frame) => &mut frame.symbols,
            None => &mut self.module_symbols,
        };
        table.insert(alias, target);
    }

    /// Resolve `name` in the innermost scope live at `line`.
    pub(crate) fn resolve(&self, line: u32, name: &str) -> Option<&str> {
        self.symbols_at(line).get(name).map(String::as_str)
    }

    fn symbols_at(&self, line: u32) -> &SymbolTable {
        self.frames
            .iter()
            .rev()
            .find(|f| f.is_live_at(line))
            .map_or(&self.module_symbols, |f| &f.symbols)
    }
}

fn join_names(frames: &[Frame]) -> String {
    frames
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}
