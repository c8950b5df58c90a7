use std::{collections::HashMap, fmt::Display};

use quill_syntax::token::TextRange;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function { arity: usize },
    Builtin { arity: usize },
}

impl SymbolKind {
    pub fn arity(self) -> Option<usize> {
        match self {
            Self::Function { arity } | Self::Builtin { arity } => Some(arity),
            Self::Variable | Self::Parameter => None,
        }
    }
}

/// Type of an expression when it is known without running the program.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StaticType {
    Unknown,
    Number,
    Str,
    Boolean,
    Null,
    List,
    Function,
}

impl StaticType {
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    /// Whether a value of this type may be one of `expected`.
    pub fn may_be(self, expected: &[StaticType]) -> bool {
        self == Self::Unknown || expected.contains(&self)
    }
}

impl Display for StaticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Number => "number",
            Self::Str => "string",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::List => "list",
            Self::Function => "function",
        })
    }
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Builtins have no declaration site
    pub range: Option<TextRange>,
    pub used: bool,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn push(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol);
        SymbolId(self.symbols.len() - 1)
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    pub(crate) fn len(&self) -> usize {
        self.symbols.len()
    }
}

/// Link from an identifier to its declaration: the symbol, and how many
/// scopes out from the use site it was declared.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub symbol: SymbolId,
    pub depth: usize,
}

/// Side tables produced by the resolver, keyed by source range.
#[derive(Debug, Default)]
pub struct Analysis {
    pub symbols: SymbolTable,
    pub resolutions: HashMap<TextRange, Resolution>,
    pub types: HashMap<TextRange, StaticType>,
}

impl Analysis {
    pub fn depth(&self, range: TextRange) -> Option<usize> {
        self.resolutions.get(&range).map(|r| r.depth)
    }

    pub fn symbol_at(&self, range: TextRange) -> Option<&Symbol> {
        self.resolutions
            .get(&range)
            .map(|r| self.symbols.get(r.symbol))
    }
}
